//! Line pump: copies admitted lines from a reader to a writer

use crate::limiter::Limiter;
use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Counts of a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub passed: u64,
    pub dropped: u64,
}

/// Feed every line of `input` through `limiter`
///
/// Admitted lines are written to `output`. Dropped lines are written to
/// `dropped` when given, and discarded otherwise. Returns once `input` is
/// exhausted.
///
/// # Errors
///
/// Propagates I/O errors and throttle errors; lines already written stay
/// written.
pub async fn run<R, W, D>(
    limiter: &mut Limiter,
    input: R,
    mut output: W,
    mut dropped: Option<D>,
) -> Result<Summary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    D: AsyncWrite + Unpin,
{
    let mut summary = Summary::default();
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        if limiter.admit(&line)? {
            write_line(&mut output, &line).await?;
            summary.passed += 1;
        } else {
            if let Some(sink) = dropped.as_mut() {
                write_line(sink, &line).await?;
            }
            summary.dropped += 1;
        }
    }

    output.flush().await?;
    if let Some(sink) = dropped.as_mut() {
        sink.flush().await?;
    }

    Ok(summary)
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    Ok(())
}
