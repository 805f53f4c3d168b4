//! Line limiter factory
//!
//! Builds the throttle selected by [`Mode`] and puts a [`Guard`] in front of
//! it. Every line is tracked by its content; with `per_line` each distinct
//! line is counted only against its own copies.
//!
//! ## Static
//! - No threads, no tasks
//! - Expired lines are purged at the end of the next check
//!
//! ## Thread
//! - One timer thread per passed line
//! - The bucket shrinks even while stdin is idle
//!
//! ## Loop
//! - One runtime task per passed line
//! - Must be created from inside the tokio runtime

use crate::config::{LimitConfig, Mode};
use anyhow::{Context, Result};
use freqvalve::{Guard, GuardBuilder, LoopScheduler, Static, ThreadScheduler, Throttle, Valve};

type LineGuard<Th> = Guard<String, String, Th>;

/// A guard over one of the concrete throttles
pub enum Limiter {
    Static(LineGuard<Static<String>>),
    Thread(LineGuard<Valve<String, ThreadScheduler>>),
    Loop(LineGuard<Valve<String, LoopScheduler>>),
}

impl Limiter {
    /// Create the limiter for `mode`
    ///
    /// # Errors
    ///
    /// Fails if the window is not a valid duration, or if `Mode::Loop` is
    /// requested outside of a tokio runtime.
    pub fn new(config: &LimitConfig, mode: Mode, capacity: usize) -> Result<Self> {
        let guard = line_guard(config)?;

        let limiter = match mode {
            Mode::Static => {
                let throttle = Static::builder().capacity(capacity).build();
                Limiter::Static(guard.build(throttle))
            }
            Mode::Thread => {
                let scheduler = ThreadScheduler::with_thread_name("freqvalve-evict");
                let throttle = Valve::builder(scheduler).capacity(capacity).build();
                Limiter::Thread(guard.build(throttle))
            }
            Mode::Loop => {
                let scheduler = LoopScheduler::try_current()
                    .context("loop mode needs a running tokio runtime")?;
                let throttle = Valve::builder(scheduler).capacity(capacity).build();
                Limiter::Loop(guard.build(throttle))
            }
        };

        tracing::debug!(?mode, capacity, "created limiter");
        Ok(limiter)
    }

    /// Check `line` against the throttle, returning whether it may pass
    #[allow(clippy::ptr_arg)]
    pub fn admit(&mut self, line: &String) -> Result<bool> {
        let admitted = match self {
            Limiter::Static(guard) => guard.admit(line)?,
            Limiter::Thread(guard) => guard.admit(line)?,
            Limiter::Loop(guard) => guard.admit(line)?,
        };
        Ok(admitted)
    }

    pub fn mode(&self) -> Mode {
        match self {
            Limiter::Static(_) => Mode::Static,
            Limiter::Thread(_) => Mode::Thread,
            Limiter::Loop(_) => Mode::Loop,
        }
    }

    /// Number of lines currently tracked
    pub fn tracked(&self) -> usize {
        match self {
            Limiter::Static(guard) => guard.throttle().count(None),
            Limiter::Thread(guard) => guard.throttle().count(None),
            Limiter::Loop(guard) => guard.throttle().count(None),
        }
    }
}

fn line_guard(config: &LimitConfig) -> Result<GuardBuilder<String, String>> {
    let mut guard = Guard::builder(config.delay()?, config.limit)
        .key(|line: &String| line.clone())
        .strict(config.per_line)
        .rate(config.rate);

    if let Some(excess) = config.excess {
        guard = guard.excess(excess);
    }

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(limit: u32, per_line: bool) -> LimitConfig {
        LimitConfig {
            limit,
            window: 60.0,
            excess: None,
            rate: 1.0,
            per_line,
        }
    }

    #[test]
    fn test_shared_limit_across_lines() {
        let mut limiter = Limiter::new(&config(2, false), Mode::Static, 8).unwrap();

        assert!(limiter.admit(&"a".to_string()).unwrap());
        assert!(limiter.admit(&"b".to_string()).unwrap());
        assert!(!limiter.admit(&"c".to_string()).unwrap());
        assert_eq!(limiter.tracked(), 2);
    }

    #[test]
    fn test_per_line_limit() {
        let mut limiter = Limiter::new(&config(1, true), Mode::Thread, 8).unwrap();

        assert!(limiter.admit(&"a".to_string()).unwrap());
        assert!(!limiter.admit(&"a".to_string()).unwrap());
        assert!(limiter.admit(&"b".to_string()).unwrap());
        assert_eq!(limiter.mode(), Mode::Thread);
    }

    #[test]
    fn test_loop_mode_requires_runtime() {
        assert!(Limiter::new(&config(1, false), Mode::Loop, 8).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_mode_reopens_after_window() {
        let mut settings = config(1, false);
        settings.window = 2.0;
        let mut limiter = Limiter::new(&settings, Mode::Loop, 8).unwrap();

        assert!(limiter.admit(&"a".to_string()).unwrap());
        assert!(!limiter.admit(&"b".to_string()).unwrap());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(limiter.tracked(), 0);
        assert!(limiter.admit(&"c".to_string()).unwrap());
    }
}
