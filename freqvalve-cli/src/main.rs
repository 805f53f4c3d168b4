use anyhow::Result;
use tokio::io::{self, BufReader};

use freqvalve_cli::config::Config;
use freqvalve_cli::limiter::Limiter;
use freqvalve_cli::pump;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from environment variables and CLI arguments
    let config = Config::from_env_and_args()?;

    // Logs go to stderr, stdout carries the throttled stream
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("freqvalve={}", config.log_level).parse()?)
                .add_directive(format!("freqvalve_cli={}", config.log_level).parse()?),
        )
        .init();

    let mut limiter = Limiter::new(&config.limit, config.mode, config.capacity)?;

    tracing::info!(
        "freqvalve started: {} lines per {}s, mode {:?}",
        config.limit.limit,
        config.limit.window,
        config.mode
    );

    let dropped = config.report_dropped.then(io::stderr);
    let summary = pump::run(
        &mut limiter,
        BufReader::new(io::stdin()),
        io::stdout(),
        dropped,
    )
    .await?;

    tracing::info!(
        passed = summary.passed,
        dropped = summary.dropped,
        "input exhausted"
    );

    Ok(())
}
