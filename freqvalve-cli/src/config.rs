//! Throttle configuration and CLI argument parsing
//!
//! Every option can be given on the command line or through an environment
//! variable with the FREQVALVE_ prefix.
//!
//! # Configuration Priority
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Default values (lowest priority)
//!
//! # Example Usage
//!
//! ```bash
//! # At most 5 lines per 2 seconds
//! tail -f app.log | freqvalve --limit 5 --window 2
//!
//! # Same, each distinct line limited on its own
//! export FREQVALVE_PER_LINE=true
//! tail -f app.log | freqvalve --limit 1 --window 60
//! ```

use anyhow::{Result, anyhow};
use clap::Parser;
use std::time::Duration;

/// Configuration for a throttled line stream
#[derive(Debug, Clone)]
pub struct Config {
    /// Throttle parameters applied to every line
    pub limit: LimitConfig,
    /// How tracked lines are evicted
    pub mode: Mode,
    /// Initial bucket capacity
    pub capacity: usize,
    /// Echo dropped lines to stderr
    pub report_dropped: bool,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
}

/// Check parameters shared by every line
#[derive(Debug, Clone)]
pub struct LimitConfig {
    /// Lines allowed per window
    pub limit: u32,
    /// Window length in seconds
    pub window: f64,
    /// Extra lines allowed past the limit, tracked for a shorter time
    pub excess: Option<u32>,
    /// Multiplier applied to every window
    pub rate: f64,
    /// Count each distinct line separately
    pub per_line: bool,
}

impl LimitConfig {
    /// The window as a `Duration`
    pub fn delay(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.window)
            .map_err(|e| anyhow!("Invalid window {}: {}", self.window, e))
    }
}

/// Eviction strategy for tracked lines
///
/// - **Static**: Expired lines are purged while checking the next line
/// - **Thread**: Each line is removed by a timer thread
/// - **Loop**: Each line is removed by a task on the async runtime
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    Static,
    Thread,
    Loop,
}

impl std::str::FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "static" => Ok(Mode::Static),
            "thread" => Ok(Mode::Thread),
            "loop" => Ok(Mode::Loop),
            _ => Err(anyhow!(
                "Invalid mode: {}. Valid options are: static, thread, loop",
                s
            )),
        }
    }
}

/// Command-line arguments
///
/// All arguments can also be set via environment variables with the
/// FREQVALVE_ prefix. CLI arguments take precedence over environment variables.
#[derive(Parser, Debug)]
#[command(
    name = "freqvalve",
    about = "Throttle a line stream",
    long_about = "Copies lines from stdin to stdout, dropping lines once more than --limit lines were passed within the last --window seconds.\n\nEnvironment variables with FREQVALVE_ prefix are supported. CLI arguments take precedence over environment variables."
)]
pub struct Args {
    // Throttle
    #[arg(
        long,
        value_name = "N",
        help = "Lines allowed per window",
        default_value_t = 10,
        env = "FREQVALVE_LIMIT"
    )]
    pub limit: u32,
    #[arg(
        long,
        value_name = "SECS",
        help = "Window length in seconds",
        default_value_t = 1.0,
        env = "FREQVALVE_WINDOW"
    )]
    pub window: f64,
    #[arg(
        long,
        value_name = "N",
        help = "Extra lines allowed past the limit, expiring sooner",
        env = "FREQVALVE_EXCESS"
    )]
    pub excess: Option<u32>,
    #[arg(
        long,
        value_name = "FACTOR",
        help = "Multiplier applied to every window",
        default_value_t = 1.0,
        env = "FREQVALVE_RATE"
    )]
    pub rate: f64,
    #[arg(
        long,
        help = "Limit each distinct line separately",
        env = "FREQVALVE_PER_LINE"
    )]
    pub per_line: bool,

    // Eviction
    #[arg(
        long,
        value_name = "MODE",
        help = "Eviction mode: static, thread, loop",
        default_value = "static",
        env = "FREQVALVE_MODE"
    )]
    pub mode: Mode,
    #[arg(
        long,
        value_name = "SIZE",
        help = "Initial bucket capacity",
        default_value_t = 1024,
        env = "FREQVALVE_CAPACITY"
    )]
    pub capacity: usize,

    // General options
    #[arg(
        long,
        help = "Echo dropped lines to stderr",
        env = "FREQVALVE_REPORT_DROPPED"
    )]
    pub report_dropped: bool,
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace",
        default_value = "info",
        env = "FREQVALVE_LOG_LEVEL"
    )]
    pub log_level: String,

    // Utility options
    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

impl Config {
    /// Build configuration from environment variables and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments do not describe a usable throttle.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        Self::from_args(args)
    }

    /// Build and validate configuration from already parsed arguments
    pub fn from_args(args: Args) -> Result<Self> {
        let config = Config {
            limit: LimitConfig {
                limit: args.limit,
                window: args.window,
                excess: args.excess,
                rate: args.rate,
                per_line: args.per_line,
            },
            mode: args.mode,
            capacity: args.capacity,
            report_dropped: args.report_dropped,
            log_level: args.log_level,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the limit is zero, the window is not a positive
    /// number of seconds, or the rate is negative or not finite.
    fn validate(&self) -> Result<()> {
        let limit = &self.limit;

        if limit.limit == 0 {
            return Err(anyhow!("--limit must be at least 1"));
        }

        if !limit.window.is_finite() || limit.window <= 0.0 {
            return Err(anyhow!(
                "--window must be a positive number of seconds, got {}",
                limit.window
            ));
        }
        limit.delay()?;

        if !limit.rate.is_finite() || limit.rate < 0.0 {
            return Err(anyhow!(
                "--rate must be a non-negative number, got {}",
                limit.rate
            ));
        }

        Ok(())
    }

    fn print_env_vars() {
        println!("freqvalve Environment Variables");
        println!("===============================");
        println!();
        println!("All environment variables use the FREQVALVE_ prefix.");
        println!("CLI arguments take precedence over environment variables.");
        println!();

        println!("Throttle Configuration:");
        println!("  FREQVALVE_LIMIT=<n>                Lines allowed per window [default: 10]");
        println!("  FREQVALVE_WINDOW=<secs>            Window length in seconds [default: 1.0]");
        println!("  FREQVALVE_EXCESS=<n>               Extra lines past the limit [default: none]");
        println!("  FREQVALVE_RATE=<factor>            Window multiplier [default: 1.0]");
        println!("  FREQVALVE_PER_LINE=true|false      Limit each distinct line separately");
        println!();

        println!("Eviction Configuration:");
        println!(
            "  FREQVALVE_MODE=<mode>              Eviction mode: static, thread, loop [default: static]"
        );
        println!("  FREQVALVE_CAPACITY=<size>          Initial bucket capacity [default: 1024]");
        println!();

        println!("General Configuration:");
        println!("  FREQVALVE_REPORT_DROPPED=true|false  Echo dropped lines to stderr");
        println!(
            "  FREQVALVE_LOG_LEVEL=<level>        Log level: error, warn, info, debug, trace [default: info]"
        );
        println!();

        println!("Examples:");
        println!("  # One alert per distinct message per minute");
        println!("  export FREQVALVE_PER_LINE=true");
        println!("  export FREQVALVE_LIMIT=1");
        println!("  export FREQVALVE_WINDOW=60");
        println!();
        println!("  # Run (CLI args override env vars)");
        println!("  freqvalve --limit 3  # Will use a limit of 3, not 1");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn parse(args: &[&str]) -> Result<Config> {
        let args = Args::try_parse_from(std::iter::once("freqvalve").chain(args.iter().copied()))?;
        Config::from_args(args)
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!(Mode::from_str("static").unwrap(), Mode::Static);
        assert_eq!(Mode::from_str("THREAD").unwrap(), Mode::Thread);
        assert_eq!(Mode::from_str("loop").unwrap(), Mode::Loop);
        assert!(Mode::from_str("cron").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap();

        assert_eq!(config.limit.limit, 10);
        assert_eq!(config.limit.delay().unwrap(), Duration::from_secs(1));
        assert_eq!(config.limit.excess, None);
        assert!(!config.limit.per_line);
        assert_eq!(config.mode, Mode::Static);
        assert!(!config.report_dropped);
    }

    #[test]
    fn test_all_options() {
        let config = parse(&[
            "--limit",
            "3",
            "--window",
            "0.5",
            "--excess",
            "2",
            "--rate",
            "2",
            "--per-line",
            "--mode",
            "loop",
            "--capacity",
            "64",
            "--report-dropped",
        ])
        .unwrap();

        assert_eq!(config.limit.limit, 3);
        assert_eq!(config.limit.delay().unwrap(), Duration::from_millis(500));
        assert_eq!(config.limit.excess, Some(2));
        assert_eq!(config.limit.rate, 2.0);
        assert!(config.limit.per_line);
        assert_eq!(config.mode, Mode::Loop);
        assert_eq!(config.capacity, 64);
        assert!(config.report_dropped);
    }

    #[test]
    fn test_config_validation() {
        assert!(parse(&["--limit", "0"]).is_err());
        assert!(parse(&["--window", "0"]).is_err());
        assert!(parse(&["--window=-1"]).is_err());
        assert!(parse(&["--window", "inf"]).is_err());
        assert!(parse(&["--rate", "NaN"]).is_err());
        assert!(parse(&["--rate", "0"]).is_ok());
    }

    #[test]
    fn test_invalid_mode_rejected_by_parser() {
        assert!(Args::try_parse_from(["freqvalve", "--mode", "cron"]).is_err());
    }
}
