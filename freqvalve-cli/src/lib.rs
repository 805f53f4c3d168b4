//! # freqvalve CLI
//!
//! Throttles a stream of lines: copies stdin to stdout, passing at most
//! `--limit` lines per rolling `--window` seconds and dropping the rest.
//!
//! ## Use Cases
//!
//! - **Log flood control**: cap how many lines a noisy process forwards
//! - **Alert deduplication**: with `--per-line`, repeat each distinct message
//!   at most N times per window
//! - **Shell pipelines**: put a rate ceiling in front of any line consumer
//!
//! ## Quick Start
//!
//! ```bash
//! # Show all available options
//! freqvalve --help
//!
//! # At most 5 lines per 2 seconds
//! tail -f app.log | freqvalve --limit 5 --window 2
//!
//! # Each distinct line at most once a minute, show what was dropped
//! tail -f alerts.log | freqvalve --per-line --limit 1 --window 60 --report-dropped
//! ```
//!
//! ## Configuration
//!
//! Configure via CLI arguments or environment variables (CLI takes precedence):
//!
//! ```bash
//! export FREQVALVE_LIMIT=5
//! export FREQVALVE_MODE=thread
//! freqvalve --window 10
//!
//! # List all available environment variables
//! freqvalve --list-env-vars
//! ```
//!
//! ### Key Configuration Options
//!
//! - **Limit**: `--limit 10` lines per window
//! - **Window**: `--window 1.5` seconds
//! - **Excess**: `--excess 2` extra lines that expire sooner
//! - **Mode**: `--mode static|thread|loop`
//! - **Log Level**: `--log-level error|warn|info|debug|trace`
//!
//! ## How It Works
//!
//! ```text
//! stdin ──► lines ──► Limiter (Guard + throttle) ──► stdout
//!                           │
//!                           └── dropped ──► stderr (--report-dropped)
//! ```
//!
//! Logs and the final summary go to stderr.

pub mod config;
pub mod limiter;
pub mod pump;
