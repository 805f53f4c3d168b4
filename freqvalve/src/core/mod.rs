//! Core components of the freqvalve throttling library
//!
//! This module contains the fundamental building blocks:
//! - [`schedule`]: Deferred actions on a timer thread or an async runtime
//! - [`throttle`]: The shared admission contract ([`Throttle::check`])
//! - [`valve`]: Throttle whose entries remove themselves through a [`Scheduler`]
//! - [`lazy`]: Throttle that evicts expired entries on the next check
//! - [`guard`]: Adapter that throttles calls to an arbitrary function

pub mod clock;
pub mod guard;
pub mod lazy;
pub mod schedule;
pub mod throttle;
pub mod valve;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use guard::{Guard, GuardBuilder};
pub use lazy::{Static, StaticBuilder};
#[cfg(feature = "tokio")]
pub use schedule::{LoopHandle, LoopScheduler};
pub use schedule::{Action, ScheduleError, Scheduler, ThreadScheduler, TimerHandle};
pub use throttle::{CheckOptions, Key, Throttle, effective_delay};
pub use valve::{EntryId, Valve, ValveBuilder};

/// Errors that can occur while checking a throttle
///
/// # Example
///
/// ```
/// use freqvalve::{CheckOptions, Static, Throttle, ThrottleError};
/// use std::time::Duration;
///
/// let mut throttle = Static::default();
///
/// // Scaling by excess divides by the limit, so a zero limit is rejected
/// let options = CheckOptions::new().excess(2);
/// match throttle.check(Duration::from_secs(1), 0, "value", &options) {
///     Err(ThrottleError::ZeroLimitWithExcess { excess }) => assert_eq!(excess, 2),
///     other => panic!("unexpected result: {other:?}"),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ThrottleError {
    /// `excess` was requested against a zero limit
    #[error("excess of {excess} requires a positive limit")]
    ZeroLimitWithExcess { excess: u32 },
    /// The delay multiplier was negative, NaN or infinite
    #[error("invalid rate: {0}")]
    InvalidRate(f64),
    /// The removal of an admitted value could not be scheduled
    ///
    /// The value is not left in the bucket.
    #[error("cannot expire value: {0}")]
    Schedule(#[from] ScheduleError),
}
