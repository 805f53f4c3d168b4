//! # freqvalve
//!
//! Frequency tracking and throttling: allow at most `limit` observations per
//! rolling window of `delay`.
//!
//! ## Overview
//!
//! A throttle keeps a bucket of tracked values. Each call to
//! [`Throttle::check`] counts the bucket against a limit, admits or drops the
//! new value, and reports how much room there was. Admitted values stay in the
//! bucket until their delay has elapsed.
//!
//! - **Per-call parameters**: the limit and window are arguments of `check`,
//!   not part of the throttle, so one throttle can serve several limits
//! - **Keys**: count only the tracked values matching a predicate
//! - **Excess**: admit extra values past the limit that expire sooner
//! - **Two eviction strategies**: scheduled ([`Valve`]) or lazy ([`Static`])
//!
//! ## Quick Start
//!
//! ```
//! use freqvalve::{CheckOptions, Static, Throttle};
//! use std::time::Duration;
//!
//! // Lazily evicting throttle on the monotonic clock
//! let mut throttle = Static::default();
//!
//! // At most 3 events per 10 seconds
//! let left = throttle
//!     .check(Duration::from_secs(10), 3, "user:123", &CheckOptions::new())
//!     .unwrap();
//!
//! if left > 0 {
//!     println!("Allowed! {} slots were free", left);
//! } else {
//!     println!("Throttled");
//! }
//! ```
//!
//! ## Throttle Types
//!
//! ### [`Static`]
//! Stores an expiry per value and purges expired values at the end of every
//! check. No threads, no runtime. Best for single-threaded code and hot paths.
//!
//! ```
//! use freqvalve::{ManualClock, Static};
//!
//! let throttle: Static<u32, ManualClock> = Static::builder()
//!     .capacity(1_000)
//!     .clock(ManualClock::new())
//!     .build();
//! ```
//!
//! ### [`Valve`]
//! Schedules the removal of each value when it is admitted, so the bucket
//! shrinks on its own. Removals run on a [`Scheduler`]:
//!
//! ```
//! use freqvalve::{ThreadScheduler, Valve};
//!
//! // One timer thread per pending removal
//! let valve: Valve<String> = Valve::builder(ThreadScheduler::new())
//!     .capacity(1_000)
//!     .build();
//! ```
//!
//! With the `tokio` feature (default), [`LoopScheduler`] runs removals as
//! tasks on a tokio runtime instead.
//!
//! ## Common Use Cases
//!
//! ### Per-Key Limits
//! ```
//! use freqvalve::{CheckOptions, Static, Throttle};
//! use std::time::Duration;
//!
//! let mut throttle = Static::default();
//!
//! // 5 password resets per hour, counted per user
//! let user = "user:456";
//! let same_user = |tracked: &&str| *tracked == user;
//! let options = CheckOptions::new().key(&same_user);
//! let left = throttle.check(Duration::from_secs(3600), 5, user, &options)?;
//! # Ok::<(), freqvalve::ThrottleError>(())
//! ```
//!
//! ### Guarding a Function
//! ```
//! use freqvalve::Guard;
//! use std::time::Duration;
//!
//! let mut guard = Guard::with_defaults(Duration::from_secs(1), 10);
//!
//! // Runs at most 10 times per second, `None` otherwise
//! let result = guard.call("payload", |payload| payload.len())?;
//! # Ok::<(), freqvalve::ThrottleError>(())
//! ```
//!
//! ## Understanding Check Parameters
//!
//! - **`delay`**: How long an admitted value is tracked
//! - **`limit`**: Number of tracked values allowed before values are dropped
//! - **`key`**: Only count values matching this predicate
//! - **`bypass`**: Track the value regardless of the limit
//! - **`excess`**: Extra slots; their delay is scaled by `(left + excess) / limit`
//! - **`rate`**: Multiplies the final delay
//!
//! ## Thread Safety
//!
//! [`Static`] does no locking; share it behind a mutex. [`Valve`] locks its
//! bucket internally because removals run concurrently, but `check` still
//! takes `&mut self`:
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use freqvalve::Valve;
//!
//! let valve: Arc<Mutex<Valve<u64>>> = Arc::new(Mutex::new(Valve::threaded()));
//! ```
//!
//! ## Features
//!
//! - `tokio` (default): [`LoopScheduler`] for evicting on a tokio runtime

pub mod core;

#[cfg(feature = "tokio")]
pub use crate::core::{LoopHandle, LoopScheduler};
pub use crate::core::{
    Action, CheckOptions, Clock, EntryId, Guard, GuardBuilder, Key, ManualClock,
    MonotonicClock, ScheduleError, Scheduler, Static, StaticBuilder, ThreadScheduler, Throttle,
    ThrottleError, TimerHandle, Valve, ValveBuilder, effective_delay,
};
