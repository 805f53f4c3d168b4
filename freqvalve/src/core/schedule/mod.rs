//! Deferred execution for scheduled eviction
//!
//! A [`Scheduler`] runs an action once after a delay. [`Valve`](super::Valve)
//! uses it to remove each admitted entry when its window closes.
//!
//! Two providers are available:
//!
//! - [`ThreadScheduler`]: one timer thread per action, no runtime required
//! - [`LoopScheduler`]: a sleeping task on a tokio runtime (feature `tokio`).
//!   On a current-thread runtime the removals run cooperatively with the
//!   caller, interleaving only at await points.

use std::time::Duration;

mod thread;
#[cfg(feature = "tokio")]
mod tokio_loop;

pub use thread::{ThreadScheduler, TimerHandle};
#[cfg(feature = "tokio")]
pub use tokio_loop::{LoopHandle, LoopScheduler};

/// Work handed to a scheduler
pub type Action = Box<dyn FnOnce() + Send + 'static>;

/// Why an action could not be scheduled
///
/// The action has been dropped without running.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// The OS refused to start a timer thread
    #[error("failed to spawn timer thread: {reason}")]
    ThreadSpawn { reason: String },
    /// The runtime no longer accepts tasks
    #[error("runtime is shut down")]
    RuntimeShutdown,
}

/// Runs an action after a delay
pub trait Scheduler {
    /// Handle to the pending action
    ///
    /// Dropping the handle never cancels the action.
    type Handle;

    /// Arrange for `action` to run once `delay` has elapsed
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError`] when the action will never run.
    fn schedule(&self, delay: Duration, action: Action) -> Result<Self::Handle, ScheduleError>;
}

impl<S: Scheduler + ?Sized> Scheduler for &S {
    type Handle = S::Handle;

    fn schedule(&self, delay: Duration, action: Action) -> Result<Self::Handle, ScheduleError> {
        (**self).schedule(delay, action)
    }
}
