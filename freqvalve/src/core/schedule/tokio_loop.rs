use super::{Action, ScheduleError, Scheduler};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::task::JoinHandle;

/// Scheduler that defers actions onto a tokio runtime
///
/// Each action becomes a task that sleeps for the delay and then runs the
/// action inline. With a current-thread runtime this is a cooperative event
/// loop: removals only happen while the runtime is being driven.
///
/// # Example
///
/// ```
/// use freqvalve::{LoopScheduler, Scheduler};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let scheduler = LoopScheduler::try_current().expect("inside a runtime");
/// let handle = scheduler
///     .schedule(Duration::from_millis(5), Box::new(|| println!("tick")))
///     .unwrap();
/// handle.join().await;
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LoopScheduler {
    runtime: Handle,
}

impl LoopScheduler {
    /// Schedule onto the given runtime
    pub fn new(runtime: Handle) -> Self {
        LoopScheduler { runtime }
    }

    /// Schedule onto the runtime driving the current task
    ///
    /// # Errors
    ///
    /// Fails when called outside of a tokio runtime.
    pub fn try_current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::new)
    }
}

/// Handle to an action pending on a [`LoopScheduler`]
#[derive(Debug)]
pub struct LoopHandle {
    task: JoinHandle<()>,
}

impl LoopHandle {
    /// Abort the task if it has not finished
    ///
    /// Returns `true` if the task was still outstanding. An action already
    /// running on another worker thread completes regardless.
    pub fn cancel(&self) -> bool {
        let pending = !self.task.is_finished();
        self.task.abort();
        pending
    }

    /// Whether the task completed or was aborted
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to complete or be aborted
    pub async fn join(self) {
        if let Err(e) = self.task.await
            && e.is_panic()
        {
            tracing::warn!("scheduled action panicked: {e}");
        }
    }
}

impl Scheduler for LoopScheduler {
    type Handle = LoopHandle;

    fn schedule(&self, delay: Duration, action: Action) -> Result<LoopHandle, ScheduleError> {
        let started = Arc::new(AtomicBool::new(false));
        let polled = Arc::clone(&started);

        let task = self.runtime.spawn(async move {
            polled.store(true, Ordering::Release);
            tokio::time::sleep(delay).await;
            action();
        });

        // A closed runtime completes the task without ever polling it
        if task.is_finished() && !started.load(Ordering::Acquire) {
            tracing::error!("cannot schedule removal: runtime is shut down");
            return Err(ScheduleError::RuntimeShutdown);
        }

        Ok(LoopHandle { task })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn test_action_runs_after_delay() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let scheduler = LoopScheduler::try_current().unwrap();

        let handle = scheduler.schedule(
            Duration::from_secs(10),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!handle.is_finished());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_action() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let scheduler = LoopScheduler::try_current().unwrap();

        let handle = scheduler.schedule(
            Duration::from_secs(1),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();
        assert!(handle.cancel());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(handle.is_finished());
    }

    #[test]
    fn test_try_current_outside_runtime() {
        assert!(LoopScheduler::try_current().is_err());
    }

    #[test]
    fn test_shut_down_runtime_is_reported() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let scheduler = LoopScheduler::new(runtime.handle().clone());
        drop(runtime);

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let result = scheduler.schedule(
            Duration::from_millis(1),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(result.unwrap_err(), ScheduleError::RuntimeShutdown);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_explicit_runtime_handle() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let scheduler = LoopScheduler::new(runtime.handle().clone());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        let handle = scheduler.schedule(
            Duration::from_millis(5),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        // Nothing runs until the loop is driven
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        runtime.block_on(handle.join());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
