use super::{Action, ScheduleError, Scheduler};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Scheduler backed by one OS thread per pending action
///
/// Each timer thread waits on a condition variable until its deadline, so a
/// cancelled timer wakes up and exits immediately instead of sleeping out the
/// remaining delay.
///
/// # Example
///
/// ```
/// use freqvalve::{Scheduler, ThreadScheduler};
/// use std::sync::mpsc;
/// use std::time::Duration;
///
/// let (tx, rx) = mpsc::channel();
/// let handle = ThreadScheduler::new()
///     .schedule(
///         Duration::from_millis(10),
///         Box::new(move || tx.send("fired").unwrap()),
///     )
///     .unwrap();
///
/// assert_eq!(rx.recv().unwrap(), "fired");
/// handle.join();
/// ```
#[derive(Debug, Clone, Default)]
pub struct ThreadScheduler {
    name: Option<String>,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the timer threads (shows up in panics and debuggers)
    pub fn with_thread_name(name: impl Into<String>) -> Self {
        ThreadScheduler {
            name: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Pending,
    Cancelled,
    Fired,
}

#[derive(Debug, Default)]
struct TimerState {
    phase: Mutex<Phase>,
    wakeup: Condvar,
    finished: AtomicBool,
}

/// Handle to an action pending on a [`ThreadScheduler`]
#[derive(Debug)]
pub struct TimerHandle {
    state: Arc<TimerState>,
    thread: thread::JoinHandle<()>,
}

impl TimerHandle {
    /// Prevent the action from running if it has not started yet
    ///
    /// Returns `true` if the action was still pending.
    pub fn cancel(&self) -> bool {
        let mut phase = self.state.phase.lock();
        if *phase != Phase::Pending {
            return false;
        }
        *phase = Phase::Cancelled;
        self.state.wakeup.notify_one();
        true
    }

    /// Whether the timer thread is done, by firing or by cancellation
    pub fn is_finished(&self) -> bool {
        self.state.finished.load(Ordering::Acquire)
    }

    /// Block until the timer thread exits
    pub fn join(self) {
        // A panicking action has already reported itself on that thread
        let _ = self.thread.join();
    }
}

impl Scheduler for ThreadScheduler {
    type Handle = TimerHandle;

    fn schedule(&self, delay: Duration, action: Action) -> Result<TimerHandle, ScheduleError> {
        let state = Arc::new(TimerState::default());
        let timer = Arc::clone(&state);
        let deadline = Instant::now().checked_add(delay);

        let run = move || {
            let mut phase = timer.phase.lock();
            while *phase == Phase::Pending {
                match deadline {
                    Some(deadline) => {
                        if timer.wakeup.wait_until(&mut phase, deadline).timed_out() {
                            break;
                        }
                    }
                    // Too far out to represent; only cancellation ends the wait
                    None => timer.wakeup.wait(&mut phase),
                }
            }
            let fire = *phase == Phase::Pending;
            if fire {
                *phase = Phase::Fired;
            }
            drop(phase);

            if fire {
                action();
            }
            timer.finished.store(true, Ordering::Release);
        };

        let mut builder = thread::Builder::new();
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }

        let thread = builder.spawn(run).map_err(|e| {
            tracing::error!("failed to spawn timer thread: {e}");
            ScheduleError::ThreadSpawn {
                reason: e.to_string(),
            }
        })?;

        Ok(TimerHandle { state, thread })
    }
}
