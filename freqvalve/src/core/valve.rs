//! Throttle with scheduled eviction
//!
//! [`Valve`] hands every admitted value to a [`Scheduler`], which removes it
//! again once its delay has elapsed. Removals run on timer threads or runtime
//! tasks, so the bucket is shared behind a mutex.

use super::schedule::{Scheduler, ThreadScheduler};
use super::throttle::{Key, Throttle};
use super::ThrottleError;
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use std::time::Duration;

// Configuration constants
const DEFAULT_CAPACITY: usize = 16;

/// Identity of one admitted value
///
/// Two equal values admitted separately get different ids, so each scheduled
/// removal deletes exactly the entry it was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

#[derive(Debug)]
struct Entry<T> {
    id: EntryId,
    value: T,
}

type Bucket<T> = Mutex<Vec<Entry<T>>>;

/// Throttle whose entries remove themselves after their delay
///
/// # Example
///
/// ```
/// use freqvalve::{CheckOptions, Throttle, Valve};
/// use std::time::Duration;
///
/// let mut valve = Valve::threaded();
/// let options = CheckOptions::new();
///
/// assert_eq!(valve.check(Duration::from_millis(20), 1, "job", &options).unwrap(), 1);
/// assert_eq!(valve.check(Duration::from_millis(20), 1, "job", &options).unwrap(), 0);
///
/// std::thread::sleep(Duration::from_millis(200));
/// assert_eq!(valve.count(None), 0);
/// ```
///
/// # Thread Safety
///
/// The bucket is locked for every read and mutation, so removals firing on
/// other threads never race with [`check`](Throttle::check). `check` itself
/// takes `&mut self`; to share one valve between threads, wrap it in a mutex.
#[derive(Debug)]
pub struct Valve<T, S = ThreadScheduler> {
    bucket: Arc<Bucket<T>>,
    scheduler: S,
    next_id: u64,
}

/// Builder for configuring a [`Valve`]
///
/// # Example
///
/// ```
/// use freqvalve::{ThreadScheduler, Valve};
///
/// let valve: Valve<String> = Valve::builder(ThreadScheduler::with_thread_name("evict"))
///     .capacity(256)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ValveBuilder<T, S> {
    capacity: usize,
    scheduler: S,
    values: PhantomData<fn() -> T>,
}

impl<T> Valve<T, ThreadScheduler> {
    /// Create a valve that evicts on timer threads
    pub fn threaded() -> Self {
        Self::new(ThreadScheduler::new())
    }
}

impl<T, S: Scheduler> Valve<T, S> {
    /// Create a valve that evicts through `scheduler`
    pub fn new(scheduler: S) -> Self {
        Self::with_config(DEFAULT_CAPACITY, scheduler)
    }

    /// Create a new builder
    pub fn builder(scheduler: S) -> ValveBuilder<T, S> {
        ValveBuilder {
            capacity: DEFAULT_CAPACITY,
            scheduler,
            values: PhantomData,
        }
    }

    fn with_config(capacity: usize, scheduler: S) -> Self {
        Valve {
            bucket: Arc::new(Mutex::new(Vec::with_capacity(capacity))),
            scheduler,
            next_id: 0,
        }
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Snapshot of the tracked values in insertion order
    pub fn values(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.bucket
            .lock()
            .iter()
            .map(|entry| entry.value.clone())
            .collect()
    }

    /// Remove an entry now instead of waiting for its removal to fire
    ///
    /// Returns `false` if the entry is already gone.
    pub fn discard(&self, id: EntryId) -> bool {
        remove_entry(&self.bucket, id)
    }

    fn next_entry_id(&mut self) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl<T, S> Throttle<T> for Valve<T, S>
where
    T: Send + 'static,
    S: Scheduler,
{
    type Receipt = (EntryId, S::Handle);

    fn count(&self, key: Option<Key<'_, T>>) -> usize {
        let bucket = self.bucket.lock();
        match key {
            Some(key) => bucket.iter().filter(|entry| key(&entry.value)).count(),
            None => bucket.len(),
        }
    }

    fn observe(&mut self, value: T, delay: Duration) -> Result<Self::Receipt, ThrottleError> {
        let id = self.next_entry_id();
        self.bucket.lock().push(Entry { id, value });

        // The action must not keep the bucket alive once the valve is gone
        let bucket = Arc::downgrade(&self.bucket);
        match self
            .scheduler
            .schedule(delay, Box::new(move || expire(&bucket, id)))
        {
            Ok(handle) => Ok((id, handle)),
            Err(e) => {
                // Nothing would ever remove it
                remove_entry(&self.bucket, id);
                Err(e.into())
            }
        }
    }
}

fn expire<T>(bucket: &Weak<Bucket<T>>, id: EntryId) {
    match bucket.upgrade() {
        Some(bucket) => {
            if !remove_entry(&bucket, id) {
                tracing::trace!(?id, "entry already removed");
            }
        }
        None => tracing::trace!(?id, "valve dropped before removal"),
    }
}

fn remove_entry<T>(bucket: &Bucket<T>, id: EntryId) -> bool {
    let mut entries = bucket.lock();
    match entries.iter().position(|entry| entry.id == id) {
        Some(index) => {
            entries.remove(index);
            tracing::trace!(?id, tracked = entries.len(), "removed entry");
            true
        }
        None => false,
    }
}

impl<T, S: Scheduler> ValveBuilder<T, S> {
    /// Pre-allocate room for `capacity` tracked values
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Build the valve with the configured settings
    pub fn build(self) -> Valve<T, S> {
        Valve::with_config(self.capacity, self.scheduler)
    }
}
