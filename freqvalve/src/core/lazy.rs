//! Throttle with lazy, synchronous eviction
//!
//! [`Static`] never schedules anything. Each admitted value is stored with an
//! expiry timestamp, and every [`check`](Throttle::check) ends by purging the
//! entries whose expiry has passed. This makes it usable without threads or an
//! async runtime, at the cost of counting stale entries until the next check.

use super::clock::{Clock, MonotonicClock};
use super::throttle::{Key, Throttle};
use super::ThrottleError;
use std::marker::PhantomData;
use std::time::{Duration, Instant};

// Configuration constants
const DEFAULT_CAPACITY: usize = 16;

/// Lazily evicting throttle
///
/// Values and their expiries live in two vectors aligned by position: the
/// expiry at index `i` belongs to the value at index `i`. Expiries are
/// measured from the clock reading taken at the start of each
/// [`check`](Throttle::check).
///
/// # Example
///
/// ```
/// use freqvalve::{CheckOptions, ManualClock, Static, Throttle};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let mut throttle = Static::builder().clock(clock.clone()).build();
/// let options = CheckOptions::new();
///
/// assert_eq!(throttle.check(Duration::from_secs(1), 1, "ping", &options).unwrap(), 1);
/// assert_eq!(throttle.check(Duration::from_secs(1), 1, "ping", &options).unwrap(), 0);
///
/// // The first ping is purged at the end of the next check
/// clock.advance(Duration::from_secs(2));
/// throttle.check(Duration::from_secs(1), 1, "ping", &options).unwrap();
/// assert_eq!(throttle.count(None), 0);
/// ```
#[derive(Debug, Clone)]
pub struct Static<T, C = MonotonicClock> {
    bucket: Vec<T>,
    expiries: Vec<Instant>,
    clock: C,
    // Reading taken by `setup`, shared by the rest of the check
    now: Instant,
}

/// Builder for configuring a [`Static`] throttle
///
/// # Example
///
/// ```
/// use freqvalve::{ManualClock, Static};
///
/// let throttle: Static<u64, ManualClock> = Static::builder()
///     .capacity(1024)
///     .clock(ManualClock::new())
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct StaticBuilder<T, C = MonotonicClock> {
    capacity: usize,
    clock: C,
    values: PhantomData<fn() -> T>,
}

impl<T> Static<T, MonotonicClock> {
    /// Create an empty throttle on the monotonic clock
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock)
    }

    /// Create a new builder
    pub fn builder() -> StaticBuilder<T> {
        StaticBuilder::default()
    }
}

impl<T> Default for Static<T, MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Clock> Static<T, C> {
    /// Create an empty throttle reading time from `clock`
    pub fn with_clock(clock: C) -> Self {
        Self::with_config(DEFAULT_CAPACITY, clock)
    }

    fn with_config(capacity: usize, clock: C) -> Self {
        let now = clock.now();
        Static {
            bucket: Vec::with_capacity(capacity),
            expiries: Vec::with_capacity(capacity),
            clock,
            now,
        }
    }

    /// Tracked values in insertion order, including any that expired since
    /// the last check
    pub fn values(&self) -> &[T] {
        &self.bucket
    }

    /// Expiry of each tracked value, aligned with [`values`](Static::values)
    pub fn expiries(&self) -> &[Instant] {
        &self.expiries
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn purge_expired(&mut self) -> usize {
        let mut removed = 0;
        let mut index = 0;

        // Expiries are not sorted (rate and excess vary per call), so every
        // index is visited. After a removal the next entry shifts into
        // `index`, which is then checked again.
        while index < self.expiries.len() {
            if self.expiries[index] > self.now {
                index += 1;
                continue;
            }
            self.expiries.remove(index);
            self.bucket.remove(index);
            removed += 1;
        }

        removed
    }
}

impl<T, C: Clock> Throttle<T> for Static<T, C> {
    type Receipt = Instant;

    fn count(&self, key: Option<Key<'_, T>>) -> usize {
        match key {
            Some(key) => self.bucket.iter().filter(|value| key(value)).count(),
            None => self.bucket.len(),
        }
    }

    fn setup(&mut self) {
        self.now = self.clock.now();
    }

    fn observe(&mut self, value: T, delay: Duration) -> Result<Instant, ThrottleError> {
        // Saturate rather than panic on absurd delays: such a value never expires
        let expiry = self
            .now
            .checked_add(delay)
            .unwrap_or_else(|| far_future(self.now));

        self.bucket.push(value);
        self.expiries.push(expiry);

        Ok(expiry)
    }

    fn cleanup(&mut self) {
        let removed = self.purge_expired();
        if removed > 0 {
            tracing::debug!(removed, tracked = self.bucket.len(), "purged expired values");
        }
    }
}

fn far_future(now: Instant) -> Instant {
    // About 30 years, the same horizon async timers clamp to
    const HORIZON: Duration = Duration::from_secs(86_400 * 365 * 30);
    now.checked_add(HORIZON).unwrap_or(now)
}

impl<T> Default for StaticBuilder<T, MonotonicClock> {
    fn default() -> Self {
        StaticBuilder {
            capacity: DEFAULT_CAPACITY,
            clock: MonotonicClock,
            values: PhantomData,
        }
    }
}

impl<T, C: Clock> StaticBuilder<T, C> {
    /// Pre-allocate room for `capacity` tracked values
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Read time from `clock` instead of the monotonic clock
    pub fn clock<D: Clock>(self, clock: D) -> StaticBuilder<T, D> {
        StaticBuilder {
            capacity: self.capacity,
            clock,
            values: PhantomData,
        }
    }

    /// Build the throttle with the configured settings
    pub fn build(self) -> Static<T, C> {
        Static::with_config(self.capacity, self.clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CheckOptions, ManualClock};

    fn throttle() -> (ManualClock, Static<&'static str, ManualClock>) {
        let clock = ManualClock::new();
        let throttle = Static::builder().clock(clock.clone()).build();
        (clock, throttle)
    }

    #[test]
    fn test_observe_keeps_vectors_aligned() {
        let (clock, mut throttle) = throttle();
        throttle.setup();

        let first = throttle.observe("a", Duration::from_secs(1)).unwrap();
        let second = throttle.observe("b", Duration::from_secs(3)).unwrap();

        assert_eq!(throttle.values(), &["a", "b"]);
        assert_eq!(throttle.expiries(), &[first, second]);
        assert_eq!(second - clock.now(), Duration::from_secs(3));
    }

    #[test]
    fn test_purge_is_not_prefix_only() {
        let (clock, mut throttle) = throttle();
        throttle.setup();
        throttle.observe("first", Duration::from_secs(1)).unwrap();
        throttle.observe("second", Duration::from_secs(5)).unwrap();
        throttle.observe("third", Duration::from_secs(1)).unwrap();

        clock.advance(Duration::from_secs(2));
        throttle.setup();
        throttle.cleanup();

        assert_eq!(throttle.values(), &["second"]);
        assert_eq!(throttle.expiries().len(), 1);
    }

    #[test]
    fn test_purge_handles_adjacent_expired_entries() {
        let (clock, mut throttle) = throttle();
        throttle.setup();
        for value in ["a", "b", "c", "d"] {
            throttle.observe(value, Duration::from_millis(10)).unwrap();
        }
        throttle.observe("e", Duration::from_secs(60)).unwrap();

        clock.advance(Duration::from_millis(10));
        throttle.setup();

        // Expiry equal to now counts as expired
        assert_eq!(throttle.purge_expired(), 4);
        assert_eq!(throttle.values(), &["e"]);
    }

    #[test]
    fn test_expired_values_still_count_until_next_check() {
        let (clock, mut throttle) = throttle();
        let options = CheckOptions::new();

        throttle.check(Duration::from_secs(1), 1, "a", &options).unwrap();
        clock.advance(Duration::from_secs(5));

        // Nothing evicts between checks
        assert_eq!(throttle.count(None), 1);

        // The stale entry still fills the limit during this check...
        assert_eq!(throttle.check(Duration::from_secs(1), 1, "b", &options).unwrap(), 0);
        // ...and is gone afterwards
        assert_eq!(throttle.count(None), 0);
    }

    #[test]
    fn test_zero_delay_expires_in_same_check() {
        let (_clock, mut throttle) = throttle();
        let options = CheckOptions::new();

        assert_eq!(throttle.check(Duration::ZERO, 3, "a", &options).unwrap(), 3);
        assert_eq!(throttle.count(None), 0);
    }

    #[test]
    fn test_huge_delay_saturates() {
        let (clock, mut throttle) = throttle();
        let options = CheckOptions::new();

        assert_eq!(throttle.check(Duration::MAX, 1, "forever", &options).unwrap(), 1);
        assert!(throttle.expiries()[0] > clock.now());

        // Still there after a long while, and rejects the next one
        clock.advance(Duration::from_secs(86_400 * 365));
        let late = throttle.check(Duration::MAX, 1, "late", &CheckOptions::new().rate(2.0));
        assert_eq!(late.unwrap(), 0);
        assert_eq!(throttle.values(), &["forever"]);
    }

    #[test]
    fn test_closure_clock() {
        let start = Instant::now();
        let mut throttle = Static::with_clock(move || start);
        let options = CheckOptions::new();

        assert_eq!(throttle.check(Duration::from_secs(1), 2, 7u8, &options).unwrap(), 2);
        assert_eq!(throttle.expiries(), &[start + Duration::from_secs(1)]);
    }
}
