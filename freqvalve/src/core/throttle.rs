//! The admission contract shared by every throttle
//!
//! A throttle keeps a bucket of tracked values. [`Throttle::check`] counts the
//! bucket against a limit, decides whether the new value is admitted and, if
//! so, tracks it until its delay elapses. The variants only differ in how a
//! tracked value goes away, which they express through the
//! [`observe`](Throttle::observe), [`setup`](Throttle::setup) and
//! [`cleanup`](Throttle::cleanup) hooks.

use super::ThrottleError;
use std::fmt;
use std::time::Duration;

/// Predicate selecting which tracked values count against the limit
pub type Key<'a, T> = &'a dyn Fn(&T) -> bool;

/// Per-call modifiers for [`Throttle::check`]
///
/// # Example
///
/// ```
/// use freqvalve::CheckOptions;
///
/// let is_even = |n: &u32| n % 2 == 0;
/// let options = CheckOptions::new()
///     .key(&is_even)
///     .excess(3)
///     .rate(0.5);
///
/// assert_eq!(options.excess_slots(), Some(3));
/// assert!(!options.is_bypass());
/// ```
pub struct CheckOptions<'a, T> {
    key: Option<Key<'a, T>>,
    bypass: bool,
    excess: Option<u32>,
    rate: f64,
}

impl<'a, T> CheckOptions<'a, T> {
    /// No key, no bypass, no excess, rate 1
    pub fn new() -> Self {
        CheckOptions {
            key: None,
            bypass: false,
            excess: None,
            rate: 1.0,
        }
    }

    /// Only count tracked values matching `key`
    pub fn key(mut self, key: Key<'a, T>) -> Self {
        self.key = Some(key);
        self
    }

    /// Track the value even when the limit is reached
    pub fn bypass(mut self, bypass: bool) -> Self {
        self.bypass = bypass;
        self
    }

    /// Allow `excess` extra values beyond the limit
    ///
    /// Values admitted this way are discarded sooner: the delay is scaled by
    /// `(left + excess) / limit`. An excess of zero is the same as none.
    pub fn excess(mut self, excess: u32) -> Self {
        self.excess = Some(excess);
        self
    }

    /// Multiply the delay by `rate` after any excess scaling
    pub fn rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    pub fn key_fn(&self) -> Option<Key<'a, T>> {
        self.key
    }

    pub fn is_bypass(&self) -> bool {
        self.bypass
    }

    /// The excess, if any slots were requested
    pub fn excess_slots(&self) -> Option<u32> {
        self.excess.filter(|&n| n > 0)
    }

    pub fn delay_rate(&self) -> f64 {
        self.rate
    }
}

impl<T> Default for CheckOptions<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CheckOptions<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for CheckOptions<'_, T> {}

impl<T> fmt::Debug for CheckOptions<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckOptions")
            .field("key", &self.key.map(|_| "<fn>"))
            .field("bypass", &self.bypass)
            .field("excess", &self.excess)
            .field("rate", &self.rate)
            .finish()
    }
}

/// Compute the delay a value admitted by [`Throttle::check`] is tracked for
///
/// With `excess`, the delay is multiplied by `(left + excess) / limit`; the
/// result is then multiplied by `rate`. A negative product (possible once
/// bypassed values push `left` far below zero) means the value expires
/// immediately. A product too large for a `Duration` saturates to
/// `Duration::MAX`. When nothing scales the delay it is returned as is.
///
/// # Errors
///
/// - [`ThrottleError::ZeroLimitWithExcess`]: `excess` is set and `limit` is zero
/// - [`ThrottleError::InvalidRate`]: `rate` is negative, NaN or infinite
///
/// # Example
///
/// ```
/// use freqvalve::effective_delay;
/// use std::time::Duration;
///
/// // 1 slot left out of 4, plus 1 excess: (1 + 1) / 4 of the delay, then halved
/// let delay = effective_delay(Duration::from_secs(10), 1, 4, Some(1), 0.5).unwrap();
/// assert_eq!(delay, Duration::from_millis(2500));
/// ```
pub fn effective_delay(
    delay: Duration,
    left: i64,
    limit: u32,
    excess: Option<u32>,
    rate: f64,
) -> Result<Duration, ThrottleError> {
    let excess = excess.filter(|&n| n > 0);
    validate(limit, excess, rate)?;

    let mut factor = rate;
    if let Some(excess) = excess {
        factor *= (left + i64::from(excess)) as f64 / f64::from(limit);
    }
    Ok(scale(delay, factor))
}

fn scale(delay: Duration, factor: f64) -> Duration {
    if factor == 1.0 {
        return delay;
    }
    if factor <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}

fn validate(limit: u32, excess: Option<u32>, rate: f64) -> Result<(), ThrottleError> {
    if let Some(excess) = excess
        && limit == 0
    {
        return Err(ThrottleError::ZeroLimitWithExcess { excess });
    }
    if !rate.is_finite() || rate < 0.0 {
        return Err(ThrottleError::InvalidRate(rate));
    }
    Ok(())
}

/// A frequency tracking throttle
///
/// Implementors provide the bucket ([`count`](Throttle::count)) and the way a
/// value is tracked ([`observe`](Throttle::observe)); [`check`](Throttle::check)
/// is shared.
///
/// Callers go through [`check`](Throttle::check). The
/// [`setup`](Throttle::setup), [`observe`](Throttle::observe) and
/// [`cleanup`](Throttle::cleanup) hooks exist for implementors: `check` runs
/// them in that order, and an implementation may rely on it. Calling a hook
/// on its own is not supported.
pub trait Throttle<T> {
    /// What [`observe`](Throttle::observe) hands back for a tracked value
    type Receipt;

    /// Number of tracked values matching `key` (all of them when `None`)
    fn count(&self, key: Option<Key<'_, T>>) -> usize;

    /// Track `value` and discard it after `delay`
    ///
    /// Called by [`check`](Throttle::check) after [`setup`](Throttle::setup).
    /// On error the value must not be left in the bucket.
    fn observe(&mut self, value: T, delay: Duration) -> Result<Self::Receipt, ThrottleError>;

    /// Runs first in every [`check`](Throttle::check)
    ///
    /// Only `check` calls it.
    fn setup(&mut self) {}

    /// Runs last in every [`check`](Throttle::check), after any observation
    fn cleanup(&mut self) {}

    /// `limit` minus the number of tracked values matching `key`
    ///
    /// Negative once bypassed or excess values overfill the bucket.
    fn remaining(&self, limit: u32, key: Option<Key<'_, T>>) -> i64 {
        i64::from(limit) - self.count(key) as i64
    }

    /// Check the limit and track `value` accordingly
    ///
    /// The value is tracked when there is room under `limit`, when
    /// `options` bypass the limit, or when `options` allow excess values.
    /// Otherwise it is dropped.
    ///
    /// Returns the room left *before* this call, never below zero. Values
    /// admitted through bypass or excess therefore still report `0`.
    ///
    /// # Errors
    ///
    /// See [`effective_delay`]. Arguments are validated before the bucket is
    /// touched. [`ThrottleError::Schedule`] when an admitted value could not
    /// be tracked; the bucket is left as it was.
    ///
    /// # Example
    ///
    /// ```
    /// use freqvalve::{CheckOptions, Static, Throttle};
    /// use std::time::Duration;
    ///
    /// let mut throttle = Static::default();
    /// let window = Duration::from_secs(10);
    /// let options = CheckOptions::new();
    ///
    /// assert_eq!(throttle.check(window, 2, 'a', &options).unwrap(), 2);
    /// assert_eq!(throttle.check(window, 2, 'b', &options).unwrap(), 1);
    /// assert_eq!(throttle.check(window, 2, 'c', &options).unwrap(), 0);
    /// assert_eq!(throttle.values(), &['a', 'b']);
    /// ```
    fn check(
        &mut self,
        delay: Duration,
        limit: u32,
        value: T,
        options: &CheckOptions<'_, T>,
    ) -> Result<u32, ThrottleError> {
        let excess = options.excess_slots();
        let rate = options.delay_rate();
        validate(limit, excess, rate)?;

        self.setup();

        let left = self.remaining(limit, options.key_fn());

        let observed = if excess.is_some() || options.is_bypass() || left > 0 {
            let delay = effective_delay(delay, left, limit, excess, rate)?;
            tracing::debug!(left, limit, ?delay, "admitted");
            self.observe(value, delay).map(drop)
        } else {
            tracing::debug!(limit, "throttled");
            Ok(())
        };

        self.cleanup();
        observed?;

        Ok(left.max(0) as u32)
    }
}
