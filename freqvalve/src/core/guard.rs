//! Throttled function calls
//!
//! [`Guard`] puts a throttle in front of a function. Every call computes a
//! value from its arguments, checks it against the throttle, and only runs the
//! function when there was room. Throttled calls yield a fallback instead.

use super::ThrottleError;
use super::lazy::Static;
use super::throttle::{CheckOptions, Throttle};
use std::fmt;
use std::time::Duration;

type KeyFn<A, T> = Box<dyn Fn(&A) -> T + Send + Sync>;

/// A throttle bound to fixed check parameters, guarding calls with arguments `A`
///
/// By default every call tracks `()`, so the guard limits how often the
/// function runs at all. [`GuardBuilder::key`] derives the tracked value from
/// the arguments instead, and [`GuardBuilder::strict`] makes each distinct
/// value count only against itself.
///
/// # Example
///
/// ```
/// use freqvalve::Guard;
/// use std::time::Duration;
///
/// // At most 2 greetings per name per minute
/// let mut greet = Guard::builder(Duration::from_secs(60), 2)
///     .strict_on_args()
///     .build_default();
///
/// let hello = |name: &str| format!("hello {name}");
///
/// assert_eq!(greet.call("ana", hello).unwrap().as_deref(), Some("hello ana"));
/// assert_eq!(greet.call("ana", hello).unwrap().as_deref(), Some("hello ana"));
/// assert_eq!(greet.call("ana", hello).unwrap(), None);
/// assert_eq!(greet.call("bo", hello).unwrap().as_deref(), Some("hello bo"));
/// ```
pub struct Guard<A, T, Th> {
    throttle: Th,
    key: KeyFn<A, T>,
    settings: Settings,
}

#[derive(Debug, Clone, Copy)]
struct Settings {
    delay: Duration,
    limit: u32,
    strict: bool,
    bypass: bool,
    excess: Option<u32>,
    rate: f64,
}

/// Builder for configuring a [`Guard`]
pub struct GuardBuilder<A, T> {
    key: KeyFn<A, T>,
    settings: Settings,
}

impl<A> Guard<A, (), Static<()>> {
    /// Start configuring a guard allowing `limit` calls per `delay`
    pub fn builder(delay: Duration, limit: u32) -> GuardBuilder<A, ()> {
        GuardBuilder {
            key: Box::new(|_: &A| ()),
            settings: Settings {
                delay,
                limit,
                strict: false,
                bypass: false,
                excess: None,
                rate: 1.0,
            },
        }
    }

    /// Guard allowing `limit` calls per `delay`, lazily evicted
    pub fn with_defaults(delay: Duration, limit: u32) -> Self {
        Self::builder(delay, limit).build_default()
    }
}

impl<A, T, Th> Guard<A, T, Th>
where
    Th: Throttle<T>,
    T: PartialEq + Clone,
{
    /// Check the throttle for `args` without calling anything
    ///
    /// Returns `true` if the call may proceed. A value tracked only because
    /// of bypass or excess does not let the call through.
    pub fn admit(&mut self, args: &A) -> Result<bool, ThrottleError> {
        let value = (self.key)(args);
        let settings = self.settings;

        let target = value.clone();
        let same_value = move |tracked: &T| *tracked == target;

        let mut options = CheckOptions::new()
            .bypass(settings.bypass)
            .rate(settings.rate);
        if let Some(excess) = settings.excess {
            options = options.excess(excess);
        }
        if settings.strict {
            options = options.key(&same_value);
        }

        let left = self
            .throttle
            .check(settings.delay, settings.limit, value, &options)?;
        Ok(left > 0)
    }

    /// Run `f(args)` if the throttle allows it, `None` otherwise
    pub fn call<R>(
        &mut self,
        args: A,
        f: impl FnOnce(A) -> R,
    ) -> Result<Option<R>, ThrottleError> {
        if self.admit(&args)? {
            Ok(Some(f(args)))
        } else {
            tracing::debug!("call throttled");
            Ok(None)
        }
    }

    /// Run `f(args)` if the throttle allows it, `fallback` otherwise
    pub fn call_or<R>(
        &mut self,
        args: A,
        fallback: R,
        f: impl FnOnce(A) -> R,
    ) -> Result<R, ThrottleError> {
        Ok(self.call(args, f)?.unwrap_or(fallback))
    }
}

impl<A, T, Th> Guard<A, T, Th> {
    pub fn throttle(&self) -> &Th {
        &self.throttle
    }

    pub fn throttle_mut(&mut self) -> &mut Th {
        &mut self.throttle
    }

    pub fn into_throttle(self) -> Th {
        self.throttle
    }
}

impl<A, T, Th: fmt::Debug> fmt::Debug for Guard<A, T, Th> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("throttle", &self.throttle)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<A, T> GuardBuilder<A, T> {
    /// Track the value computed by `key` instead of `()`
    pub fn key<U>(self, key: impl Fn(&A) -> U + Send + Sync + 'static) -> GuardBuilder<A, U> {
        GuardBuilder {
            key: Box::new(key),
            settings: self.settings,
        }
    }

    /// Only count tracked values equal to the current one
    pub fn strict(mut self, strict: bool) -> Self {
        self.settings.strict = strict;
        self
    }

    /// Track the arguments themselves and throttle each distinct one separately
    pub fn strict_on_args(self) -> GuardBuilder<A, A>
    where
        A: Clone,
    {
        self.key(|args: &A| args.clone()).strict(true)
    }

    /// Track values even past the limit (calls are still refused)
    pub fn bypass(mut self, bypass: bool) -> Self {
        self.settings.bypass = bypass;
        self
    }

    /// Track up to `excess` values past the limit with shortened delays
    pub fn excess(mut self, excess: u32) -> Self {
        self.settings.excess = Some(excess);
        self
    }

    /// Multiply every delay by `rate`
    pub fn rate(mut self, rate: f64) -> Self {
        self.settings.rate = rate;
        self
    }

    /// Guard calls with `throttle`
    pub fn build<Th: Throttle<T>>(self, throttle: Th) -> Guard<A, T, Th> {
        Guard {
            throttle,
            key: self.key,
            settings: self.settings,
        }
    }

    /// Guard calls with a lazily evicting [`Static`] throttle
    pub fn build_default(self) -> Guard<A, T, Static<T>> {
        self.build(Static::new())
    }
}
