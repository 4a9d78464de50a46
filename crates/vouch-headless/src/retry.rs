//! Linear reconnect backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Linear retry controller used between watch iterations.
///
/// Delay for attempt `n` is `first + n * step`, capped at `max`, with half
/// jitter applied on top.
#[derive(Debug, Clone)]
pub struct LinearRetry {
    first: Duration,
    step: Duration,
    max: Duration,
    attempt: u32,
}

impl LinearRetry {
    /// Controller for a reconnect ceiling of `max`: the first delay is a full
    /// jitter of `max / 10`, each failure adds `max / 5`.
    #[must_use]
    pub fn for_max_backoff(max: Duration) -> Self {
        Self::new(full_jitter(max / 10), max / 5, max)
    }

    /// Controller with explicit parameters.
    #[must_use]
    pub const fn new(first: Duration, step: Duration, max: Duration) -> Self {
        Self {
            first,
            step,
            max,
            attempt: 0,
        }
    }

    /// Un-jittered delay for the current attempt.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.first
            .saturating_add(self.step.saturating_mul(self.attempt))
            .min(self.max)
    }

    /// Delay to wait before the next attempt.
    #[must_use]
    pub fn delay(&self) -> Duration {
        half_jitter(self.base_delay())
    }

    /// Record a failed attempt.
    pub const fn inc(&mut self) {
        self.attempt = self.attempt.saturating_add(1);
    }

    /// Forget previous failures.
    pub const fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Failures recorded since the last reset.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Uniform duration in `[0, duration)`.
#[must_use]
pub fn full_jitter(duration: Duration) -> Duration {
    let nanos = nanos_of(duration);
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::rng().random_range(0..nanos))
}

/// Uniform duration in `[duration / 2, duration)`.
#[must_use]
pub fn half_jitter(duration: Duration) -> Duration {
    let half = duration / 2;
    half + full_jitter(duration - half)
}

fn nanos_of(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
