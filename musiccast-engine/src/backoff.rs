//! Reconnect backoff policy
//!
//! Nominal intervals double from `base` up to `cap` and never decrease
//! while a device stays offline. Jitter is applied only to the sleep that
//! is actually taken, so the recorded interval stays monotonic.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff with a cap and symmetric jitter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    /// Fraction of the interval added or removed at random, in `0.0..=1.0`
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(5),
            cap: Duration::from_secs(60),
            jitter: 0.2,
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration, jitter: f64) -> Self {
        Self { base, cap, jitter }
    }

    /// Nominal interval following `previous` (`None` on the first attempt)
    pub fn next(&self, previous: Option<Duration>) -> Duration {
        let floor = self.base.min(self.cap);
        match previous {
            None => floor,
            Some(previous) => previous.saturating_mul(2).clamp(floor, self.cap),
        }
    }

    /// Nominal interval of the `attempt`-th reconnect attempt, counting from zero
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt.min(31)).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// `nominal` with this policy's jitter applied
    pub fn jittered(&self, nominal: Duration) -> Duration {
        apply_jitter(nominal, self.jitter, &mut rand::thread_rng())
    }
}

/// Scale `duration` by a random factor in `[1 - fraction, 1 + fraction]`
pub fn apply_jitter<R: Rng + ?Sized>(duration: Duration, fraction: f64, rng: &mut R) -> Duration {
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    if fraction == 0.0 || duration.is_zero() {
        return duration;
    }
    let factor = rng.gen_range((1.0 - fraction)..=(1.0 + fraction));
    duration.mul_f64(factor)
}
