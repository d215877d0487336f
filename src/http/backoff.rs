use std::time::Duration;

use rand::Rng;

/// Exponential backoff with attempt-scaled jitter.
///
/// `delay(n) = base * 2^(n-1) + uniform(0..=jitter * n)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    jitter: Duration,
}

impl Backoff {
    pub fn new(base: Duration, jitter: Duration) -> Self {
        Self { base, jitter }
    }

    /// Backoff without a random component.
    pub fn fixed_exponential(base: Duration) -> Self {
        Self::new(base, Duration::ZERO)
    }

    /// Delay before retrying after failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let exp = self
            .base
            .saturating_mul(2u32.saturating_pow(attempt - 1));

        let max_jitter_ms = self
            .jitter
            .saturating_mul(attempt)
            .as_millis()
            .min(u128::from(u64::MAX)) as u64;
        if max_jitter_ms == 0 {
            return exp;
        }

        let jitter_ms = rand::rng().random_range(0..=max_jitter_ms);
        exp.saturating_add(Duration::from_millis(jitter_ms))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(1))
    }
}

/// Delay for `attempt` under the default one-second policy.
pub fn backoff_delay(attempt: u32) -> Duration {
    Backoff::default().delay(attempt)
}
