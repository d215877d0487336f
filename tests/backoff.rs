use std::time::Duration;

use proptest::prelude::*;
use waivepipe::http::backoff::{backoff_delay, Backoff};

proptest! {
    #[test]
    fn default_delay_stays_within_jitter_window(attempt in 1u32..=8) {
        let delay = backoff_delay(attempt).as_millis();
        let floor = 2u128.pow(attempt - 1) * 1000;
        let ceiling = floor + u128::from(attempt) * 1000;

        prop_assert!(delay >= floor, "attempt {attempt}: {delay}ms < {floor}ms");
        prop_assert!(delay <= ceiling, "attempt {attempt}: {delay}ms > {ceiling}ms");
    }

    #[test]
    fn custom_base_scales_exponentially(base_ms in 1u64..500, attempt in 1u32..=6) {
        let backoff = Backoff::new(Duration::from_millis(base_ms), Duration::from_millis(base_ms));
        let delay = backoff.delay(attempt).as_millis();
        let floor = u128::from(base_ms) * 2u128.pow(attempt - 1);
        let ceiling = floor + u128::from(base_ms) * u128::from(attempt);

        prop_assert!(delay >= floor && delay <= ceiling);
    }
}

#[test]
fn fixed_exponential_has_no_jitter() {
    let backoff = Backoff::fixed_exponential(Duration::from_millis(100));
    assert_eq!(backoff.delay(1), Duration::from_millis(100));
    assert_eq!(backoff.delay(2), Duration::from_millis(200));
    assert_eq!(backoff.delay(4), Duration::from_millis(800));
}

#[test]
fn attempt_zero_is_treated_as_first_attempt() {
    let backoff = Backoff::fixed_exponential(Duration::from_secs(1));
    assert_eq!(backoff.delay(0), backoff.delay(1));
}

#[test]
fn large_attempts_saturate_instead_of_overflowing() {
    let backoff = Backoff::fixed_exponential(Duration::from_secs(1));
    assert!(backoff.delay(200) >= backoff.delay(30));
}
