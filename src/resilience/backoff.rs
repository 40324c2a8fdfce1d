//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::schema::RetryConfig;

/// Wait before the retry that follows failed attempt `attempt` (1-based):
/// `base_delay_ms * 2^(attempt-1)`, capped at `max_delay_ms`, plus up to 10%
/// jitter. Attempt 0 never waits.
pub fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let Some(doublings) = attempt.checked_sub(1) else {
        return Duration::ZERO;
    };

    let factor = 1u64.checked_shl(doublings).unwrap_or(u64::MAX);
    let delay_ms = config
        .base_delay_ms
        .saturating_mul(factor)
        .min(config.max_delay_ms);

    let jitter_ms = rand::thread_rng().gen_range(0..=delay_ms / 10);
    Duration::from_millis(delay_ms + jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retries(base_delay_ms: u64, max_delay_ms: u64) -> RetryConfig {
        RetryConfig {
            max_attempts: 5,
            base_delay_ms,
            max_delay_ms,
        }
    }

    #[test]
    fn test_doubles_per_attempt() {
        let config = retries(100, 2000);
        assert_eq!(calculate_backoff(0, &config), Duration::ZERO);

        let first = calculate_backoff(1, &config).as_millis();
        assert!((100..=110).contains(&first), "{}", first);

        let third = calculate_backoff(3, &config).as_millis();
        assert!((400..=440).contains(&third), "{}", third);
    }

    #[test]
    fn test_capped_at_max_delay() {
        let config = retries(100, 1000);
        let late = calculate_backoff(40, &config).as_millis();
        assert!((1000..=1100).contains(&late), "{}", late);

        let huge = calculate_backoff(u32::MAX, &config).as_millis();
        assert!((1000..=1100).contains(&huge), "{}", huge);
    }

    #[test]
    fn test_zero_base_never_waits() {
        assert_eq!(calculate_backoff(3, &retries(0, 1000)), Duration::ZERO);
    }
}
