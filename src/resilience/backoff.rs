//! Capped exponential backoff with optional jitter.

use std::time::Duration;
use rand::Rng;

use crate::config::RetryConfig;

/// Delay before the next attempt, given the chain's retry count.
///
/// `base_delay_ms * min(growth_factor ^ retry_count, max_multiplier)`.
/// With the defaults that is 10 ms at count 0, 30 ms at 1, 90 ms at 2,
/// 270 ms at 3 and 500 ms from 4 on.
pub fn calculate_backoff(retry_count: u32, config: &RetryConfig) -> Duration {
    let multiplier = u64::from(config.growth_factor)
        .saturating_pow(retry_count)
        .min(config.max_multiplier);
    let delay_ms = config.base_delay_ms.saturating_mul(multiplier);

    // Jitter only ever shortens the delay, so the cap still holds.
    let ratio = config.jitter_ratio.clamp(0.0, 1.0);
    let jitter_range = (delay_ms as f64 * ratio) as u64;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(delay_ms.saturating_sub(jitter))
}

/// Upper bound of [`calculate_backoff`] for a config.
pub fn max_backoff(config: &RetryConfig) -> Duration {
    Duration::from_millis(config.base_delay_ms.saturating_mul(config.max_multiplier))
}
