//! Backoff delay calculation.

use rand::Rng;
use std::time::Duration;

use crate::config::RetryConfig;

/// Delay to wait after failed attempt number `attempt` (1-indexed).
///
/// Exponential: `base * 2^(attempt-1)`; constant: `base`. Both capped at
/// `max_delay_ms`. Jitter is only applied when enabled in the config and
/// never pushes the delay past the cap.
pub fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let delay_ms = if config.exponential_backoff {
        let exponential_base = 2u64.saturating_pow(attempt - 1);
        config.base_delay_ms.saturating_mul(exponential_base)
    } else {
        config.base_delay_ms
    };
    let capped_delay = delay_ms.min(config.max_delay_ms);

    if config.jitter {
        let jittered = capped_delay.saturating_add(jitter(capped_delay));
        Duration::from_millis(jittered.min(config.max_delay_ms))
    } else {
        Duration::from_millis(capped_delay)
    }
}

/// Random extra delay of 0 to 10% of `delay_ms`.
fn jitter(delay_ms: u64) -> u64 {
    let jitter_range = delay_ms / 10;
    if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    }
}
