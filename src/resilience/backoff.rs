//! Receipt polling schedule.

use rand::Rng;
use std::time::Duration;

use crate::config::TransactionConfig;

/// How long to wait for a receipt and how far apart the polls are.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub base_interval_ms: u64,
    pub max_interval_ms: u64,
}

impl From<&TransactionConfig> for PollPolicy {
    fn from(config: &TransactionConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.confirmation_timeout_secs),
            base_interval_ms: config.poll_interval_ms,
            max_interval_ms: config.max_poll_interval_ms.max(config.poll_interval_ms),
        }
    }
}

impl PollPolicy {
    /// Pause before poll number `attempt`.
    ///
    /// The first poll goes out immediately. Empty polls double the interval
    /// up to `max_interval_ms`, with up to 10% jitter so concurrent waiters
    /// spread out.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let interval = 1u64
            .checked_shl(attempt - 1)
            .and_then(|factor| self.base_interval_ms.checked_mul(factor))
            .map_or(self.max_interval_ms, |ms| ms.min(self.max_interval_ms));

        let spread = interval / 10;
        let jitter = if spread > 0 {
            rand::thread_rng().gen_range(0..spread)
        } else {
            0
        };
        Duration::from_millis(interval + jitter)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base: u64, max: u64) -> PollPolicy {
        PollPolicy {
            timeout: Duration::from_secs(1),
            base_interval_ms: base,
            max_interval_ms: max,
        }
    }

    #[test]
    fn test_interval_doubles_until_capped() {
        let p = policy(100, 1000);
        assert_eq!(p.delay_before(0), Duration::ZERO);

        let first = p.delay_before(1).as_millis();
        assert!((100..110).contains(&first));

        let second = p.delay_before(2).as_millis();
        assert!((200..220).contains(&second));

        let capped = p.delay_before(10).as_millis();
        assert!((1000..1100).contains(&capped));
    }

    #[test]
    fn test_huge_attempt_stays_at_cap() {
        let p = policy(100, 500);
        let late = p.delay_before(u32::MAX).as_millis();
        assert!((500..550).contains(&late));
    }

    #[test]
    fn test_from_config_never_caps_below_base() {
        let config = TransactionConfig {
            poll_interval_ms: 800,
            max_poll_interval_ms: 100,
            confirmation_timeout_secs: 3,
            ..Default::default()
        };
        let p = PollPolicy::from(&config);
        assert_eq!(p.timeout, Duration::from_secs(3));
        assert_eq!(p.max_interval_ms, 800);
    }
}
