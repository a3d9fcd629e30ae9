//! Retry policy for backend calls.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// How the pipeline reacts to failed attempts.
///
/// Retryable failures (empty response, timeout, transient backend error)
/// are retried up to `max_attempts` total attempts with exponential backoff
/// and jitter. With `correct_once`, the first malformed or schema-violating
/// reply triggers one corrective re-prompt; that attempt does not count
/// against `max_attempts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "millis")]
    pub base_delay: Duration,
    #[serde(with = "millis")]
    pub max_delay: Duration,
    pub correct_once: bool,
}

impl Default for RetryPolicy {
    /// A single attempt, no correction.
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            correct_once: false,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_correction(mut self, correct_once: bool) -> Self {
        self.correct_once = correct_once;
        self
    }

    /// Whether another attempt is allowed after `attempt` (1-based) failed.
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts.max(1)
    }

    /// Upper bound of the backoff before attempt `attempt + 1`.
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }

    /// Jittered delay before attempt `attempt + 1`: uniform in the upper
    /// half of the backoff ceiling.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let ceiling = self.backoff_ceiling(attempt);
        if ceiling.is_zero() {
            return ceiling;
        }
        let factor = rand::rng().random_range(0.5..=1.0);
        ceiling.mul_f64(factor)
    }
}

/// Serialize durations as whole milliseconds in config files.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_a_single_attempt() {
        let policy = RetryPolicy::default();
        assert!(!policy.allows_retry_after(1));
        assert!(!policy.correct_once);
    }

    #[test]
    fn zero_attempts_behaves_like_one() {
        let policy = RetryPolicy::default().with_max_attempts(0);
        assert!(!policy.allows_retry_after(1));
    }

    #[test]
    fn backoff_doubles_until_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            correct_once: false,
        };
        assert_eq!(policy.backoff_ceiling(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_ceiling(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_ceiling(3), Duration::from_millis(350));
        assert_eq!(policy.backoff_ceiling(40), Duration::from_millis(350));
    }

    #[test]
    fn jitter_stays_in_upper_half() {
        let policy = RetryPolicy::default().with_max_attempts(3);
        for _ in 0..100 {
            let d = policy.delay_after(2);
            assert!(d >= Duration::from_millis(500));
            assert!(d <= Duration::from_millis(1000));
        }
    }

    #[test]
    fn deserializes_from_toml_with_defaults() {
        let policy: RetryPolicy = toml::from_str("max_attempts = 3\nbase_delay = 250").unwrap();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_secs(8));
        assert!(!policy.correct_once);
    }
}
