use std::time::Duration;

use super::deliverer::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { after: Duration },
    GiveUp,
}

/// Stateless backoff policy: a deterministic function of the attempt count
/// and the error class, so scheduling is fully testable.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// `attempts` is the number of delivery attempts already made,
    /// including the one that just failed.
    pub fn should_retry(&self, attempts: u32, error: &ProviderError) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::GiveUp;
        }
        if attempts >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry {
            after: self.delay_for(attempts),
        }
    }

    /// Exponential from the base delay, doubling per attempt, capped.
    fn delay_for(&self, attempts: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempts.saturating_sub(1));
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transient() -> ProviderError {
        ProviderError::Transient("timeout".to_string())
    }

    fn terminal() -> ProviderError {
        ProviderError::Terminal("bad recipient".to_string())
    }

    #[test]
    fn first_transient_failure_retries_after_base_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.should_retry(1, &transient()),
            RetryDecision::Retry {
                after: Duration::from_secs(1)
            }
        );
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.should_retry(2, &transient()),
            RetryDecision::Retry {
                after: Duration::from_secs(2)
            }
        );
    }

    #[test]
    fn delay_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
        };
        assert_eq!(
            policy.should_retry(9, &transient()),
            RetryDecision::Retry {
                after: Duration::from_secs(4)
            }
        );
    }

    #[test]
    fn budget_exhaustion_gives_up() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.should_retry(3, &transient()), RetryDecision::GiveUp);
        assert_eq!(policy.should_retry(4, &transient()), RetryDecision::GiveUp);
    }

    #[test]
    fn terminal_error_gives_up_regardless_of_budget() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.should_retry(1, &terminal()), RetryDecision::GiveUp);
    }
}
