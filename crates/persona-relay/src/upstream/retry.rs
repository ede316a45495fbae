//! Bounded retry with exponential backoff
//!
//! The loop knows nothing about HTTP: it runs an async call, asks the outcome
//! whether it is worth retrying, and sleeps `initial_delay * 2^n` between
//! attempts until the budget is spent.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RetryConfig;

/// Outcome of one attempt, as seen by the retry loop
pub trait Retryable {
    /// Whether another attempt could succeed
    fn is_retryable(&self) -> bool;
}

/// Retry budget and backoff schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Total attempts including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay to wait after the attempt with zero-based index `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.initial_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }

    /// Run `call` until it yields a non-retryable outcome or the budget is spent
    ///
    /// `call` receives the zero-based attempt index. The last outcome is
    /// returned whatever it is; there is no sleep after the final attempt.
    pub async fn execute<T, F, Fut>(&self, mut call: F) -> T
    where
        T: Retryable,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut attempt = 0;
        loop {
            let outcome = call(attempt).await;
            if !outcome.is_retryable() || attempt >= self.max_retries {
                return outcome;
            }

            let delay = self.delay_for(attempt);
            warn!(
                "Retryable upstream failure on attempt {}/{}, waiting {:?}",
                attempt + 1,
                self.max_attempts(),
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    #[derive(Debug, PartialEq)]
    enum Fake {
        Ok,
        Transient,
        Fatal,
    }

    impl Retryable for Fake {
        fn is_retryable(&self) -> bool {
            matches!(self, Fake::Transient)
        }
    }

    /// Runs the policy over a script of outcomes and records when each attempt started
    async fn run_script(policy: RetryPolicy, script: Vec<Fake>) -> (Fake, Vec<Instant>) {
        let script = Arc::new(Mutex::new(script.into_iter()));
        let starts = Arc::new(Mutex::new(Vec::new()));

        let outcome = policy
            .execute(|_| {
                let script = script.clone();
                let starts = starts.clone();
                async move {
                    starts.lock().unwrap().push(Instant::now());
                    script.lock().unwrap().next().unwrap_or(Fake::Transient)
                }
            })
            .await;

        let starts = starts.lock().unwrap().clone();
        (outcome, starts)
    }

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_saturates() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(200), Duration::MAX);
    }

    #[test]
    fn test_from_config() {
        let policy = RetryPolicy::from(&RetryConfig {
            max_retries: 2,
            initial_delay_ms: 250,
        });
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_try_does_not_sleep() {
        let start = Instant::now();
        let (outcome, starts) = run_script(RetryPolicy::default(), vec![Fake::Ok]).await;

        assert_eq!(outcome, Fake::Ok);
        assert_eq!(starts.len(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_transient_then_success() {
        let (outcome, starts) = run_script(
            RetryPolicy::default(),
            vec![Fake::Transient, Fake::Transient, Fake::Ok],
        )
        .await;

        assert_eq!(outcome, Fake::Ok);
        assert_eq!(starts.len(), 3);
        assert!(starts[1] - starts[0] >= Duration::from_millis(1000));
        assert!(starts[2] - starts[1] >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_returns_last_outcome_without_final_wait() {
        let start = Instant::now();
        let (outcome, starts) = run_script(
            RetryPolicy::default(),
            vec![Fake::Transient, Fake::Transient, Fake::Transient, Fake::Transient],
        )
        .await;

        assert_eq!(outcome, Fake::Transient);
        assert_eq!(starts.len(), 4);
        // Three waits: 1s + 2s + 4s, nothing after the fourth attempt
        assert_eq!(start.elapsed(), Duration::from_secs(7));
        assert_eq!(*starts.last().unwrap() - start, Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_outcome_stops_immediately() {
        let (outcome, starts) =
            run_script(RetryPolicy::default(), vec![Fake::Transient, Fake::Fatal, Fake::Ok]).await;

        assert_eq!(outcome, Fake::Fatal);
        assert_eq!(starts.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries() {
        let policy = RetryPolicy {
            max_retries: 0,
            initial_delay: Duration::from_secs(1),
        };
        let (outcome, starts) = run_script(policy, vec![Fake::Transient, Fake::Ok]).await;

        assert_eq!(outcome, Fake::Transient);
        assert_eq!(starts.len(), 1);
    }
}
