//! Bounded exponential-backoff retry around remote calls.
//!
//! Every remote call in the crate (classification and extraction alike) goes
//! through [`RetryingInvoker::invoke`], so backoff policy lives in one place.
//!
//! With the default policy (5 attempts, 1 s base) the waits are
//! 1 s → 2 s → 4 s → 8 s, i.e. at most four sleeps before giving up.

use crate::error::{InvokeError, TransportError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, warn};

/// How many times to try, and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after every failure.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay after the failed attempt `attempt` (0-indexed): `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Something that can wait. Production code uses [`TokioSleeper`].
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Waits on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested delays and returns immediately.
///
/// Handy for tests and dry runs where the backoff schedule matters but the
/// wall-clock wait does not.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delay requested so far, in order.
    pub fn recorded(&self) -> Vec<Duration> {
        self.slept.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut v) = self.slept.lock() {
            v.push(duration);
        }
    }
}

/// Runs a remote call under a [`RetryPolicy`].
#[derive(Clone)]
pub struct RetryingInvoker {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for RetryingInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingInvoker")
            .field("policy", &self.policy)
            .finish()
    }
}

impl RetryingInvoker {
    pub fn new(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    /// Run `call` until it succeeds, fails fatally, or the attempt budget runs out.
    ///
    /// Retryable failures (throttling, transient transport errors) sleep
    /// `base * 2^attempt` and try again; no sleep follows the final attempt.
    /// Fatal failures return immediately.
    pub async fn invoke<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, InvokeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !err.is_retryable() {
                error!("{}: fatal error on attempt {}: {}", operation, attempt + 1, err.message);
                return Err(InvokeError::Fatal {
                    operation: operation.to_string(),
                    source: err,
                });
            }

            if attempt + 1 == max_attempts {
                error!(
                    "{} failed after {} attempts: {}",
                    operation, max_attempts, err.message
                );
                return Err(InvokeError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: max_attempts,
                    last_error: err,
                });
            }

            let delay = self.policy.delay_for(attempt);
            warn!(
                "{} {:?} (attempt {}/{}). Sleeping {:.1}s... Error: {}",
                operation,
                err.kind,
                attempt + 1,
                max_attempts,
                delay.as_secs_f64(),
                err.message
            );
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn invoker(max_attempts: u32, sleeper: Arc<RecordingSleeper>) -> RetryingInvoker {
        RetryingInvoker::new(
            RetryPolicy::new(max_attempts, Duration::from_millis(100)),
            sleeper,
        )
    }

    #[test]
    fn delay_doubles() {
        let p = RetryPolicy::new(5, Duration::from_secs(1));
        assert_eq!(p.delay_for(0), Duration::from_secs(1));
        assert_eq!(p.delay_for(1), Duration::from_secs(2));
        assert_eq!(p.delay_for(3), Duration::from_secs(8));
    }

    #[test]
    fn succeeds_after_k_retryable_failures() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let inv = invoker(5, Arc::clone(&sleeper));
        let calls = AtomicU32::new(0);

        let result = tokio_test::block_on(inv.invoke("op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Err(TransportError::throttled("429"))
                } else {
                    Ok("done")
                }
            }
        }));

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(
            sleeper.recorded(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400)
            ]
        );
    }

    #[test]
    fn exhausts_after_max_attempts() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let inv = invoker(4, Arc::clone(&sleeper));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = tokio_test::block_on(inv.invoke("VLM extraction", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TransportError::transient("connection reset")) }
        }));

        match result {
            Err(InvokeError::RetriesExhausted { attempts, operation, .. }) => {
                assert_eq!(attempts, 4);
                assert_eq!(operation, "VLM extraction");
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(sleeper.recorded().len(), 3);
    }

    #[test]
    fn fatal_error_is_not_retried() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let inv = invoker(5, Arc::clone(&sleeper));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = tokio_test::block_on(inv.invoke("op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TransportError::fatal("400 bad request")) }
        }));

        assert!(matches!(result, Err(InvokeError::Fatal { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.recorded().is_empty());
    }

    #[test]
    fn single_attempt_policy_never_sleeps() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let inv = invoker(1, Arc::clone(&sleeper));
        let result: Result<(), _> = tokio_test::block_on(
            inv.invoke("op", || async { Err(TransportError::throttled("429")) }),
        );
        assert!(matches!(
            result,
            Err(InvokeError::RetriesExhausted { attempts: 1, .. })
        ));
        assert!(sleeper.recorded().is_empty());
    }
}
