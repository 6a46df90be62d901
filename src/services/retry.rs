use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::services::vision::VisionError;

/// Exponential-backoff retry for transient analysis-service failures.
///
/// The external service enforces a low per-minute quota, so the backoff
/// starts at the quota window and doubles on each attempt. Permanent errors
/// propagate immediately without retrying.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
        }
    }

    /// Run `f`, retrying transient failures up to `max_attempts` total
    /// attempts. The final failure (or any permanent error) is returned
    /// unchanged.
    pub async fn run<T, F, Fut>(&self, mut f: F) -> Result<T, VisionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, VisionError>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient analysis failure, backing off"
                    );
                    sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test]
    async fn transient_failures_are_retried_with_doubling_delay() {
        let calls = AtomicU32::new(0);
        let mut gaps: Vec<Duration> = Vec::new();
        let mut last = Instant::now();

        let policy = RetryPolicy::new(3, Duration::from_millis(20));
        let result = policy
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                let now = Instant::now();
                gaps.push(now - last);
                last = now;
                async move {
                    if n < 3 {
                        Err(VisionError::Transient("throttled".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // First gap is the call overhead; the second and third reflect the
        // 20ms and 40ms sleeps (the delay doubles between attempts).
        assert!(gaps[1] >= Duration::from_millis(20));
        assert!(gaps[2] >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn permanent_errors_do_not_retry() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result: Result<(), _> = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(VisionError::Permanent("bad request".into())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_return_last_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(1));

        let result: Result<(), _> = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(VisionError::Transient("still throttled".into())) }
            })
            .await;

        assert!(matches!(result, Err(VisionError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
