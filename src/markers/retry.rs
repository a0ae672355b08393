use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

use super::error::MarkerError;

/// Attempts per remote call. One attempt means no retry.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff", with = "crate::config::humantime_serde")]
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: default_backoff(),
        }
    }
}

fn default_max_attempts() -> u32 {
    1
}

fn default_backoff() -> Duration {
    Duration::from_secs(1)
}

impl RetryPolicy {
    /// Runs `op` until it succeeds or the attempts are used up; backoff doubles each time.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, MarkerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, MarkerError>>,
    {
        let mut delay = self.backoff;
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.max_attempts => {
                    log::warn!(
                        "{} failed (attempt {}/{}): {}, retrying in {:?}",
                        what,
                        attempt,
                        self.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
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

    fn failure() -> MarkerError {
        MarkerError::InvalidResponse("boom".into())
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_does_not_retry() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = RetryPolicy::default()
            .run("op", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(failure())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(100),
        };
        let result = policy
            .run("op", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(failure())
                } else {
                    Ok(n)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
