use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Attempt budget and backoff shape shared by every fetch path
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: usize,
    /// Delay after attempt `n` is `base_delay * n` plus jitter
    pub base_delay: Duration,
    /// Upper bound of the uniform random jitter added to each delay
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1500),
            max_jitter: Duration::from_millis(1200),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    /// Linear backoff with jitter so retries against one host don't line up
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let linear = self.base_delay * attempt.max(1) as u32;
        let jitter_ms = self.max_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return linear;
        }
        let mut rng = rand::thread_rng();
        linear + Duration::from_millis(rng.gen_range(0..=jitter_ms))
    }
}

/// Run `op` until it succeeds, `should_retry` rejects the error, or attempts run out.
///
/// `op` receives the 1-based attempt number.
pub async fn retry_with_backoff<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
    should_retry: C,
) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && should_retry(&e) => {
                let delay = policy.delay_for(attempt);
                log::warn!(
                    "{} failed, attempt {}/{}: {} (retrying in {}ms)",
                    label,
                    attempt,
                    max_attempts,
                    e,
                    delay.as_millis()
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
