//! Retry/backoff policy for the main LLM call (§4.9 step 8).

use std::time::Duration;

use ctxcore_core::{is_benign_control_error, OrchestratorError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub factor: f64,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            factor: 2.0,
            cap: Duration::from_secs(8),
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given 1-indexed attempt, capped at `self.cap`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let scaled = self.base.as_secs_f64() * self.factor.powi(exponent as i32);
        Duration::from_secs_f64(scaled.min(self.cap.as_secs_f64()))
    }
}

/// Markers for errors the transport layer should retry (transient,
/// server-side, or rate-limit conditions). Distinct from
/// `is_benign_control_error`, which marks errors that must never retry or
/// trigger fallback regardless of this classification.
const RETRYABLE_MARKERS: [&str; 8] = [
    "rate limit",
    "rate_limit",
    "overloaded",
    "timeout",
    "timed out",
    "connection reset",
    "503",
    "529",
];

pub fn is_retryable_error(message: &str) -> bool {
    if is_benign_control_error(message) {
        return false;
    }
    let lower = message.to_lowercase();
    RETRYABLE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Run `attempt` (1-indexed) against `call`, retrying on retryable errors up
/// to `policy.max_attempts`, sleeping `policy.delay_for_attempt` between
/// tries. Benign errors and errors outside the retry set are returned
/// immediately without fallback being considered.
pub async fn call_with_retry<F, Fut>(policy: &RetryPolicy, mut call: F) -> Result<String, OrchestratorError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<String, OrchestratorError>>,
{
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let message = e.to_string();
                if attempt >= policy.max_attempts || !is_retryable_error(&message) {
                    return Err(e);
                }
                let delay = policy.delay_for_attempt(attempt);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying LLM call");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
