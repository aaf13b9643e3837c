//! Bounded retry with exponential back-off and jitter.
//!
//! Only transport failures and 5xx answers are retried. Anything the service
//! rejected on purpose (4xx envelopes, malformed bodies) is returned at once.
//! When the budget runs out the last error is wrapped in
//! [`ClientError::UpstreamUnavailable`].

use std::future::Future;
use std::time::Duration;

use crate::error::ClientError;

const MAX_DELAY_MS: u64 = 30_000;

/// Returns `true` for errors that are worth retrying after a back-off delay.
pub(crate) fn is_retriable(err: &ClientError) -> bool {
    match err {
        ClientError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        ClientError::Api { status, .. } => *status >= 500,
        ClientError::Deserialize { .. }
        | ClientError::UpstreamUnavailable { .. }
        | ClientError::JobFailed(_)
        | ClientError::NoJob(_)
        | ClientError::InvalidBaseUrl { .. } => false,
    }
}

/// Sleep before retry `attempt` (1-based): `base * 2^(attempt-1)`, capped,
/// then scaled by a random factor in `[0.75, 1.25)`.
pub(crate) fn backoff_delay(backoff_base_ms: u64, attempt: u32) -> Duration {
    let computed = backoff_base_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(10));
    let capped = computed.min(MAX_DELAY_MS);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
    Duration::from_millis(delay_ms)
}

/// Runs `operation` with up to `max_retries` additional attempts on transient errors.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !is_retriable(&err) => return Err(err),
            Err(err) if attempt >= max_retries => {
                tracing::warn!(attempts = attempt + 1, error = %err, "giving up on heatmap service");
                return Err(ClientError::UpstreamUnavailable {
                    attempts: attempt + 1,
                    source: Box::new(err),
                });
            }
            Err(err) => {
                attempt += 1;
                let delay = backoff_delay(backoff_base_ms, attempt);
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient error, retrying after back-off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
