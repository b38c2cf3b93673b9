use std::time::Duration;

use crate::foundation::error::{PatchError, PatchResult};
use crate::generate::client::{GenerationClient, GenerationError, GenerationInput};
use crate::raster::bitmap::Bitmap;

/// Exponential backoff for retryable generation failures.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total calls, the first one included.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled before each further one.
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt number `retry + 1`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    pub fn validate(&self) -> PatchResult<()> {
        if !(1..=10).contains(&self.max_attempts) {
            return Err(PatchError::validation(
                "retry.max_attempts must be within [1, 10]",
            ));
        }
        Ok(())
    }
}

/// Run one generation with a per-attempt timeout and backoff on transient failures.
///
/// Each attempt races `client.generate` against `timeout`; a lost race counts as
/// [`GenerationError::Timeout`] and the abandoned attempt is dropped. Non-retryable failures
/// return immediately.
#[tracing::instrument(skip(client, input), fields(max_attempts = policy.max_attempts))]
pub async fn generate_with_retry<C: GenerationClient>(
    client: &C,
    input: GenerationInput<'_>,
    policy: &RetryPolicy,
    timeout: Duration,
) -> Result<Bitmap, GenerationError> {
    let mut attempt = 1u32;
    loop {
        let err = match tokio::time::timeout(timeout, client.generate(input)).await {
            Ok(Ok(patch)) => {
                tracing::info!(
                    attempts = attempt,
                    width = patch.width(),
                    height = patch.height(),
                    "generation succeeded"
                );
                return Ok(patch);
            }
            Ok(Err(e)) => e,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "generation attempt timed out"
                );
                GenerationError::Timeout
            }
        };

        if !err.is_retryable() || attempt >= policy.max_attempts {
            tracing::warn!(error = %err, attempts = attempt, "generation failed");
            return Err(err);
        }

        let delay = policy.delay_for(attempt - 1);
        tracing::warn!(
            error = %err,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            "retrying generation"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_from_base() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(0), Duration::from_secs(2));
        assert_eq!(p.delay_for(1), Duration::from_secs(4));
        assert_eq!(p.delay_for(2), Duration::from_secs(8));
    }

    #[test]
    fn huge_retry_index_saturates() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(80), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn validate_bounds_attempts() {
        for max_attempts in [0, 11] {
            assert!(
                RetryPolicy {
                    max_attempts,
                    base_delay_ms: 1
                }
                .validate()
                .is_err()
            );
        }
        RetryPolicy::default().validate().unwrap();
    }
}
