use super::{BackendError, GenerationRequest, GenerativeBackend, RetryPolicy};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Retries retryable failures of the wrapped backend with exponential backoff.
pub struct RetryingBackend {
    inner: Arc<dyn GenerativeBackend>,
    policy: RetryPolicy,
}

impl RetryingBackend {
    pub fn new(inner: Arc<dyn GenerativeBackend>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << (attempt.saturating_sub(1)).min(16);
        Duration::from_millis(self.policy.base_delay_ms.saturating_mul(factor))
    }
}

#[async_trait]
impl GenerativeBackend for RetryingBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError> {
        let mut attempt = 0;
        loop {
            match self.inner.generate(request).await {
                Ok(text) => return Ok(text),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    if attempt >= self.policy.max_retries {
                        return Err(BackendError::RetriesExhausted {
                            attempts: attempt + 1,
                            last: Box::new(err),
                        });
                    }
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    warn!(
                        backend = %self.inner.name(),
                        task = %request.task,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Backend call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
