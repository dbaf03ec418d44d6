use super::traits::{GenerationOutput, GenerationProvider, GenerationRequest};
use crate::config::ReliabilityConfig;
use crate::error::ProviderError;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

const MAX_BACKOFF_MS: u64 = 10_000;

/// Ordered-fallback wrapper over interchangeable generation adapters.
///
/// Each adapter is tried in order. Transient failures (unavailable,
/// rate-limited, timed out) are retried on the same adapter with exponential
/// backoff up to `max_retries`; permanent failures skip straight to the next
/// adapter. When every adapter is exhausted the aggregated attempt log is
/// returned, never a fabricated response.
pub struct ReliableProvider {
    providers: Vec<Box<dyn GenerationProvider>>,
    max_retries: u32,
    base_backoff_ms: u64,
    request_timeout: Duration,
}

impl ReliableProvider {
    pub fn new(providers: Vec<Box<dyn GenerationProvider>>, config: &ReliabilityConfig) -> Self {
        Self {
            providers,
            max_retries: config.max_retries,
            base_backoff_ms: config.base_backoff_ms.max(50),
            request_timeout: Duration::from_millis(config.request_timeout_ms.max(1)),
        }
    }

    async fn attempt(
        &self,
        provider: &dyn GenerationProvider,
        request: &GenerationRequest,
    ) -> Result<GenerationOutput, ProviderError> {
        let started = std::time::Instant::now();
        match tokio::time::timeout(self.request_timeout, provider.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                provider: provider.name().to_string(),
                #[allow(clippy::cast_possible_truncation)]
                elapsed_ms: started.elapsed().as_millis() as u64,
            }),
        }
    }
}

impl GenerationProvider for ReliableProvider {
    fn name(&self) -> &str {
        self.providers
            .first()
            .map_or("reliable", |p| p.name())
    }

    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<GenerationOutput, ProviderError>> + Send + 'a>> {
        Box::pin(async move {
            let mut failures = Vec::new();

            for provider in &self.providers {
                let provider_name = provider.name().to_string();
                let mut backoff_ms = self.base_backoff_ms;

                for attempt in 0..=self.max_retries {
                    match self.attempt(provider.as_ref(), request).await {
                        Ok(mut output) => {
                            if attempt > 0 {
                                tracing::info!(
                                    provider = provider_name.as_str(),
                                    attempt,
                                    "provider recovered after retries"
                                );
                            }
                            output.served_by.get_or_insert_with(|| provider_name.clone());
                            return Ok(output);
                        }
                        Err(e) => {
                            let transient = e.is_transient();
                            failures.push(format!(
                                "{provider_name} attempt {}/{}: {e}",
                                attempt + 1,
                                self.max_retries + 1
                            ));

                            if !transient {
                                tracing::warn!(
                                    provider = provider_name.as_str(),
                                    "permanent provider error, switching provider"
                                );
                                break;
                            }

                            if attempt < self.max_retries {
                                tracing::warn!(
                                    provider = provider_name.as_str(),
                                    attempt = attempt + 1,
                                    max_retries = self.max_retries,
                                    "transient provider failure, retrying"
                                );
                                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                                backoff_ms = backoff_ms.saturating_mul(2).min(MAX_BACKOFF_MS);
                            }
                        }
                    }
                }

                tracing::warn!(
                    provider = provider_name.as_str(),
                    "switching to fallback provider"
                );
            }

            Err(ProviderError::Exhausted(failures.join("\n")))
        })
    }
}
