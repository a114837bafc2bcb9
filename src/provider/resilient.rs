use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

use crate::config::ProviderConfig;
use crate::models::route::RouteCandidate;
use crate::provider::{ProviderError, ProviderResult, RouteQuery, RoutingProvider};

/// Exponential backoff with up to 10% jitter. Attempt 0 has no delay.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let capped_delay = base_ms.saturating_mul(exponential_base).min(max_ms);

    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Adds a per-call timeout and bounded retries of transient failures to any provider.
pub struct ResilientProvider {
    inner: Arc<dyn RoutingProvider>,
    config: ProviderConfig,
}

impl ResilientProvider {
    pub fn new(inner: Arc<dyn RoutingProvider>, config: ProviderConfig) -> Self {
        Self { inner, config }
    }

    async fn attempt(&self, query: &RouteQuery) -> ProviderResult<Vec<RouteCandidate>> {
        match tokio::time::timeout(self.config.timeout, self.inner.fetch_routes(query)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.config.timeout.as_millis() as u64)),
        }
    }
}

#[async_trait]
impl RoutingProvider for ResilientProvider {
    async fn fetch_routes(&self, query: &RouteQuery) -> ProviderResult<Vec<RouteCandidate>> {
        let mut retry = 0;
        loop {
            match self.attempt(query).await {
                Ok(routes) => return Ok(routes),
                Err(err) if err.is_retryable() && retry < self.config.max_retries => {
                    retry += 1;
                    let delay = calculate_backoff(
                        retry,
                        self.config.backoff_base_ms,
                        self.config.backoff_max_ms,
                    );
                    warn!(
                        provider = self.inner.name(),
                        error = %err,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        "provider call failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
