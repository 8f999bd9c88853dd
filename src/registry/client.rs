//! Resilient wrapper around one upstream transport.
//!
//! Composes the retry policy and the circuit breaker around a [`Transport`]
//! and flattens every expected failure mode into "no data": upstream
//! unavailability is a normal outcome here, not an exception.

use crate::registry::breaker::CircuitBreaker;
use crate::registry::error::FetchError;
use crate::registry::retry::RetryPolicy;
use crate::registry::transport::Transport;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio_retry::RetryIf;
use tracing::{debug, warn};

/// One upstream endpoint with bounded retry and a circuit breaker
pub struct ResilientClient {
    transport: Arc<dyn Transport>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    label: &'static str,
}

impl ResilientClient {
    /// Wraps `transport` with the default retry policy and breaker settings
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, label: &'static str) -> Self {
        use crate::config::{BREAKER_COOLDOWN_SECS, BREAKER_FAILURE_THRESHOLD};
        Self::with_policy(
            transport,
            label,
            RetryPolicy::default(),
            CircuitBreaker::new(
                BREAKER_FAILURE_THRESHOLD,
                std::time::Duration::from_secs(BREAKER_COOLDOWN_SECS),
            ),
        )
    }

    /// Wraps `transport` with explicit retry and breaker instances
    #[must_use]
    pub fn with_policy(
        transport: Arc<dyn Transport>,
        label: &'static str,
        retry: RetryPolicy,
        breaker: CircuitBreaker,
    ) -> Self {
        Self {
            transport,
            breaker,
            retry,
            label,
        }
    }

    /// GET with query parameters; `None` means "no data", never an error
    pub async fn get(&self, endpoint: &str, params: &[(String, String)]) -> Option<Value> {
        self.run(endpoint, || self.transport.get_json(endpoint, params))
            .await
    }

    /// POST a JSON body; `None` means "no data", never an error
    pub async fn post(&self, endpoint: &str, body: &Value) -> Option<Value> {
        self.run(endpoint, || self.transport.post_json(endpoint, body))
            .await
    }

    /// Current breaker failure count (for stats)
    #[must_use]
    pub fn breaker_failures(&self) -> u32 {
        self.breaker.failure_count()
    }

    async fn run<F, Fut>(&self, endpoint: &str, mut op: F) -> Option<Value>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Value, FetchError>>,
    {
        if !self.breaker.check() {
            warn!(
                "{}: circuit open, short-circuiting {} request",
                self.label, endpoint
            );
            return None;
        }

        let result = RetryIf::spawn(
            self.retry.backoff(),
            || {
                let attempt = op();
                async {
                    let outcome = attempt.await;
                    match &outcome {
                        Ok(_) => self.breaker.record_success(),
                        Err(e) if e.counts_toward_breaker() => self.breaker.record_failure(),
                        Err(_) => {}
                    }
                    outcome
                }
            },
            FetchError::is_retryable,
        )
        .await;

        match result {
            Ok(value) => {
                debug!("{}: {} ok", self.label, endpoint);
                Some(value)
            }
            Err(e) => {
                warn!("{}: {} resolved to no data: {}", self.label, endpoint, e);
                None
            }
        }
    }
}
