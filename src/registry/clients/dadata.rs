//! DaData — the secondary/enrichment source.
//!
//! Uses the findById/party suggestion endpoint; the first suggestion wins.
//! DaData bills per call, so responses sit in a short in-memory cache in
//! front of the resilient client.

use crate::config::{DADATA_CACHE_MAX_CAPACITY, DADATA_CACHE_TTL_SECS, UPSTREAM_RATE_PER_SEC};
use crate::registry::client::ResilientClient;
use crate::registry::rate_limit::GlobalRateLimiter;
use crate::registry::transport::HttpTransport;
use moka::future::Cache;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const BASE_URL: &str = "https://suggestions.dadata.ru/suggestions/api/4_1/rs";

/// Default branch filter: head offices only
const BRANCH_TYPE_MAIN: &str = "MAIN";

/// Client for the DaData party-suggestion API
pub struct DadataClient {
    client: ResilientClient,
    limiter: Arc<GlobalRateLimiter>,
    cache: Cache<String, Value>,
}

impl DadataClient {
    /// Creates a production client authorized with `Token <api_key>`
    #[must_use]
    pub fn new(api_key: &str) -> Self {
        Self::with_client(
            ResilientClient::new(
                Arc::new(HttpTransport::with_auth(BASE_URL, format!("Token {api_key}"))),
                "dadata",
            ),
            Arc::new(GlobalRateLimiter::new(UPSTREAM_RATE_PER_SEC)),
        )
    }

    /// Assembles a client from explicit parts (test seam)
    #[must_use]
    pub fn with_client(client: ResilientClient, limiter: Arc<GlobalRateLimiter>) -> Self {
        let cache = Cache::builder()
            .max_capacity(DADATA_CACHE_MAX_CAPACITY)
            .time_to_live(Duration::from_secs(DADATA_CACHE_TTL_SECS))
            .build();
        Self {
            client,
            limiter,
            cache,
        }
    }

    /// Finds a company or sole proprietor by INN/OGRN. Returns the first
    /// suggestion, or `None` when nothing matched or the upstream is
    /// unavailable. Only found suggestions are cached.
    pub async fn find_party(&self, query: &str, branch_type: Option<&str>) -> Option<Value> {
        let branch = branch_type.unwrap_or(BRANCH_TYPE_MAIN);
        let cache_key = format!("{query}|{branch}");
        if let Some(hit) = self.cache.get(&cache_key).await {
            debug!("dadata suggestion cache hit for {query}");
            return Some(hit);
        }

        self.limiter.acquire().await;

        let body = json!({
            "query": query,
            "count": 1,
            "branch_type": branch,
        });
        let response = self.client.post("findById/party", &body).await?;
        let suggestion = response
            .get("suggestions")
            .and_then(Value::as_array)
            .and_then(|s| s.first())
            .cloned()?;

        self.cache.insert(cache_key, suggestion.clone()).await;
        Some(suggestion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::breaker::CircuitBreaker;
    use crate::registry::retry::RetryPolicy;
    use crate::registry::transport::MockTransport;

    fn dadata(transport: MockTransport) -> DadataClient {
        DadataClient::with_client(
            ResilientClient::with_policy(
                Arc::new(transport),
                "dadata",
                RetryPolicy::new(0, Duration::from_millis(1), Duration::from_millis(1)),
                CircuitBreaker::new(5, Duration::from_secs(60)),
            ),
            Arc::new(GlobalRateLimiter::new(100)),
        )
    }

    #[tokio::test]
    async fn test_first_suggestion_wins() {
        let mut transport = MockTransport::new();
        transport
            .expect_post_json()
            .withf(|endpoint, body| {
                endpoint == "findById/party"
                    && body["query"] == "7707083893"
                    && body["branch_type"] == "MAIN"
            })
            .times(1)
            .returning(|_, _| {
                Ok(json!({"suggestions": [
                    {"value": "ПАО СБЕРБАНК", "data": {"inn": "7707083893"}},
                    {"value": "Филиал", "data": {"inn": "7707083893"}}
                ]}))
            });

        let client = dadata(transport);
        let suggestion = client.find_party("7707083893", None).await;
        assert_eq!(
            suggestion.as_ref().and_then(|s| s["value"].as_str()),
            Some("ПАО СБЕРБАНК")
        );
    }

    #[tokio::test]
    async fn test_repeat_query_served_from_cache() {
        let mut transport = MockTransport::new();
        transport.expect_post_json().times(1).returning(|_, _| {
            Ok(json!({"suggestions": [{"value": "ООО Ромашка", "data": {"inn": "7707083893"}}]}))
        });

        let client = dadata(transport);
        let first = client.find_party("7707083893", None).await;
        // Second call must not reach the transport (mockall enforces times(1))
        let second = client.find_party("7707083893", None).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_empty_suggestions_not_cached() {
        let mut transport = MockTransport::new();
        transport
            .expect_post_json()
            .times(2)
            .returning(|_, _| Ok(json!({"suggestions": []})));

        let client = dadata(transport);
        assert_eq!(client.find_party("0000000000", None).await, None);
        // A miss goes upstream again — negative results are never cached
        assert_eq!(client.find_party("0000000000", None).await, None);
    }
}
