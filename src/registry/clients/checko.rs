//! Checko — the primary registry source.
//!
//! Every endpoint answers with an envelope `{"code": <n>, "data": …}`;
//! only `code == 1` carries a usable payload.

use crate::registry::client::ResilientClient;
use crate::registry::rate_limit::GlobalRateLimiter;
use crate::registry::transport::HttpTransport;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

const BASE_URL: &str = "https://api.checko.ru/v2";

/// Client for the Checko company-data API
pub struct CheckoClient {
    client: ResilientClient,
    limiter: Arc<GlobalRateLimiter>,
    api_key: String,
}

impl CheckoClient {
    /// Creates a production client with its own transport and rate limiter
    #[must_use]
    pub fn new(api_key: String) -> Self {
        use crate::config::UPSTREAM_RATE_PER_SEC;
        Self::with_client(
            api_key,
            ResilientClient::new(Arc::new(HttpTransport::new(BASE_URL)), "checko"),
            Arc::new(GlobalRateLimiter::new(UPSTREAM_RATE_PER_SEC)),
        )
    }

    /// Assembles a client from explicit parts (test seam)
    #[must_use]
    pub fn with_client(
        api_key: String,
        client: ResilientClient,
        limiter: Arc<GlobalRateLimiter>,
    ) -> Self {
        Self {
            client,
            limiter,
            api_key,
        }
    }

    /// Legal-entity card by INN or OGRN
    pub async fn company(&self, query: &str) -> Option<Value> {
        self.request("company", &[("inn", query)]).await
    }

    /// Sole-proprietor card by INN or OGRNIP
    pub async fn entrepreneur(&self, query: &str) -> Option<Value> {
        self.request("entrepreneur", &[("inn", query)]).await
    }

    /// Financial statements, extended form
    pub async fn finances(&self, inn: &str) -> Option<Value> {
        self.request("finances", &[("inn", inn), ("extended", "true")])
            .await
    }

    /// Arbitration court cases
    pub async fn arbitrage(&self, inn: &str) -> Option<Value> {
        self.request("arbitrage", &[("inn", inn)]).await
    }

    /// Enforcement proceedings (FSSP)
    pub async fn fssp(&self, inn: &str) -> Option<Value> {
        self.request("fssp", &[("inn", inn)]).await
    }

    /// Government inspections
    pub async fn inspections(&self, inn: &str) -> Option<Value> {
        self.request("inspections", &[("inn", inn)]).await
    }

    /// Public procurement contracts
    pub async fn contracts(&self, inn: &str) -> Option<Value> {
        self.request("contracts", &[("inn", inn)]).await
    }

    async fn request(&self, endpoint: &str, params: &[(&str, &str)]) -> Option<Value> {
        self.limiter.acquire().await;

        let mut query: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        query.push(("key".to_string(), self.api_key.clone()));

        let body = self.client.get(endpoint, &query).await?;
        match body.get("code").and_then(Value::as_i64) {
            Some(1) => body.get("data").cloned(),
            code => {
                info!("checko {endpoint} returned code={code:?}");
                None
            }
        }
    }
}
