//! Self-employment status check against npd.nalog.ru.

use crate::registry::client::ResilientClient;
use crate::registry::transport::HttpTransport;
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

const BASE_URL: &str = "https://statusnpd.nalog.ru/api/v1/tracker";

/// Client for the federal self-employed (НПД) status tracker
pub struct NalogClient {
    client: ResilientClient,
}

impl NalogClient {
    /// Creates a production client (the tracker needs no credentials)
    #[must_use]
    pub fn new() -> Self {
        Self::with_client(ResilientClient::new(
            Arc::new(HttpTransport::new(BASE_URL)),
            "nalog",
        ))
    }

    /// Assembles a client from an explicit resilient client (test seam)
    #[must_use]
    pub fn with_client(client: ResilientClient) -> Self {
        Self { client }
    }

    /// Checks whether `inn` is registered as self-employed on `date`
    /// (today when omitted). Returns the raw tracker payload.
    pub async fn check_selfemployed(&self, inn: &str, date: Option<NaiveDate>) -> Option<Value> {
        let date = date.unwrap_or_else(|| Utc::now().date_naive());
        let body = json!({
            "inn": inn,
            "requestDate": date.format("%Y-%m-%d").to_string(),
        });
        self.client.post("taxpayer_status", &body).await
    }
}

impl Default for NalogClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::breaker::CircuitBreaker;
    use crate::registry::retry::RetryPolicy;
    use crate::registry::transport::MockTransport;
    use std::time::Duration;

    #[tokio::test]
    async fn test_request_carries_inn_and_date() {
        let mut transport = MockTransport::new();
        transport
            .expect_post_json()
            .withf(|endpoint, body| {
                endpoint == "taxpayer_status"
                    && body["inn"] == "500100732259"
                    && body["requestDate"] == "2026-08-05"
            })
            .times(1)
            .returning(|_, _| Ok(json!({"status": true, "message": "зарегистрирован"})));

        let client = NalogClient::with_client(ResilientClient::with_policy(
            Arc::new(transport),
            "nalog",
            RetryPolicy::new(0, Duration::from_millis(1), Duration::from_millis(1)),
            CircuitBreaker::new(5, Duration::from_secs(60)),
        ));
        let date = NaiveDate::from_ymd_opt(2026, 8, 5);
        let status = client.check_selfemployed("500100732259", date).await;
        assert_eq!(
            status.as_ref().and_then(|s| s["status"].as_bool()),
            Some(true)
        );
    }
}
