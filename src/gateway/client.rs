use async_trait::async_trait;
use bigdecimal::{BigDecimal, ToPrimitive};
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::domain::GatewayStatus;
use crate::ports::{GatewayCharge, GatewayError, PaymentGateway};

const SANDBOX_SNAP_URL: &str = "https://app.sandbox.midtrans.com";
const SANDBOX_API_URL: &str = "https://api.sandbox.midtrans.com";
const PRODUCTION_SNAP_URL: &str = "https://app.midtrans.com";
const PRODUCTION_API_URL: &str = "https://api.midtrans.com";

#[derive(Debug, Serialize)]
struct ChargeRequest<'a> {
    transaction_details: TransactionDetails<'a>,
    custom_field1: String,
}

#[derive(Debug, Serialize)]
struct TransactionDetails<'a> {
    order_id: &'a str,
    gross_amount: i64,
}

/// Response from the Snap `/snap/v1/transactions` endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct SnapResponse {
    pub token: String,
    pub redirect_url: String,
}

/// Response from the `/v2/{order_id}/status` endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub transaction_status: String,
    #[serde(default)]
    pub status_code: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// HTTP client for a Snap-style payment API
#[derive(Clone)]
pub struct MidtransClient {
    client: Client,
    server_key: String,
    snap_url: String,
    api_url: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl MidtransClient {
    /// Creates a client for `sandbox` or `production`
    pub fn for_environment(server_key: String, environment: &str) -> Self {
        let (snap_url, api_url) = match environment {
            "production" => (PRODUCTION_SNAP_URL, PRODUCTION_API_URL),
            _ => (SANDBOX_SNAP_URL, SANDBOX_API_URL),
        };
        Self::with_circuit_breaker(server_key, snap_url.to_string(), api_url.to_string(), 3, 60)
    }

    /// Creates a client against explicit base URLs with custom circuit breaker configuration
    pub fn with_circuit_breaker(
        server_key: String,
        snap_url: String,
        api_url: String,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        MidtransClient {
            client,
            server_key,
            snap_url,
            api_url,
            circuit_breaker,
        }
    }

    /// Returns the current state of the circuit breaker
    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }

    async fn guarded<T, F>(&self, call: F) -> Result<T, GatewayError>
    where
        F: std::future::Future<Output = Result<T, GatewayError>>,
    {
        match self.circuit_breaker.call(call).await {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitBreakerOpen(
                "payment gateway circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

#[async_trait]
impl PaymentGateway for MidtransClient {
    async fn create_topup_transaction(
        &self,
        user_id: Uuid,
        amount: &BigDecimal,
        order_reference: &str,
    ) -> Result<GatewayCharge, GatewayError> {
        let gross_amount = amount.round(0).to_i64().ok_or_else(|| {
            GatewayError::Rejected(format!("amount {} out of range", amount))
        })?;

        let url = format!("{}/snap/v1/transactions", self.snap_url.trim_end_matches('/'));
        let body = ChargeRequest {
            transaction_details: TransactionDetails {
                order_id: order_reference,
                gross_amount,
            },
            custom_field1: user_id.to_string(),
        };
        let client = self.client.clone();
        let server_key = self.server_key.clone();

        tracing::debug!(reference = %order_reference, gross_amount, "Creating gateway charge");

        let snap = self
            .guarded(async move {
                let response = client
                    .post(&url)
                    .basic_auth(server_key, Some(""))
                    .json(&body)
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    let text = response.text().await.unwrap_or_default();
                    return Err(GatewayError::Rejected(format!("{}: {}", status, text)));
                }

                response
                    .json::<SnapResponse>()
                    .await
                    .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
            })
            .await?;

        Ok(GatewayCharge {
            order_id: order_reference.to_string(),
            status: "pending".to_string(),
            payment_url: snap.redirect_url,
            gateway_id: snap.token,
        })
    }

    async fn get_transaction_status(
        &self,
        order_reference: &str,
    ) -> Result<GatewayStatus, GatewayError> {
        let url = format!(
            "{}/v2/{}/status",
            self.api_url.trim_end_matches('/'),
            order_reference
        );
        let client = self.client.clone();
        let server_key = self.server_key.clone();

        let status = self
            .guarded(async move {
                let response = client
                    .get(&url)
                    .basic_auth(server_key, Some(""))
                    .send()
                    .await?;

                if !response.status().is_success() {
                    return Err(GatewayError::Rejected(response.status().to_string()));
                }

                response
                    .json::<StatusResponse>()
                    .await
                    .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
            })
            .await?;

        GatewayStatus::parse(&status.transaction_status).ok_or_else(|| {
            GatewayError::InvalidResponse(format!(
                "unknown transaction status {}",
                status.transaction_status
            ))
        })
    }

    fn name(&self) -> &'static str {
        "midtrans"
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_call_permitted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(server: &mockito::Server) -> MidtransClient {
        MidtransClient::with_circuit_breaker(
            "server-key".to_string(),
            server.url(),
            server.url(),
            3,
            60,
        )
    }

    #[test]
    fn test_client_for_environment() {
        let client = MidtransClient::for_environment("k".to_string(), "production");
        assert_eq!(client.snap_url, PRODUCTION_SNAP_URL);
        let client = MidtransClient::for_environment("k".to_string(), "sandbox");
        assert_eq!(client.api_url, SANDBOX_API_URL);
        assert_eq!(client.circuit_state(), "closed");
    }

    #[tokio::test]
    async fn test_create_topup_transaction() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/snap/v1/transactions")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "transaction_details": { "order_id": "TXN-ABCD1234", "gross_amount": 200 }
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token":"snap-token","redirect_url":"https://pay.example/snap-token"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let charge = client
            .create_topup_transaction(Uuid::new_v4(), &BigDecimal::from(200), "TXN-ABCD1234")
            .await
            .unwrap();

        assert_eq!(charge.order_id, "TXN-ABCD1234");
        assert_eq!(charge.gateway_id, "snap-token");
        assert_eq!(charge.payment_url, "https://pay.example/snap-token");
    }

    #[tokio::test]
    async fn test_rejected_charge() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/snap/v1/transactions")
            .with_status(401)
            .with_body("unauthorized")
            .create_async()
            .await;

        let result = client_for(&server)
            .create_topup_transaction(Uuid::new_v4(), &BigDecimal::from(10), "TXN-1")
            .await;
        assert!(matches!(result, Err(GatewayError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_get_transaction_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v2/TXN-ABCD1234/status")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"transaction_status":"settlement","status_code":"200"}"#)
            .create_async()
            .await;

        let status = client_for(&server)
            .get_transaction_status("TXN-ABCD1234")
            .await
            .unwrap();
        assert_eq!(status, GatewayStatus::Completed);
    }

    #[tokio::test]
    async fn test_circuit_breaker_opens_after_failures() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Regex(r"^/v2/.*/status$".into()))
            .with_status(500)
            .expect_at_least(3)
            .create_async()
            .await;

        let client = client_for(&server);
        for _ in 0..3 {
            let _ = client.get_transaction_status("TXN-1").await;
        }

        let result = client.get_transaction_status("TXN-1").await;
        assert!(matches!(result, Err(GatewayError::CircuitBreakerOpen(_))));
        assert!(!client.is_available());
    }
}
