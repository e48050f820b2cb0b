use async_trait::async_trait;
use bigdecimal::BigDecimal;
use uuid::Uuid;

use crate::domain::GatewayStatus;
use crate::ports::{GatewayCharge, GatewayError, PaymentGateway};

const SANDBOX_PAYMENT_URL: &str = "https://app.sandbox.midtrans.com/snap/v2/vtweb";

/// Offline gateway: every charge is accepted and stays pending until a callback arrives.
#[derive(Debug, Default, Clone)]
pub struct SandboxGateway;

impl SandboxGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn create_topup_transaction(
        &self,
        user_id: Uuid,
        amount: &BigDecimal,
        order_reference: &str,
    ) -> Result<GatewayCharge, GatewayError> {
        tracing::debug!(%user_id, %amount, reference = %order_reference, "Sandbox charge created");

        Ok(GatewayCharge {
            order_id: order_reference.to_string(),
            status: "pending".to_string(),
            payment_url: format!("{}/{}", SANDBOX_PAYMENT_URL, order_reference),
            gateway_id: format!("sandbox-{}", order_reference),
        })
    }

    async fn get_transaction_status(
        &self,
        _order_reference: &str,
    ) -> Result<GatewayStatus, GatewayError> {
        Ok(GatewayStatus::Pending)
    }

    fn name(&self) -> &'static str {
        "sandbox"
    }
}
