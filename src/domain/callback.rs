//! Payment gateway notifications and the mapping of gateway statuses onto ours.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

use super::transaction::TransactionStatus;

/// Normalised gateway status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStatus {
    Pending,
    Completed,
    Cancelled,
    Failed,
}

impl GatewayStatus {
    /// Map a raw gateway status string. Unknown values yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "settlement" | "capture" => Some(GatewayStatus::Completed),
            "cancel" | "expire" => Some(GatewayStatus::Cancelled),
            "deny" | "failure" => Some(GatewayStatus::Failed),
            "pending" => Some(GatewayStatus::Pending),
            _ => None,
        }
    }

    /// The transaction status this resolves to; `None` while still pending.
    pub fn terminal_status(&self) -> Option<TransactionStatus> {
        match self {
            GatewayStatus::Pending => None,
            GatewayStatus::Completed => Some(TransactionStatus::Completed),
            GatewayStatus::Cancelled => Some(TransactionStatus::Cancelled),
            GatewayStatus::Failed => Some(TransactionStatus::Failed),
        }
    }
}

/// Body of an asynchronous payment notification.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackNotification {
    pub order_id: String,
    pub transaction_status: String,
    pub status_code: String,
    pub gross_amount: String,
    pub signature_key: String,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub fraud_status: Option<String>,
}

impl CallbackNotification {
    pub fn gateway_status(&self) -> Option<GatewayStatus> {
        GatewayStatus::parse(&self.transaction_status)
    }

    /// Check `signature_key` against sha512(order_id + status_code + gross_amount + server_key).
    pub fn verify_signature(&self, server_key: &str) -> bool {
        let expected = compute_signature(
            &self.order_id,
            &self.status_code,
            &self.gross_amount,
            server_key,
        );
        expected
            .as_bytes()
            .ct_eq(self.signature_key.to_ascii_lowercase().as_bytes())
            .into()
    }

    /// `gross_amount` as a decimal, or `None` when it is not a number.
    pub fn gross_amount(&self) -> Option<BigDecimal> {
        self.gross_amount.trim().parse().ok()
    }
}

pub fn compute_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(status: &str, signature: String) -> CallbackNotification {
        CallbackNotification {
            order_id: "TXN-ABCD1234".to_string(),
            transaction_status: status.to_string(),
            status_code: "200".to_string(),
            gross_amount: "200.00".to_string(),
            signature_key: signature,
            payment_type: None,
            transaction_id: None,
            fraud_status: None,
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(GatewayStatus::parse("settlement"), Some(GatewayStatus::Completed));
        assert_eq!(GatewayStatus::parse("capture"), Some(GatewayStatus::Completed));
        assert_eq!(GatewayStatus::parse("expire"), Some(GatewayStatus::Cancelled));
        assert_eq!(GatewayStatus::parse("cancel"), Some(GatewayStatus::Cancelled));
        assert_eq!(GatewayStatus::parse("deny"), Some(GatewayStatus::Failed));
        assert_eq!(GatewayStatus::parse("failure"), Some(GatewayStatus::Failed));
        assert_eq!(GatewayStatus::parse("pending"), Some(GatewayStatus::Pending));
        assert_eq!(GatewayStatus::parse("refund"), None);
        assert_eq!(GatewayStatus::Pending.terminal_status(), None);
    }

    #[test]
    fn test_valid_signature_accepted() {
        let sig = compute_signature("TXN-ABCD1234", "200", "200.00", "server-key");
        assert_eq!(sig.len(), 128);
        assert!(notification("settlement", sig).verify_signature("server-key"));
    }

    #[test]
    fn test_uppercase_signature_accepted() {
        let sig = compute_signature("TXN-ABCD1234", "200", "200.00", "server-key").to_uppercase();
        assert!(notification("settlement", sig).verify_signature("server-key"));
    }

    #[test]
    fn test_gross_amount_parsing() {
        let sig = compute_signature("TXN-ABCD1234", "200", "200.00", "server-key");
        let mut n = notification("settlement", sig);
        assert_eq!(n.gross_amount(), Some(BigDecimal::from(200)));

        n.gross_amount = "two hundred".to_string();
        assert_eq!(n.gross_amount(), None);
    }

    #[test]
    fn test_wrong_key_rejected() {
        let sig = compute_signature("TXN-ABCD1234", "200", "200.00", "other-key");
        assert!(!notification("settlement", sig).verify_signature("server-key"));
        assert!(!notification("settlement", "abc".to_string()).verify_signature("server-key"));
    }
}
