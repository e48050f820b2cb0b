//! Transaction domain entity.
//! Framework-agnostic representation of a wallet transaction and its status machine.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

const REFERENCE_PREFIX: &str = "TXN-";
const REFERENCE_SUFFIX_LEN: usize = 8;
const COUNTERPARTY_KEY: &str = "to_user_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Topup,
    Payment,
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Topup => "topup",
            TransactionType::Payment => "payment",
            TransactionType::Transfer => "transfer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    /// Pending and processing are the only states a transition may start from.
    pub fn is_processable(&self) -> bool {
        matches!(self, TransactionStatus::Pending | TransactionStatus::Processing)
    }
}

/// Raised when a stored string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for TransactionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "topup" => Ok(TransactionType::Topup),
            "payment" => Ok(TransactionType::Payment),
            "transfer" => Ok(TransactionType::Transfer),
            other => Err(UnknownVariant {
                kind: "transaction type",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "processing" => Ok(TransactionStatus::Processing),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            "cancelled" => Ok(TransactionStatus::Cancelled),
            other => Err(UnknownVariant {
                kind: "transaction status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status change was requested on a transaction that already reached a terminal state,
/// or the requested target is not reachable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transaction {reference} cannot move from {from} to {to}")]
pub struct InvalidTransition {
    pub reference: String,
    pub from: TransactionStatus,
    pub to: TransactionStatus,
}

/// Domain entity representing a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub amount: BigDecimal,
    pub status: TransactionStatus,
    pub reference: String,
    pub payment_gateway_id: Option<String>,
    pub description: String,
    pub metadata: serde_json::Value,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        user_id: Uuid,
        tx_type: TransactionType,
        amount: BigDecimal,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            tx_type,
            amount,
            status: TransactionStatus::Pending,
            reference: generate_reference(),
            payment_gateway_id: None,
            description: description.into(),
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach the counterparty of a payment or transfer.
    pub fn with_counterparty(mut self, to_user_id: Uuid) -> Self {
        if let serde_json::Value::Object(map) = &mut self.metadata {
            map.insert(
                COUNTERPARTY_KEY.to_string(),
                serde_json::Value::String(to_user_id.to_string()),
            );
        }
        self
    }

    pub fn counterparty(&self) -> Option<Uuid> {
        self.metadata
            .get(COUNTERPARTY_KEY)
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    /// Replace the reference with a fresh one. Only valid before the record is persisted.
    pub fn regenerate_reference(&mut self) {
        self.reference = generate_reference();
    }

    pub fn can_be_processed(&self) -> bool {
        self.status.is_processable()
    }

    /// Move to `to`, stamping `updated_at` (and `processed_at` on completion).
    pub fn transition(&mut self, to: TransactionStatus) -> Result<(), InvalidTransition> {
        if !self.can_be_processed() || to == TransactionStatus::Pending {
            return Err(InvalidTransition {
                reference: self.reference.clone(),
                from: self.status,
                to,
            });
        }

        let now = Utc::now();
        self.status = to;
        self.updated_at = now;
        if to == TransactionStatus::Completed {
            self.processed_at = Some(now);
        }
        Ok(())
    }

    pub fn mark_processing(&mut self) -> Result<(), InvalidTransition> {
        self.transition(TransactionStatus::Processing)
    }

    pub fn mark_completed(&mut self) -> Result<(), InvalidTransition> {
        self.transition(TransactionStatus::Completed)
    }

    pub fn mark_failed(&mut self) -> Result<(), InvalidTransition> {
        self.transition(TransactionStatus::Failed)
    }

    pub fn mark_cancelled(&mut self) -> Result<(), InvalidTransition> {
        self.transition(TransactionStatus::Cancelled)
    }
}

fn generate_reference() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}{}", REFERENCE_PREFIX, &id[..REFERENCE_SUFFIX_LEN]).to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topup() -> Transaction {
        Transaction::new(
            Uuid::new_v4(),
            TransactionType::Topup,
            "200.00".parse().unwrap(),
            "Balance top-up",
        )
    }

    #[test]
    fn test_new_transaction_is_pending_with_reference() {
        let tx = topup();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(tx.reference.starts_with("TXN-"));
        assert_eq!(tx.reference.len(), 12);
        assert!(tx.processed_at.is_none());
    }

    #[test]
    fn test_references_are_unique() {
        assert_ne!(topup().reference, topup().reference);
    }

    #[test]
    fn test_completion_stamps_processed_at() {
        let mut tx = topup();
        tx.mark_processing().unwrap();
        assert!(tx.processed_at.is_none());
        tx.mark_completed().unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert!(tx.processed_at.is_some());
    }

    #[test]
    fn test_terminal_transaction_rejects_transition() {
        let mut tx = topup();
        tx.mark_cancelled().unwrap();
        let err = tx.mark_completed().unwrap_err();
        assert_eq!(err.from, TransactionStatus::Cancelled);
        assert_eq!(err.to, TransactionStatus::Completed);
        assert_eq!(tx.status, TransactionStatus::Cancelled);
    }

    #[test]
    fn test_cannot_move_back_to_pending() {
        let mut tx = topup();
        tx.mark_processing().unwrap();
        assert!(tx.transition(TransactionStatus::Pending).is_err());
    }

    #[test]
    fn test_counterparty_round_trips_through_metadata() {
        let to = Uuid::new_v4();
        let tx = Transaction::new(
            Uuid::new_v4(),
            TransactionType::Payment,
            BigDecimal::from(10),
            "lunch",
        )
        .with_counterparty(to);
        assert_eq!(tx.counterparty(), Some(to));
        assert_eq!(tx.metadata["to_user_id"], to.to_string());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(
            "processing".parse::<TransactionStatus>().unwrap(),
            TransactionStatus::Processing
        );
        assert!("settled".parse::<TransactionStatus>().is_err());
        assert_eq!("transfer".parse::<TransactionType>().unwrap(), TransactionType::Transfer);
    }
}
