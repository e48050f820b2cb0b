//! Ports: the seams between the lifecycle engine and its stores and gateway.
//! Adapters live in `crate::adapters` and `crate::gateway`.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Account, GatewayStatus, Transaction, TransactionStatus};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("conflict: {0}")]
    Conflict(String),

    /// A conditional status transition found the record already moved on.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("database error: {0}")]
    Database(String),
}

const PG_UNIQUE_VIOLATION: &str = "23505";
const BALANCE_CONSTRAINT: &str = "users_balance_non_negative";

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some(PG_UNIQUE_VIOLATION) => RepositoryError::Conflict(db.message().to_string()),
                _ if db.constraint() == Some(BALANCE_CONSTRAINT) => {
                    RepositoryError::InsufficientFunds
                }
                _ => RepositoryError::Database(err.to_string()),
            },
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn create(&self, account: &Account) -> RepositoryResult<Account>;
    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Account>;
    async fn get_by_email(&self, email: &str) -> RepositoryResult<Account>;
    async fn check_email_exists(&self, email: &str) -> RepositoryResult<bool>;
    /// Persists profile fields and status. The balance column is left untouched.
    async fn update(&self, account: &Account) -> RepositoryResult<Account>;
    async fn get_balance(&self, id: Uuid) -> RepositoryResult<BigDecimal>;
    async fn add_balance(&self, id: Uuid, amount: &BigDecimal) -> RepositoryResult<()>;
    /// Fails with `InsufficientFunds` unless the balance covers `amount`.
    async fn subtract_balance(&self, id: Uuid, amount: &BigDecimal) -> RepositoryResult<()>;
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn create(&self, tx: &Transaction) -> RepositoryResult<Transaction>;
    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction>;
    async fn get_by_reference(&self, reference: &str) -> RepositoryResult<Transaction>;
    /// Newest first.
    async fn get_by_user_id(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<Transaction>>;
    async fn count_by_user_id(&self, user_id: Uuid) -> RepositoryResult<i64>;
    /// Pending and processing records, oldest first.
    async fn get_pending(&self) -> RepositoryResult<Vec<Transaction>>;
    async fn update_status(&self, id: Uuid, status: TransactionStatus) -> RepositoryResult<()>;
    async fn update(&self, tx: &Transaction) -> RepositoryResult<Transaction>;
    /// Record the gateway charge id and move a pending record to processing.
    /// A record that has already moved on keeps its status and `processed_at`.
    async fn attach_charge(&self, id: Uuid, gateway_id: &str) -> RepositoryResult<Transaction>;
    /// Move `id` to `to` only if it is still pending or processing.
    /// Returns the updated record, or `InvalidState` if another writer got there first.
    async fn transition_status(
        &self,
        id: Uuid,
        to: TransactionStatus,
    ) -> RepositoryResult<Transaction>;
}

/// Balance movements that must be applied together with a status change.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Debit the owner, credit the counterparty and complete the transaction.
    /// On error no balance has moved and the record is still processable.
    async fn settle_transfer(&self, tx: &Transaction, to_user_id: Uuid)
        -> RepositoryResult<Transaction>;

    /// Complete a top-up and credit its owner, at most once per transaction.
    async fn settle_topup(&self, tx: &Transaction) -> RepositoryResult<Transaction>;
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Request(String),

    #[error("gateway rejected the charge: {0}")]
    Rejected(String),

    #[error("invalid response from gateway: {0}")]
    InvalidResponse(String),

    #[error("circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Request(err.to_string())
    }
}

/// Result of initiating a top-up charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCharge {
    pub order_id: String,
    pub status: String,
    pub payment_url: String,
    pub gateway_id: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_topup_transaction(
        &self,
        user_id: Uuid,
        amount: &BigDecimal,
        order_reference: &str,
    ) -> Result<GatewayCharge, GatewayError>;

    async fn get_transaction_status(
        &self,
        order_reference: &str,
    ) -> Result<GatewayStatus, GatewayError>;

    fn name(&self) -> &'static str;

    /// Whether calls are currently let through.
    fn is_available(&self) -> bool {
        true
    }
}
