//! Transaction lifecycle engine.
//! Creates transaction records, moves balances through the ledger and
//! reconciles top-ups with gateway confirmations.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Account, Transaction, TransactionStatus, TransactionType};
use crate::error::AppError;
use crate::ports::{
    AccountRepository, GatewayError, Ledger, PaymentGateway, RepositoryError,
    TransactionRepository,
};
use crate::validation;

pub const DEFAULT_HISTORY_LIMIT: i64 = 10;
pub const MAX_HISTORY_LIMIT: i64 = 100;
const REFERENCE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct TopupInput {
    pub amount: BigDecimal,
    pub payment_method: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopupOutput {
    pub id: Uuid,
    pub status: TransactionStatus,
    pub amount: BigDecimal,
    pub payment_url: String,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentInput {
    pub to_user_id: Uuid,
    pub amount: BigDecimal,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentOutput {
    pub id: Uuid,
    pub status: TransactionStatus,
    pub amount: BigDecimal,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

impl From<Transaction> for PaymentOutput {
    fn from(tx: Transaction) -> Self {
        Self {
            id: tx.id,
            status: tx.status,
            amount: tx.amount,
            reference: tx.reference,
            created_at: tx.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl HistoryQuery {
    /// Limit defaults to 10 and is clamped to 1..=100; offset is never negative.
    pub fn normalized(&self) -> (i64, i64) {
        let limit = self
            .limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionSummary {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub amount: BigDecimal,
    pub status: TransactionStatus,
    pub description: String,
    pub reference: String,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionSummary {
    fn from(tx: Transaction) -> Self {
        Self {
            id: tx.id,
            tx_type: tx.tx_type,
            amount: tx.amount,
            status: tx.status,
            description: tx.description,
            reference: tx.reference,
            processed_at: tx.processed_at,
            created_at: tx.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
    pub count: usize,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    pub transactions: Vec<TransactionSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceOutput {
    pub user_id: Uuid,
    pub balance: BigDecimal,
}

pub struct TransactionEngine {
    accounts: Arc<dyn AccountRepository>,
    transactions: Arc<dyn TransactionRepository>,
    ledger: Arc<dyn Ledger>,
    gateway: Arc<dyn PaymentGateway>,
}

impl TransactionEngine {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        transactions: Arc<dyn TransactionRepository>,
        ledger: Arc<dyn Ledger>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            accounts,
            transactions,
            ledger,
            gateway,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn PaymentGateway> {
        &self.gateway
    }

    pub async fn top_up(&self, user_id: Uuid, input: TopupInput) -> Result<TopupOutput, AppError> {
        validation::validate_positive_amount(&input.amount)?;
        validation::validate_whole_amount(&input.amount)?;
        validation::validate_payment_method(&input.payment_method)?;

        self.active_account(user_id, "account is not active").await?;

        let mut tx = Transaction::new(
            user_id,
            TransactionType::Topup,
            input.amount,
            format!("Top-up via {}", input.payment_method),
        );
        if let serde_json::Value::Object(map) = &mut tx.metadata {
            map.insert(
                "payment_method".to_string(),
                serde_json::Value::String(input.payment_method.clone()),
            );
        }
        let tx = self.persist_new(tx).await?;

        let charge = match self
            .gateway
            .create_topup_transaction(user_id, &tx.amount, &tx.reference)
            .await
        {
            Ok(charge) => charge,
            Err(e) => {
                tracing::error!(
                    reference = %tx.reference,
                    %user_id,
                    gateway = self.gateway.name(),
                    "Gateway rejected top-up: {}", e
                );
                self.mark_failed(&tx).await?;
                return Err(gateway_failure(e));
            }
        };

        // The gateway may already have called back, so only a pending record moves here.
        let tx = self
            .transactions
            .attach_charge(tx.id, &charge.gateway_id)
            .await?;

        if tx.status == TransactionStatus::Processing {
            tracing::info!(
                reference = %tx.reference,
                %user_id,
                amount = %tx.amount,
                "Top-up awaiting gateway confirmation"
            );
        } else {
            tracing::info!(
                reference = %tx.reference,
                status = %tx.status,
                "Top-up resolved by the gateway before the charge returned"
            );
        }

        Ok(TopupOutput {
            id: tx.id,
            status: tx.status,
            amount: tx.amount,
            payment_url: charge.payment_url,
            reference: tx.reference,
            created_at: tx.created_at,
        })
    }

    pub async fn pay(&self, user_id: Uuid, input: PaymentInput) -> Result<PaymentOutput, AppError> {
        self.move_funds(user_id, input, TransactionType::Payment).await
    }

    pub async fn transfer(
        &self,
        user_id: Uuid,
        input: PaymentInput,
    ) -> Result<PaymentOutput, AppError> {
        self.move_funds(user_id, input, TransactionType::Transfer).await
    }

    async fn move_funds(
        &self,
        user_id: Uuid,
        input: PaymentInput,
        tx_type: TransactionType,
    ) -> Result<PaymentOutput, AppError> {
        validation::validate_positive_amount(&input.amount)?;
        validation::validate_description(&input.description)?;

        if input.to_user_id == user_id {
            return Err(AppError::Validation(
                "cannot send funds to your own account".to_string(),
            ));
        }

        let sender = self.active_account(user_id, "account is not active").await?;
        let recipient = self
            .accounts
            .get_by_id(input.to_user_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound(_) => {
                    AppError::NotFound("recipient not found".to_string())
                }
                other => other.into(),
            })?;
        if !recipient.is_active() {
            return Err(AppError::Validation(
                "recipient account is not active".to_string(),
            ));
        }

        if sender.balance < input.amount {
            return Err(AppError::Validation("insufficient balance".to_string()));
        }

        let description = validation::sanitize_string(&input.description);
        let tx = Transaction::new(user_id, tx_type, input.amount, description)
            .with_counterparty(recipient.id);
        let tx = self.persist_new(tx).await?;

        match self.ledger.settle_transfer(&tx, recipient.id).await {
            Ok(done) => {
                tracing::info!(
                    reference = %done.reference,
                    %user_id,
                    to_user_id = %recipient.id,
                    amount = %done.amount,
                    "{} completed", tx_type
                );
                Ok(done.into())
            }
            Err(e) => {
                tracing::warn!(
                    reference = %tx.reference,
                    %user_id,
                    to_user_id = %recipient.id,
                    "{} failed: {}", tx_type, e
                );
                self.mark_failed(&tx).await?;
                Err(e.into())
            }
        }
    }

    pub async fn balance(&self, user_id: Uuid) -> Result<BalanceOutput, AppError> {
        let balance = self.accounts.get_balance(user_id).await?;
        Ok(BalanceOutput { user_id, balance })
    }

    pub async fn history(&self, user_id: Uuid, query: HistoryQuery) -> Result<HistoryPage, AppError> {
        let (limit, offset) = query.normalized();

        let transactions = self
            .transactions
            .get_by_user_id(user_id, limit, offset)
            .await?;
        let total = self.transactions.count_by_user_id(user_id).await?;

        let transactions: Vec<TransactionSummary> =
            transactions.into_iter().map(TransactionSummary::from).collect();

        Ok(HistoryPage {
            pagination: Pagination {
                limit,
                offset,
                count: transactions.len(),
                total,
            },
            transactions,
        })
    }

    pub async fn get_transaction_by_reference(
        &self,
        reference: &str,
    ) -> Result<Transaction, AppError> {
        Ok(self.transactions.get_by_reference(reference).await?)
    }

    /// Like `get_transaction_by_reference`, but hides transactions owned by someone else.
    pub async fn get_user_transaction(
        &self,
        user_id: Uuid,
        reference: &str,
    ) -> Result<Transaction, AppError> {
        let tx = self.get_transaction_by_reference(reference).await?;
        if tx.user_id != user_id {
            return Err(AppError::NotFound(format!("transaction {}", reference)));
        }
        Ok(tx)
    }

    /// Apply a verified gateway notification. A settlement must carry the amount we charged.
    pub async fn process_notification(
        &self,
        reference: &str,
        status: TransactionStatus,
        gross_amount: &BigDecimal,
    ) -> Result<Transaction, AppError> {
        if status == TransactionStatus::Completed {
            let tx = self.transactions.get_by_reference(reference).await?;
            if &tx.amount != gross_amount {
                tracing::warn!(
                    %reference,
                    expected = %tx.amount,
                    received = %gross_amount,
                    "Settlement amount mismatch"
                );
                return Err(AppError::Validation(
                    "gross amount does not match transaction amount".to_string(),
                ));
            }
        }

        self.process_callback(reference, status).await
    }

    /// Apply a confirmed gateway outcome to the transaction with `reference`.
    pub async fn process_callback(
        &self,
        reference: &str,
        status: TransactionStatus,
    ) -> Result<Transaction, AppError> {
        let tx = self.transactions.get_by_reference(reference).await?;

        if !tx.can_be_processed() {
            return Err(AppError::Validation(
                "transaction cannot be processed".to_string(),
            ));
        }

        let updated = match status {
            TransactionStatus::Completed => {
                if tx.tx_type != TransactionType::Topup {
                    return Err(AppError::Validation(format!(
                        "{} transactions are not settled by the gateway",
                        tx.tx_type
                    )));
                }
                let done = self.ledger.settle_topup(&tx).await?;
                tracing::info!(
                    reference = %done.reference,
                    user_id = %done.user_id,
                    amount = %done.amount,
                    "Top-up credited"
                );
                done
            }
            TransactionStatus::Failed | TransactionStatus::Cancelled => {
                let done = self.transactions.transition_status(tx.id, status).await?;
                tracing::info!(reference = %done.reference, status = %status, "Transaction closed");
                done
            }
            _ => {
                return Err(AppError::Validation("invalid transaction status".to_string()));
            }
        };

        Ok(updated)
    }

    pub async fn pending_transactions(&self) -> Result<Vec<Transaction>, AppError> {
        Ok(self.transactions.get_pending().await?)
    }

    async fn active_account(&self, user_id: Uuid, inactive_msg: &str) -> Result<Account, AppError> {
        let account = self.accounts.get_by_id(user_id).await?;
        if !account.is_active() {
            return Err(AppError::Validation(inactive_msg.to_string()));
        }
        Ok(account)
    }

    async fn persist_new(&self, mut tx: Transaction) -> Result<Transaction, AppError> {
        for _ in 1..REFERENCE_ATTEMPTS {
            match self.transactions.create(&tx).await {
                Err(RepositoryError::Conflict(_)) => {
                    tracing::warn!(reference = %tx.reference, "Reference collision, regenerating");
                    tx.regenerate_reference();
                }
                other => return Ok(other?),
            }
        }
        Ok(self.transactions.create(&tx).await?)
    }

    /// Close a transaction whose side effects did not happen.
    async fn mark_failed(&self, tx: &Transaction) -> Result<(), AppError> {
        match self
            .transactions
            .transition_status(tx.id, TransactionStatus::Failed)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::error!(
                    reference = %tx.reference,
                    "Failed to mark transaction as failed: {}", e
                );
                Err(e.into())
            }
        }
    }
}

fn gateway_failure(err: GatewayError) -> AppError {
    AppError::Internal(format!("failed to create payment: {}", err))
}
