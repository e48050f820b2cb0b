//! Postgres implementation of TransactionRepository.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::domain::{Transaction, TransactionStatus, UnknownVariant};
use crate::ports::{RepositoryError, RepositoryResult, TransactionRepository};

pub(crate) const TRANSACTION_COLUMNS: &str = "id, user_id, type, amount, status, reference, \
     payment_gateway_id, description, metadata, processed_at, created_at, updated_at";

/// Postgres-backed transaction repository.
#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Conditional status claim shared with the ledger, which runs it inside its own transaction.
pub(crate) async fn claim_transition<'e, E>(
    executor: E,
    id: Uuid,
    to: TransactionStatus,
) -> RepositoryResult<Transaction>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let row = sqlx::query_as::<_, TransactionRow>(&format!(
        r#"
        UPDATE transactions
        SET status = $2,
            processed_at = CASE WHEN $2 = 'completed' THEN NOW() ELSE processed_at END,
            updated_at = NOW()
        WHERE id = $1 AND status IN ('pending', 'processing')
        RETURNING {TRANSACTION_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(to.as_str())
    .fetch_optional(executor)
    .await?;

    match row {
        Some(row) => row.into_domain(),
        None => Err(RepositoryError::InvalidState(format!(
            "transaction {} is not processable",
            id
        ))),
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn create(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO transactions (
                id, user_id, type, amount, status, reference,
                payment_gateway_id, description, metadata, processed_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(tx.id)
        .bind(tx.user_id)
        .bind(tx.tx_type.as_str())
        .bind(&tx.amount)
        .bind(tx.status.as_str())
        .bind(&tx.reference)
        .bind(&tx.payment_gateway_id)
        .bind(&tx.description)
        .bind(&tx.metadata)
        .bind(tx.processed_at)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?
            .into_domain()
    }

    async fn get_by_reference(&self, reference: &str) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", reference)))?
            .into_domain()
    }

    async fn get_by_user_id(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn count_by_user_id(&self, user_id: Uuid) -> RepositoryResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn get_pending(&self) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE status IN ('pending', 'processing') ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn update_status(&self, id: Uuid, status: TransactionStatus) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE transactions SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("transaction {}", id)));
        }
        Ok(())
    }

    async fn update(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions
            SET status = $2, payment_gateway_id = $3, description = $4, metadata = $5,
                processed_at = $6, updated_at = $7
            WHERE id = $1
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(tx.id)
        .bind(tx.status.as_str())
        .bind(&tx.payment_gateway_id)
        .bind(&tx.description)
        .bind(&tx.metadata)
        .bind(tx.processed_at)
        .bind(tx.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", tx.id)))?
            .into_domain()
    }

    async fn attach_charge(&self, id: Uuid, gateway_id: &str) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions
            SET payment_gateway_id = $2,
                status = CASE WHEN status = 'pending' THEN 'processing' ELSE status END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(gateway_id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?
            .into_domain()
    }

    async fn transition_status(
        &self,
        id: Uuid,
        to: TransactionStatus,
    ) -> RepositoryResult<Transaction> {
        claim_transition(&self.pool, id, to).await
    }
}

/// Internal row type for SQLx. Not exposed outside the adapters.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TransactionRow {
    id: Uuid,
    user_id: Uuid,
    #[sqlx(rename = "type")]
    tx_type: String,
    amount: BigDecimal,
    status: String,
    reference: String,
    payment_gateway_id: Option<String>,
    description: String,
    metadata: serde_json::Value,
    processed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransactionRow {
    pub(crate) fn into_domain(self) -> RepositoryResult<Transaction> {
        let corrupt = |e: UnknownVariant| RepositoryError::Database(e.to_string());
        Ok(Transaction {
            id: self.id,
            user_id: self.user_id,
            tx_type: self.tx_type.parse().map_err(corrupt)?,
            amount: self.amount,
            status: self.status.parse().map_err(corrupt)?,
            reference: self.reference,
            payment_gateway_id: self.payment_gateway_id,
            description: self.description,
            metadata: self.metadata,
            processed_at: self.processed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
