//! Ledger that applies balance movements and the status change in one database transaction.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::postgres_transaction_repository::claim_transition;
use crate::domain::{Transaction, TransactionStatus};
use crate::ports::{Ledger, RepositoryError, RepositoryResult};

#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn credit(
    conn: &mut sqlx::PgConnection,
    user_id: Uuid,
    amount: &BigDecimal,
) -> RepositoryResult<()> {
    let result = sqlx::query::<Postgres>(
        "UPDATE users SET balance = balance + $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(user_id)
    .bind(amount)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound(format!("user {}", user_id)));
    }
    Ok(())
}

async fn debit(
    conn: &mut sqlx::PgConnection,
    user_id: Uuid,
    amount: &BigDecimal,
) -> RepositoryResult<()> {
    let result = sqlx::query::<Postgres>(
        "UPDATE users SET balance = balance - $2, updated_at = NOW() \
         WHERE id = $1 AND balance >= $2",
    )
    .bind(user_id)
    .bind(amount)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::InsufficientFunds);
    }
    Ok(())
}

#[async_trait]
impl Ledger for PostgresLedger {
    async fn settle_transfer(
        &self,
        tx: &Transaction,
        to_user_id: Uuid,
    ) -> RepositoryResult<Transaction> {
        let mut db_tx = self.pool.begin().await?;

        debit(&mut db_tx, tx.user_id, &tx.amount).await?;
        credit(&mut db_tx, to_user_id, &tx.amount).await?;
        let completed = claim_transition(&mut *db_tx, tx.id, TransactionStatus::Completed).await?;

        db_tx.commit().await?;
        Ok(completed)
    }

    async fn settle_topup(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let mut db_tx = self.pool.begin().await?;

        let completed = claim_transition(&mut *db_tx, tx.id, TransactionStatus::Completed).await?;
        credit(&mut db_tx, completed.user_id, &completed.amount).await?;

        db_tx.commit().await?;
        Ok(completed)
    }
}
