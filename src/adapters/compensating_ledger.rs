//! Ledger for stores without a shared database transaction.
//! Applies the steps one at a time and undoes earlier steps when a later one fails.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Transaction, TransactionStatus};
use crate::ports::{
    AccountRepository, Ledger, RepositoryError, RepositoryResult, TransactionRepository,
};

pub struct CompensatingLedger {
    accounts: Arc<dyn AccountRepository>,
    transactions: Arc<dyn TransactionRepository>,
}

impl CompensatingLedger {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        transactions: Arc<dyn TransactionRepository>,
    ) -> Self {
        Self {
            accounts,
            transactions,
        }
    }

    /// Returns `cause` if the undo succeeded, otherwise the undo's own error.
    async fn refund(&self, tx: &Transaction, cause: RepositoryError) -> RepositoryError {
        match self.accounts.add_balance(tx.user_id, &tx.amount).await {
            Ok(()) => {
                tracing::warn!(
                    reference = %tx.reference,
                    user_id = %tx.user_id,
                    amount = %tx.amount,
                    "Debit reversed after failed settlement: {}", cause
                );
                cause
            }
            Err(e) => {
                tracing::error!(
                    reference = %tx.reference,
                    user_id = %tx.user_id,
                    amount = %tx.amount,
                    "Failed to reverse debit: {} (original failure: {})", e, cause
                );
                e
            }
        }
    }
}

#[async_trait]
impl Ledger for CompensatingLedger {
    async fn settle_transfer(
        &self,
        tx: &Transaction,
        to_user_id: Uuid,
    ) -> RepositoryResult<Transaction> {
        self.accounts.subtract_balance(tx.user_id, &tx.amount).await?;

        if let Err(e) = self.accounts.add_balance(to_user_id, &tx.amount).await {
            return Err(self.refund(tx, e).await);
        }

        match self
            .transactions
            .transition_status(tx.id, TransactionStatus::Completed)
            .await
        {
            Ok(completed) => Ok(completed),
            Err(e) => {
                if let Err(undo) = self.accounts.subtract_balance(to_user_id, &tx.amount).await {
                    tracing::error!(
                        reference = %tx.reference,
                        to_user_id = %to_user_id,
                        "Failed to reverse credit: {}", undo
                    );
                    return Err(undo);
                }
                Err(self.refund(tx, e).await)
            }
        }
    }

    async fn settle_topup(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let previous = tx.status;
        let completed = self
            .transactions
            .transition_status(tx.id, TransactionStatus::Completed)
            .await?;

        if let Err(e) = self
            .accounts
            .add_balance(completed.user_id, &completed.amount)
            .await
        {
            // Release the claim so a redelivery or the reconciler can retry.
            let mut reverted = completed.clone();
            reverted.status = previous;
            reverted.processed_at = None;
            if let Err(undo) = self.transactions.update(&reverted).await {
                tracing::error!(
                    reference = %tx.reference,
                    "Failed to release completion claim: {}", undo
                );
            }
            return Err(e);
        }

        Ok(completed)
    }
}
