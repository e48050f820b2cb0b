use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{Account, Transaction, TransactionStatus};
use crate::ports::{AccountRepository, RepositoryError, RepositoryResult, TransactionRepository};

/// A thread-safe in-memory account store.
///
/// Balance changes happen under the write lock, so add/subtract are atomic
/// with respect to each other. Used by the tests and by offline runs.
#[derive(Default, Clone)]
pub struct InMemoryAccountRepository {
    accounts: Arc<RwLock<HashMap<Uuid, Account>>>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn create(&self, account: &Account) -> RepositoryResult<Account> {
        let mut accounts = self.accounts.write().await;
        if accounts.values().any(|a| a.email == account.email) {
            return Err(RepositoryError::Conflict(format!(
                "email {} already registered",
                account.email
            )));
        }
        accounts.insert(account.id, account.clone());
        Ok(account.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Account> {
        let accounts = self.accounts.read().await;
        accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))
    }

    async fn get_by_email(&self, email: &str) -> RepositoryResult<Account> {
        let accounts = self.accounts.read().await;
        accounts
            .values()
            .find(|a| a.email == email)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", email)))
    }

    async fn check_email_exists(&self, email: &str) -> RepositoryResult<bool> {
        let accounts = self.accounts.read().await;
        Ok(accounts.values().any(|a| a.email == email))
    }

    async fn update(&self, account: &Account) -> RepositoryResult<Account> {
        let mut accounts = self.accounts.write().await;
        let stored = accounts
            .get_mut(&account.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", account.id)))?;

        stored.email = account.email.clone();
        stored.password_hash = account.password_hash.clone();
        stored.first_name = account.first_name.clone();
        stored.last_name = account.last_name.clone();
        stored.phone = account.phone.clone();
        stored.status = account.status;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn get_balance(&self, id: Uuid) -> RepositoryResult<BigDecimal> {
        self.get_by_id(id).await.map(|a| a.balance)
    }

    async fn add_balance(&self, id: Uuid, amount: &BigDecimal) -> RepositoryResult<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))?;
        account.balance = &account.balance + amount;
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn subtract_balance(&self, id: Uuid, amount: &BigDecimal) -> RepositoryResult<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))?;
        if &account.balance < amount {
            return Err(RepositoryError::InsufficientFunds);
        }
        account.balance = &account.balance - amount;
        account.updated_at = Utc::now();
        Ok(())
    }
}

/// A thread-safe in-memory transaction store.
#[derive(Default, Clone)]
pub struct InMemoryTransactionRepository {
    transactions: Arc<RwLock<HashMap<Uuid, Transaction>>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn create(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let mut transactions = self.transactions.write().await;
        if transactions.values().any(|t| t.reference == tx.reference) {
            return Err(RepositoryError::Conflict(format!(
                "reference {} already exists",
                tx.reference
            )));
        }
        transactions.insert(tx.id, tx.clone());
        Ok(tx.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction> {
        let transactions = self.transactions.read().await;
        transactions
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))
    }

    async fn get_by_reference(&self, reference: &str) -> RepositoryResult<Transaction> {
        let transactions = self.transactions.read().await;
        transactions
            .values()
            .find(|t| t.reference == reference)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", reference)))
    }

    async fn get_by_user_id(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        let mut owned: Vec<Transaction> = transactions
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(owned
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_by_user_id(&self, user_id: Uuid) -> RepositoryResult<i64> {
        let transactions = self.transactions.read().await;
        Ok(transactions.values().filter(|t| t.user_id == user_id).count() as i64)
    }

    async fn get_pending(&self) -> RepositoryResult<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        let mut pending: Vec<Transaction> = transactions
            .values()
            .filter(|t| t.can_be_processed())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pending)
    }

    async fn update_status(&self, id: Uuid, status: TransactionStatus) -> RepositoryResult<()> {
        let mut transactions = self.transactions.write().await;
        let tx = transactions
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?;
        tx.status = status;
        tx.updated_at = Utc::now();
        Ok(())
    }

    async fn update(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let mut transactions = self.transactions.write().await;
        let stored = transactions
            .get_mut(&tx.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", tx.id)))?;
        *stored = tx.clone();
        Ok(stored.clone())
    }

    async fn attach_charge(&self, id: Uuid, gateway_id: &str) -> RepositoryResult<Transaction> {
        let mut transactions = self.transactions.write().await;
        let tx = transactions
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?;
        tx.payment_gateway_id = Some(gateway_id.to_string());
        tx.updated_at = Utc::now();
        if tx.status == TransactionStatus::Pending {
            tx.mark_processing()
                .map_err(|e| RepositoryError::InvalidState(e.to_string()))?;
        }
        Ok(tx.clone())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        to: TransactionStatus,
    ) -> RepositoryResult<Transaction> {
        let mut transactions = self.transactions.write().await;
        let tx = transactions
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?;
        tx.transition(to)
            .map_err(|e| RepositoryError::InvalidState(e.to_string()))?;
        Ok(tx.clone())
    }
}
