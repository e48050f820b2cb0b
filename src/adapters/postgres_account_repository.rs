//! Postgres implementation of AccountRepository.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Account, AccountStatus};
use crate::ports::{AccountRepository, RepositoryError, RepositoryResult};

const ACCOUNT_COLUMNS: &str = "id, email, password_hash, first_name, last_name, phone, \
     balance, status, created_at, updated_at";

#[derive(Clone)]
pub struct PostgresAccountRepository {
    pool: PgPool,
}

impl PostgresAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PostgresAccountRepository {
    async fn create(&self, account: &Account) -> RepositoryResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            INSERT INTO users (
                id, email, password_hash, first_name, last_name, phone,
                balance, status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.phone)
        .bind(&account.balance)
        .bind(account.status.as_str())
        .bind(account.created_at)
        .bind(account.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))?
            .into_domain()
    }

    async fn get_by_email(&self, email: &str) -> RepositoryResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("user {}", email)))?
            .into_domain()
    }

    async fn check_email_exists(&self, email: &str) -> RepositoryResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn update(&self, account: &Account) -> RepositoryResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            UPDATE users
            SET email = $2, password_hash = $3, first_name = $4, last_name = $5,
                phone = $6, status = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.phone)
        .bind(account.status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("user {}", account.id)))?
            .into_domain()
    }

    async fn get_balance(&self, id: Uuid) -> RepositoryResult<BigDecimal> {
        let balance: Option<BigDecimal> =
            sqlx::query_scalar("SELECT balance FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        balance.ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))
    }

    async fn add_balance(&self, id: Uuid, amount: &BigDecimal) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE users SET balance = balance + $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(amount)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("user {}", id)));
        }
        Ok(())
    }

    async fn subtract_balance(&self, id: Uuid, amount: &BigDecimal) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE users SET balance = balance - $2, updated_at = NOW() \
             WHERE id = $1 AND balance >= $2",
        )
        .bind(id)
        .bind(amount)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish a missing row from a short balance.
            self.get_balance(id).await?;
            return Err(RepositoryError::InsufficientFunds);
        }
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    phone: String,
    balance: BigDecimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_domain(self) -> RepositoryResult<Account> {
        let status: AccountStatus = self
            .status
            .parse()
            .map_err(|e: crate::domain::UnknownVariant| RepositoryError::Database(e.to_string()))?;

        Ok(Account {
            id: self.id,
            email: self.email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            balance: self.balance,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
