//! Registration, login and bearer-token verification.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::Account;
use crate::error::AppError;
use crate::ports::{AccountRepository, RepositoryError};
use crate::validation;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub user_id: Uuid,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutput {
    pub token: String,
    pub expires_at: i64,
    pub user: Account,
}

pub struct AuthService {
    accounts: Arc<dyn AccountRepository>,
    jwt_secret: String,
    token_ttl: Duration,
    hash_cost: u32,
}

impl AuthService {
    pub fn new(accounts: Arc<dyn AccountRepository>, jwt_secret: String, expire_hours: i64) -> Self {
        Self {
            accounts,
            jwt_secret,
            token_ttl: Duration::hours(expire_hours),
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Override the bcrypt work factor.
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    pub async fn register(&self, input: RegisterInput) -> Result<Account, AppError> {
        let email = input.email.trim().to_lowercase();
        validation::validate_email(&email)?;
        validation::validate_password(&input.password)?;
        validation::validate_name("first_name", &input.first_name)?;
        validation::validate_name("last_name", &input.last_name)?;
        validation::validate_phone(&input.phone)?;

        if self.accounts.check_email_exists(&email).await? {
            return Err(AppError::Validation("email already exists".to_string()));
        }

        let password = input.password;
        let cost = self.hash_cost;
        let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AppError::Internal(format!("hashing task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("failed to hash password: {}", e)))?;

        let account = Account::new(
            email,
            password_hash,
            validation::sanitize_string(&input.first_name),
            validation::sanitize_string(&input.last_name),
            input.phone.trim(),
        );

        let created = self.accounts.create(&account).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => AppError::Validation("email already exists".to_string()),
            other => other.into(),
        })?;

        tracing::info!(user_id = %created.id, "User registered");
        Ok(created)
    }

    pub async fn login(&self, input: LoginInput) -> Result<LoginOutput, AppError> {
        let email = input.email.trim().to_lowercase();
        let invalid = || AppError::Unauthorized("invalid credentials".to_string());

        let account = match self.accounts.get_by_email(&email).await {
            Ok(account) => account,
            Err(RepositoryError::NotFound(_)) => return Err(invalid()),
            Err(e) => return Err(e.into()),
        };

        let password = input.password;
        let hash = account.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("hashing task failed: {}", e)))?
            .unwrap_or(false);
        if !matches {
            tracing::warn!(user_id = %account.id, "Login rejected: bad password");
            return Err(invalid());
        }

        if !account.is_active() {
            return Err(AppError::Unauthorized("account is not active".to_string()));
        }

        let (token, expires_at) = self.issue_token(&account)?;
        tracing::info!(user_id = %account.id, "User logged in");

        Ok(LoginOutput {
            token,
            expires_at,
            user: account,
        })
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<Account, AppError> {
        Ok(self.accounts.get_by_id(user_id).await?)
    }

    pub fn issue_token(&self, account: &Account) -> Result<(String, i64), AppError> {
        let now = Utc::now();
        let claims = Claims {
            user_id: account.id,
            email: account.email.clone(),
            exp: (now + self.token_ttl).timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("failed to sign token: {}", e)))?;

        Ok((token, claims.exp))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryAccountRepository;
    use crate::domain::AccountStatus;

    fn service() -> AuthService {
        AuthService::new(
            Arc::new(InMemoryAccountRepository::new()),
            "test-secret".to_string(),
            24,
        )
        .with_hash_cost(4)
    }

    fn register_input(email: &str) -> RegisterInput {
        RegisterInput {
            email: email.to_string(),
            password: "password123".to_string(),
            first_name: "Ann".to_string(),
            last_name: "Lee".to_string(),
            phone: "081234567890".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let auth = service();
        let account = auth.register(register_input("Ann@Example.com")).await.unwrap();
        assert_eq!(account.email, "ann@example.com");
        assert_ne!(account.password_hash, "password123");

        let login = auth
            .login(LoginInput {
                email: "ann@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();

        let claims = auth.validate_token(&login.token).unwrap();
        assert_eq!(claims.user_id, account.id);
        assert_eq!(claims.exp, login.expires_at);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let auth = service();
        auth.register(register_input("ann@example.com")).await.unwrap();
        let err = auth.register(register_input("ann@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg == "email already exists"));
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let auth = service();
        auth.register(register_input("ann@example.com")).await.unwrap();
        let err = auth
            .login(LoginInput {
                email: "ann@example.com".to_string(),
                password: "wrong-password".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_short_password_rejected() {
        let mut input = register_input("ann@example.com");
        input.password = "short".to_string();
        let err = service().register(input).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_inactive_account_cannot_login() {
        let accounts = Arc::new(InMemoryAccountRepository::new());
        let auth = AuthService::new(accounts.clone(), "s".to_string(), 1).with_hash_cost(4);
        let mut account = auth.register(register_input("ann@example.com")).await.unwrap();
        account.status = AccountStatus::Blocked;
        accounts.update(&account).await.unwrap();

        let err = auth
            .login(LoginInput {
                email: "ann@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == "account is not active"));
    }

    #[test]
    fn test_tampered_and_expired_tokens() {
        let auth = service();
        let account = Account::new("a@example.com", "h", "Ann", "Lee", "0812345678");
        let (token, _) = auth.issue_token(&account).unwrap();

        let other = AuthService::new(
            Arc::new(InMemoryAccountRepository::new()),
            "other-secret".to_string(),
            24,
        );
        assert_eq!(other.validate_token(&token), Err(TokenError::Invalid));

        let expired = AuthService::new(
            Arc::new(InMemoryAccountRepository::new()),
            "test-secret".to_string(),
            -2,
        );
        let (token, _) = expired.issue_token(&account).unwrap();
        assert_eq!(auth.validate_token(&token), Err(TokenError::Expired));
    }
}
