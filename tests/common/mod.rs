#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;
use uuid::Uuid;
use wallet_core::adapters::{
    CompensatingLedger, InMemoryAccountRepository, InMemoryTransactionRepository,
};
use wallet_core::domain::{Account, GatewayStatus, TransactionStatus};
use wallet_core::gateway::SandboxGateway;
use wallet_core::health::{DependencyChecker, GatewayChecker};
use wallet_core::ports::{
    AccountRepository, GatewayCharge, GatewayError, PaymentGateway, RepositoryError,
    RepositoryResult,
};
use wallet_core::use_cases::{AuthService, TransactionEngine};
use wallet_core::{create_app, AppState};

pub const SERVER_KEY: &str = "test-server-key";
pub const JWT_SECRET: &str = "test-jwt-secret";

pub struct Harness {
    pub engine: Arc<TransactionEngine>,
    pub accounts: Arc<FlakyAccounts>,
    pub transactions: Arc<InMemoryTransactionRepository>,
}

pub fn harness() -> Harness {
    harness_with_gateway(Arc::new(SandboxGateway::new()))
}

pub fn harness_with_gateway(gateway: Arc<dyn PaymentGateway>) -> Harness {
    let accounts = Arc::new(FlakyAccounts::new());
    let transactions = Arc::new(InMemoryTransactionRepository::new());
    let ledger = Arc::new(CompensatingLedger::new(accounts.clone(), transactions.clone()));
    let engine = Arc::new(TransactionEngine::new(
        accounts.clone(),
        transactions.clone(),
        ledger,
        gateway,
    ));

    Harness {
        engine,
        accounts,
        transactions,
    }
}

impl Harness {
    pub async fn account_with_balance(&self, email: &str, balance: i64) -> Account {
        let account = self
            .accounts
            .create(&Account::new(email, "hash", "Test", "User", "081234567890"))
            .await
            .unwrap();
        if balance > 0 {
            self.accounts
                .add_balance(account.id, &BigDecimal::from(balance))
                .await
                .unwrap();
        }
        account
    }

    pub async fn balance(&self, id: Uuid) -> BigDecimal {
        self.accounts.get_balance(id).await.unwrap()
    }
}

/// In-memory accounts whose credits can be made to fail for chosen users.
#[derive(Default)]
pub struct FlakyAccounts {
    inner: InMemoryAccountRepository,
    failing_credits: Mutex<HashSet<Uuid>>,
}

impl FlakyAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_credits_for(&self, id: Uuid) {
        self.failing_credits.lock().unwrap().insert(id);
    }
}

#[async_trait]
impl AccountRepository for FlakyAccounts {
    async fn create(&self, account: &Account) -> RepositoryResult<Account> {
        self.inner.create(account).await
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Account> {
        self.inner.get_by_id(id).await
    }

    async fn get_by_email(&self, email: &str) -> RepositoryResult<Account> {
        self.inner.get_by_email(email).await
    }

    async fn check_email_exists(&self, email: &str) -> RepositoryResult<bool> {
        self.inner.check_email_exists(email).await
    }

    async fn update(&self, account: &Account) -> RepositoryResult<Account> {
        self.inner.update(account).await
    }

    async fn get_balance(&self, id: Uuid) -> RepositoryResult<BigDecimal> {
        self.inner.get_balance(id).await
    }

    async fn add_balance(&self, id: Uuid, amount: &BigDecimal) -> RepositoryResult<()> {
        if self.failing_credits.lock().unwrap().contains(&id) {
            return Err(RepositoryError::Database("credit rejected".to_string()));
        }
        self.inner.add_balance(id, amount).await
    }

    async fn subtract_balance(&self, id: Uuid, amount: &BigDecimal) -> RepositoryResult<()> {
        self.inner.subtract_balance(id, amount).await
    }
}

/// Gateway that refuses every charge.
pub struct DownGateway;

#[async_trait]
impl PaymentGateway for DownGateway {
    async fn create_topup_transaction(
        &self,
        _user_id: Uuid,
        _amount: &BigDecimal,
        _order_reference: &str,
    ) -> Result<GatewayCharge, GatewayError> {
        Err(GatewayError::Request("connection refused".to_string()))
    }

    async fn get_transaction_status(
        &self,
        _order_reference: &str,
    ) -> Result<GatewayStatus, GatewayError> {
        Err(GatewayError::Request("connection refused".to_string()))
    }

    fn name(&self) -> &'static str {
        "down"
    }
}

/// Gateway that reports a fixed status for every order.
pub struct FixedStatusGateway(pub GatewayStatus);

#[async_trait]
impl PaymentGateway for FixedStatusGateway {
    async fn create_topup_transaction(
        &self,
        user_id: Uuid,
        amount: &BigDecimal,
        order_reference: &str,
    ) -> Result<GatewayCharge, GatewayError> {
        SandboxGateway::new()
            .create_topup_transaction(user_id, amount, order_reference)
            .await
    }

    async fn get_transaction_status(
        &self,
        _order_reference: &str,
    ) -> Result<GatewayStatus, GatewayError> {
        Ok(self.0)
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Gateway whose settlement notification lands before the charge response returns.
#[derive(Default)]
pub struct CallbackFirstGateway {
    engine: OnceLock<Arc<TransactionEngine>>,
}

impl CallbackFirstGateway {
    pub fn bind(&self, engine: Arc<TransactionEngine>) {
        let _ = self.engine.set(engine);
    }
}

#[async_trait]
impl PaymentGateway for CallbackFirstGateway {
    async fn create_topup_transaction(
        &self,
        user_id: Uuid,
        amount: &BigDecimal,
        order_reference: &str,
    ) -> Result<GatewayCharge, GatewayError> {
        let engine = self
            .engine
            .get()
            .ok_or_else(|| GatewayError::Request("engine not bound".to_string()))?;
        engine
            .process_callback(order_reference, TransactionStatus::Completed)
            .await
            .map_err(|e| GatewayError::Rejected(e.to_string()))?;

        SandboxGateway::new()
            .create_topup_transaction(user_id, amount, order_reference)
            .await
    }

    async fn get_transaction_status(
        &self,
        _order_reference: &str,
    ) -> Result<GatewayStatus, GatewayError> {
        Ok(GatewayStatus::Completed)
    }

    fn name(&self) -> &'static str {
        "callback-first"
    }
}

/// Serve the app over in-memory stores on an ephemeral port.
pub async fn spawn_app() -> (String, Harness) {
    let h = harness();
    let auth = Arc::new(
        AuthService::new(h.accounts.clone(), JWT_SECRET.to_string(), 24).with_hash_cost(4),
    );
    let checkers: Vec<Arc<dyn DependencyChecker>> =
        vec![Arc::new(GatewayChecker::new(Arc::new(SandboxGateway::new())))];

    let state = AppState {
        engine: h.engine.clone(),
        auth,
        callback_server_key: Some(Arc::from(SERVER_KEY)),
        health_checkers: Arc::new(checkers),
        start_time: Instant::now(),
    };
    let app = create_app(state);

    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], 0));
    let server = axum::Server::bind(&addr).serve(app.into_make_service());
    let actual_addr = server.local_addr();

    tokio::spawn(async move {
        server.await.unwrap();
    });

    (format!("http://{}", actual_addr), h)
}
