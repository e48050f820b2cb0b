//! Wiring from configuration to a ready `AppState`.

use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;

use crate::adapters::{PostgresAccountRepository, PostgresLedger, PostgresTransactionRepository};
use crate::config::{Config, GatewayKind};
use crate::gateway::{MidtransClient, SandboxGateway};
use crate::health::{DependencyChecker, GatewayChecker, PostgresChecker};
use crate::ports::{AccountRepository, PaymentGateway};
use crate::use_cases::{AuthService, TransactionEngine};
use crate::AppState;

pub fn build_gateway(config: &Config) -> anyhow::Result<Arc<dyn PaymentGateway>> {
    match config.payment_gateway {
        GatewayKind::Sandbox => {
            tracing::info!("Using sandbox payment gateway");
            Ok(Arc::new(SandboxGateway::new()))
        }
        GatewayKind::Midtrans => {
            let server_key = config
                .midtrans_server_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("MIDTRANS_SERVER_KEY is required"))?;
            tracing::info!(environment = %config.midtrans_env, "Using Midtrans payment gateway");
            Ok(Arc::new(MidtransClient::for_environment(
                server_key,
                &config.midtrans_env,
            )))
        }
    }
}

pub fn build_engine(pool: &PgPool, gateway: Arc<dyn PaymentGateway>) -> TransactionEngine {
    TransactionEngine::new(
        Arc::new(PostgresAccountRepository::new(pool.clone())),
        Arc::new(PostgresTransactionRepository::new(pool.clone())),
        Arc::new(PostgresLedger::new(pool.clone())),
        gateway,
    )
}

pub fn build_state(config: &Config, pool: &PgPool) -> anyhow::Result<AppState> {
    let gateway = build_gateway(config)?;
    let engine = Arc::new(build_engine(pool, gateway.clone()));

    let accounts: Arc<dyn AccountRepository> =
        Arc::new(PostgresAccountRepository::new(pool.clone()));
    let auth = Arc::new(AuthService::new(
        accounts,
        config.jwt_secret.clone(),
        config.jwt_expire_hours,
    ));

    let health_checkers: Vec<Arc<dyn DependencyChecker>> = vec![
        Arc::new(PostgresChecker::new(pool.clone())),
        Arc::new(GatewayChecker::new(gateway)),
    ];

    Ok(AppState {
        engine,
        auth,
        callback_server_key: config.midtrans_server_key.as_deref().map(Arc::from),
        health_checkers: Arc::new(health_checkers),
        start_time: Instant::now(),
    })
}
