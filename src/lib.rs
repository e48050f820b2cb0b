pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod startup;
pub mod use_cases;
pub mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::health::DependencyChecker;
use crate::use_cases::{AuthService, TransactionEngine};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TransactionEngine>,
    pub auth: Arc<AuthService>,
    /// Key callback signatures are verified with. Callbacks are refused when unset.
    pub callback_server_key: Option<Arc<str>>,
    pub health_checkers: Arc<Vec<Arc<dyn DependencyChecker>>>,
    pub start_time: Instant,
}

pub fn create_app(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/user/profile", get(handlers::user::profile))
        .route("/user/balance", get(handlers::user::balance))
        .route("/transactions", get(handlers::transactions::history))
        .route("/transactions/topup", post(handlers::transactions::top_up))
        .route("/transactions/pay", post(handlers::transactions::pay))
        .route("/transactions/transfer", post(handlers::transactions::transfer))
        .route(
            "/transactions/:reference",
            get(handlers::transactions::get_transaction),
        )
        .route(
            "/webhook/payment/callback",
            post(handlers::webhook::payment_callback),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api)
        .layer(axum::middleware::from_fn(
            middleware::request_logger_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
