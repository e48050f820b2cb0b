pub mod auth;
pub mod transaction_lifecycle;

pub use auth::AuthService;
pub use transaction_lifecycle::TransactionEngine;
