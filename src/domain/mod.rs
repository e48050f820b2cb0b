//! Framework-agnostic domain types for the wallet ledger.

pub mod account;
pub mod callback;
pub mod transaction;

pub use account::{Account, AccountStatus};
pub use callback::{CallbackNotification, GatewayStatus};
pub use transaction::{
    InvalidTransition, Transaction, TransactionStatus, TransactionType, UnknownVariant,
};
