//! Store adapters for the ports in `crate::ports`.

pub mod compensating_ledger;
pub mod in_memory;
pub mod postgres_account_repository;
pub mod postgres_ledger;
pub mod postgres_transaction_repository;

pub use compensating_ledger::CompensatingLedger;
pub use in_memory::{InMemoryAccountRepository, InMemoryTransactionRepository};
pub use postgres_account_repository::PostgresAccountRepository;
pub use postgres_ledger::PostgresLedger;
pub use postgres_transaction_repository::PostgresTransactionRepository;
