pub mod reconciler;

pub use reconciler::{reconcile_once, run_reconciler, ReconcileReport};
