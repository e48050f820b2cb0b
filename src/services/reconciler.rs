use chrono::Utc;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::domain::TransactionType;
use crate::error::AppError;
use crate::use_cases::TransactionEngine;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub checked: usize,
    pub settled: usize,
    pub still_pending: usize,
    pub stale: usize,
    pub errors: usize,
}

/// Runs the reconciliation loop. Each pass resolves top-ups whose callback never
/// arrived by asking the gateway directly.
pub async fn run_reconciler(
    engine: Arc<TransactionEngine>,
    interval: Duration,
    min_age: chrono::Duration,
) {
    info!(
        interval_secs = interval.as_secs(),
        min_age_secs = min_age.num_seconds(),
        "Reconciler started"
    );

    loop {
        match reconcile_once(&engine, min_age).await {
            Ok(report) if report.checked > 0 => info!(?report, "Reconciliation pass finished"),
            Ok(_) => debug!("Nothing to reconcile"),
            Err(e) => error!("Reconciliation pass failed: {}", e),
        }

        sleep(interval).await;
    }
}

pub async fn reconcile_once(
    engine: &TransactionEngine,
    min_age: chrono::Duration,
) -> anyhow::Result<ReconcileReport> {
    let cutoff = Utc::now() - min_age;
    let pending = engine.pending_transactions().await?;
    let mut report = ReconcileReport::default();

    for tx in pending.into_iter().filter(|tx| tx.created_at <= cutoff) {
        report.checked += 1;

        if tx.tx_type != TransactionType::Topup || tx.payment_gateway_id.is_none() {
            warn!(
                reference = %tx.reference,
                tx_type = %tx.tx_type,
                status = %tx.status,
                "Stale transaction needs manual follow-up"
            );
            report.stale += 1;
            continue;
        }

        let gateway_status = match engine.gateway().get_transaction_status(&tx.reference).await {
            Ok(status) => status,
            Err(e) => {
                warn!(reference = %tx.reference, "Gateway status lookup failed: {}", e);
                report.errors += 1;
                continue;
            }
        };

        let Some(target) = gateway_status.terminal_status() else {
            report.still_pending += 1;
            continue;
        };

        match engine.process_callback(&tx.reference, target).await {
            Ok(_) => {
                info!(reference = %tx.reference, status = %target, "Reconciled transaction");
                report.settled += 1;
            }
            // A callback got there between the scan and now.
            Err(AppError::Validation(msg)) => {
                debug!(reference = %tx.reference, "Skipped: {}", msg);
            }
            Err(e) => {
                error!(reference = %tx.reference, "Failed to apply gateway status: {}", e);
                report.errors += 1;
            }
        }
    }

    Ok(report)
}
