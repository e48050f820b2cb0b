use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use super::json_body;
use crate::domain::CallbackNotification;
use crate::error::AppError;
use crate::AppState;

/// Receives asynchronous payment notifications from the gateway.
///
/// Missing required fields, an unknown status or a settlement for the wrong amount give 400,
/// a bad signature gives 401.
/// A `pending` notification is acknowledged without touching the transaction.
pub async fn payment_callback(
    State(state): State<AppState>,
    payload: Result<Json<CallbackNotification>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let notification = json_body(payload)?;

    let server_key = state.callback_server_key.as_deref().ok_or_else(|| {
        tracing::error!("Payment callback received but no server key is configured");
        AppError::Unauthorized("callback verification is not configured".to_string())
    })?;

    if !notification.verify_signature(server_key) {
        tracing::warn!(reference = %notification.order_id, "Callback signature mismatch");
        return Err(AppError::Unauthorized("invalid signature".to_string()));
    }

    let gateway_status = notification.gateway_status().ok_or_else(|| {
        AppError::BadRequest(format!(
            "unknown transaction status: {}",
            notification.transaction_status
        ))
    })?;

    let gross_amount = notification.gross_amount().ok_or_else(|| {
        AppError::BadRequest(format!("invalid gross_amount: {}", notification.gross_amount))
    })?;

    tracing::info!(
        reference = %notification.order_id,
        transaction_status = %notification.transaction_status,
        payment_type = notification.payment_type.as_deref().unwrap_or("-"),
        "Payment callback received"
    );

    let Some(target) = gateway_status.terminal_status() else {
        return Ok(Json(json!({ "status": "ok", "message": "pending acknowledged" })));
    };

    state
        .engine
        .process_notification(&notification.order_id, target, &gross_amount)
        .await?;

    Ok(Json(json!({ "status": "ok" })))
}
