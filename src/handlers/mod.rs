pub mod auth;
pub mod transactions;
pub mod user;
pub mod webhook;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::error::AppError;
use crate::health::check_health;
use crate::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = check_health(&state.health_checkers, state.start_time).await;

    // Degraded still serves traffic; only a critical dependency failure returns 503.
    let status_code = if response.status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(response))
}

/// Unwrap a JSON body, turning extractor rejections into our 400 shape.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}
