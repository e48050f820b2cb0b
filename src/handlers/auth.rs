use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use super::json_body;
use crate::error::AppError;
use crate::use_cases::auth::{LoginInput, RegisterInput};
use crate::AppState;

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let input = json_body(payload)?;
    let account = state.auth.register(input).await?;

    Ok((StatusCode::CREATED, Json(json!({ "user": account }))))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let input = json_body(payload)?;
    let output = state.auth.login(input).await?;

    Ok(Json(output))
}
