use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use super::json_body;
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::use_cases::transaction_lifecycle::{HistoryQuery, PaymentInput, TopupInput};
use crate::AppState;

pub async fn top_up(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<TopupInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let input = json_body(payload)?;
    let output = state.engine.top_up(user.user_id, input).await?;

    Ok((StatusCode::CREATED, Json(output)))
}

pub async fn pay(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<PaymentInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let input = json_body(payload)?;
    let output = state.engine.pay(user.user_id, input).await?;

    Ok((StatusCode::CREATED, Json(output)))
}

pub async fn transfer(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<PaymentInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let input = json_body(payload)?;
    let output = state.engine.transfer(user.user_id, input).await?;

    Ok((StatusCode::CREATED, Json(output)))
}

pub async fn history(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let page = state.engine.history(user.user_id, query).await?;

    Ok(Json(page))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tx = state
        .engine
        .get_user_transaction(user.user_id, &reference)
        .await?;

    Ok(Json(tx))
}
