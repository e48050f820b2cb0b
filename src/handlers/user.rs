use axum::{extract::State, response::IntoResponse, Json};

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::AppState;

pub async fn profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let account = state.auth.profile(user.user_id).await?;
    Ok(Json(account))
}

pub async fn balance(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let balance = state.engine.balance(user.user_id).await?;
    Ok(Json(balance))
}
