//! Authentication endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::{
    error::{AppError, AppResult},
    models::user::{LoginRequest, LoginResponse},
};

/// Obtain a bearer token
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 400, description = "Missing body or empty user name")
    )
)]
pub async fn login(
    State(state): State<crate::AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!("Rejected login body: {}", rejection.body_text());
        AppError::InvalidArgument("Request Body is missing or user name is empty.".to_string())
    })?;

    let response = state.services.auth.login(&request)?;
    Ok(Json(response))
}
