use axum::{
    extract::rejection::JsonRejection,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{generate_jwt, verify_password, AuthError, Claims};
use crate::database::collections::USERS;
use crate::database::models::Role;
use crate::database::service::find_user_by_email;
use crate::error::ApiError;
use crate::middleware::{expired_cookie, token_cookie, ApiResponse, ApiResult, AuthUser};
use crate::observer::context::ObserverContext;
use crate::state::AppState;

use super::utils::{body_object, find_one, run_pipeline};

/// Issue a token for `id` as both a JSON body and an HttpOnly cookie
fn token_response(id: uuid::Uuid, role: Role) -> Result<Response, ApiError> {
    let token = generate_jwt(&Claims::new(id, role))?;
    let cookie = token_cookie(&token);
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "success": true, "token": token })),
    )
        .into_response())
}

/// POST /auth/register - create an account and sign in
pub async fn register(
    Extension(state): Extension<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let input = body_object(payload)?;
    if let Some(role) = input.get("role") {
        if role.as_str() == Some(Role::Admin.as_str()) {
            return Err(ApiError::bad_request("The admin role cannot be self-assigned"));
        }
    }

    let user = run_pipeline(&state, ObserverContext::create(&USERS, input)).await?;
    let id = user
        .get("id")
        .and_then(Value::as_str)
        .and_then(|s| uuid::Uuid::parse_str(s).ok())
        .ok_or_else(|| ApiError::internal_server_error("Registered user has no id"))?;
    let role = user
        .get("role")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or(Role::User);

    tracing::info!("Registered user {} as {}", id, role);
    token_response(id, role)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// POST /auth/login - exchange credentials for a token
pub async fn login(
    Extension(state): Extension<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::invalid_json(e.body_text()))?;
    let (Some(email), Some(password)) = (
        request.email.filter(|e| !e.trim().is_empty()),
        request.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Please send an email and a Password"));
    };

    let user = find_user_by_email(&state.pool, email.trim())
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let hash = user.password.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::internal_server_error(format!("Password check failed: {}", e)))?;
    if !matches {
        tracing::debug!("Failed login for {}", user.email);
        return Err(AuthError::InvalidCredentials.into());
    }

    token_response(user.id, user.role())
}

/// GET /auth/me - the signed-in user
pub async fn me(Extension(state): Extension<AppState>, auth: AuthUser) -> ApiResult<Value> {
    let user = find_one(&state, &USERS, auth.id(), None).await?;
    Ok(ApiResponse::success(user))
}

/// GET /auth/logout - clear the token cookie
pub async fn logout() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, expired_cookie())],
        Json(json!({ "success": true, "data": {} })),
    )
}
