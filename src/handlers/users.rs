// Account administration; every route requires the admin role
use axum::{
    extract::{rejection::JsonRejection, Path, RawQuery},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::database::collections::USERS;
use crate::database::models::Role;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, ListResult};
use crate::observer::context::ObserverContext;
use crate::state::AppState;

use super::utils::{advanced_results, body_object, find_one, parse_id, run_pipeline};

fn admin_only(auth: &AuthUser) -> Result<(), ApiError> {
    auth.authorize(&[Role::Admin])
}

/// GET /users
pub async fn list(Extension(state): Extension<AppState>, auth: AuthUser, RawQuery(query): RawQuery) -> ListResult {
    admin_only(&auth)?;
    advanced_results(&state, &USERS, query, None).await
}

/// GET /users/:id
pub async fn get(Extension(state): Extension<AppState>, auth: AuthUser, Path(id): Path<String>) -> ApiResult<Value> {
    admin_only(&auth)?;
    let id = parse_id(&USERS, &id)?;
    Ok(ApiResponse::success(find_one(&state, &USERS, id, None).await?))
}

/// POST /users
pub async fn create(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    admin_only(&auth)?;
    let ctx = ObserverContext::create(&USERS, body_object(payload)?).with_actor(auth.actor());
    Ok(ApiResponse::created(run_pipeline(&state, ctx).await?))
}

/// PUT /users/:id
pub async fn update(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    admin_only(&auth)?;
    let id = parse_id(&USERS, &id)?;
    let ctx = ObserverContext::update(&USERS, id, body_object(payload)?).with_actor(auth.actor());
    Ok(ApiResponse::success(run_pipeline(&state, ctx).await?))
}

/// DELETE /users/:id
pub async fn delete(Extension(state): Extension<AppState>, auth: AuthUser, Path(id): Path<String>) -> ApiResult<Value> {
    admin_only(&auth)?;
    let id = parse_id(&USERS, &id)?;
    run_pipeline(&state, ObserverContext::delete(&USERS, id).with_actor(auth.actor())).await?;
    Ok(ApiResponse::success(json!({})))
}
