use axum::{
    extract::{rejection::JsonRejection, Path, RawQuery},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::database::collections::BOOTCAMPS;
use crate::database::models::Role;
use crate::database::populate::Populate;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, ListResult};
use crate::observer::context::ObserverContext;
use crate::state::AppState;

use super::utils::{advanced_results, body_object, find_one, parse_id, run_pipeline};

/// Each bootcamp in a list carries its courses
pub const WITH_COURSES: Populate = Populate::children("courses", "courses", "bootcamp");

const PUBLISHERS: &[Role] = &[Role::Publisher, Role::Admin];

/// GET /bootcamps
pub async fn list(Extension(state): Extension<AppState>, RawQuery(query): RawQuery) -> ListResult {
    advanced_results(&state, &BOOTCAMPS, query, Some(&WITH_COURSES)).await
}

/// GET /bootcamps/:id
pub async fn get(Extension(state): Extension<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    let id = parse_id(&BOOTCAMPS, &id)?;
    Ok(ApiResponse::success(find_one(&state, &BOOTCAMPS, id, None).await?))
}

/// POST /bootcamps
pub async fn create(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    auth.authorize(PUBLISHERS)?;
    let ctx = ObserverContext::create(&BOOTCAMPS, body_object(payload)?).with_actor(auth.actor());
    Ok(ApiResponse::created(run_pipeline(&state, ctx).await?))
}

/// PUT /bootcamps/:id
pub async fn update(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    auth.authorize(PUBLISHERS)?;
    let id = parse_id(&BOOTCAMPS, &id)?;
    let ctx = ObserverContext::update(&BOOTCAMPS, id, body_object(payload)?).with_actor(auth.actor());
    Ok(ApiResponse::success(run_pipeline(&state, ctx).await?))
}

/// DELETE /bootcamps/:id - courses and reviews go with it
pub async fn delete(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    auth.authorize(PUBLISHERS)?;
    let id = parse_id(&BOOTCAMPS, &id)?;
    run_pipeline(&state, ObserverContext::delete(&BOOTCAMPS, id).with_actor(auth.actor())).await?;
    Ok(ApiResponse::success(json!({})))
}
