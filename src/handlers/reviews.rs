use axum::{
    extract::{rejection::JsonRejection, Path, RawQuery},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::database::collections::{BOOTCAMPS, REVIEWS};
use crate::database::models::Role;
use crate::database::populate::Populate;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, ListResult};
use crate::observer::context::ObserverContext;
use crate::state::AppState;

use super::utils::{advanced_results, body_object, children_of, find_one, parse_id, parse_parent_id, run_pipeline};

pub const WITH_BOOTCAMP: Populate = Populate::reference("bootcamp", "bootcamps", &["name", "description"]);

const REVIEWERS: &[Role] = &[Role::User, Role::Admin];

/// GET /reviews
pub async fn list(Extension(state): Extension<AppState>, RawQuery(query): RawQuery) -> ListResult {
    advanced_results(&state, &REVIEWS, query, Some(&WITH_BOOTCAMP)).await
}

/// GET /bootcamps/:bootcamp_id/reviews
pub async fn list_for_bootcamp(Extension(state): Extension<AppState>, Path(bootcamp_id): Path<String>) -> ListResult {
    let bootcamp_id = parse_parent_id(&BOOTCAMPS, &bootcamp_id)?;
    children_of(&state, &REVIEWS, "bootcamp", bootcamp_id).await
}

/// GET /reviews/:id
pub async fn get(Extension(state): Extension<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    let id = parse_id(&REVIEWS, &id)?;
    Ok(ApiResponse::success(find_one(&state, &REVIEWS, id, Some(&WITH_BOOTCAMP)).await?))
}

/// POST /bootcamps/:bootcamp_id/reviews - one review per user and bootcamp
pub async fn create(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    Path(bootcamp_id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    auth.authorize(REVIEWERS)?;
    let bootcamp_id = parse_parent_id(&BOOTCAMPS, &bootcamp_id)?;
    let ctx = ObserverContext::create(&REVIEWS, body_object(payload)?)
        .with_actor(auth.actor())
        .with_parent(bootcamp_id);
    Ok(ApiResponse::created(run_pipeline(&state, ctx).await?))
}

/// PUT /reviews/:id
pub async fn update(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    auth.authorize(REVIEWERS)?;
    let id = parse_id(&REVIEWS, &id)?;
    let ctx = ObserverContext::update(&REVIEWS, id, body_object(payload)?).with_actor(auth.actor());
    Ok(ApiResponse::success(run_pipeline(&state, ctx).await?))
}

/// DELETE /reviews/:id
pub async fn delete(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    auth.authorize(REVIEWERS)?;
    let id = parse_id(&REVIEWS, &id)?;
    run_pipeline(&state, ObserverContext::delete(&REVIEWS, id).with_actor(auth.actor())).await?;
    Ok(ApiResponse::success(json!({})))
}
