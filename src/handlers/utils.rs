use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config;
use crate::database::collections::CollectionSpec;
use crate::database::populate::Populate;
use crate::database::repository::not_found;
use crate::error::ApiError;
use crate::filter::QueryPlan;
use crate::middleware::ListResponse;
use crate::observer::context::ObserverContext;
use crate::state::AppState;

/// Path ids that are not UUIDs cannot name a record, so they are a plain 404
pub fn parse_id(collection: &CollectionSpec, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::not_found(format!("{} not found with id of {}", collection.singular, raw)))
}

/// Same as [`parse_id`] but for the parent segment of a nested route
pub fn parse_parent_id(parent: &CollectionSpec, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError::not_found(format!("No {} with the id of {}", parent.singular.to_lowercase(), raw)))
}

/// Request body as a JSON object
pub fn body_object(payload: Result<Json<Value>, JsonRejection>) -> Result<Map<String, Value>, ApiError> {
    let Json(value) = payload.map_err(|e| ApiError::invalid_json(e.body_text()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::invalid_json("Request body must be a JSON object")),
    }
}

/// Filtered, projected, sorted and paginated list straight from the query string
pub async fn advanced_results(
    state: &AppState,
    collection: &'static CollectionSpec,
    raw_query: Option<String>,
    populate: Option<&Populate>,
) -> Result<ListResponse, ApiError> {
    let plan = QueryPlan::from_query_string(raw_query.as_deref().unwrap_or(""), &config::config().query.defaults());
    let page = state.repository.find_page(collection, &plan, populate).await?;
    Ok(ListResponse::page(page))
}

/// Every child of one parent record, unpaginated
pub async fn children_of(
    state: &AppState,
    collection: &'static CollectionSpec,
    parent_field: &str,
    parent_id: Uuid,
) -> Result<ListResponse, ApiError> {
    let plan = QueryPlan::equals(parent_field, Value::String(parent_id.to_string()));
    let items = state.repository.find_all(collection, &plan, None).await?;
    Ok(ListResponse::all(items))
}

pub async fn find_one(
    state: &AppState,
    collection: &'static CollectionSpec,
    id: Uuid,
    populate: Option<&Populate>,
) -> Result<Value, ApiError> {
    state
        .repository
        .find_by_id(collection, id, populate)
        .await?
        .ok_or_else(|| not_found(collection, id).into())
}

/// Run a mutation through the observer pipeline and hand back the stored record.
/// Asynchronous-ring work keeps running after the response is sent.
pub async fn run_pipeline(state: &AppState, ctx: ObserverContext) -> Result<Value, ApiError> {
    let operation = ctx.operation;
    let collection = ctx.collection.name;
    let result = state.pipeline.execute(ctx).await?;
    tracing::info!(
        "{:?} {} completed in {:?} (rings {:?})",
        operation,
        collection,
        result.execution_time,
        result.rings_executed
    );
    Ok(result.record)
}
