use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::filter::{Pagination, QueryPage};

/// Wrapper for API responses that automatically adds success envelope
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T) -> Self {
        Self { data, status_code: None }
    }

    /// Create an API response with custom status code
    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self {
            data,
            status_code: Some(status_code),
        }
    }

    /// Create a 201 Created response
    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        let data_value = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => return serialization_failure(e),
        };

        (status, Json(json!({ "success": true, "data": data_value }))).into_response()
    }
}

/// `{success, count, pagination?, data}` envelope for collection reads
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    pub data: Vec<Value>,
}

impl ListResponse {
    /// Unpaginated list, e.g. the courses of one bootcamp
    pub fn all(data: Vec<Value>) -> Self {
        Self {
            success: true,
            count: data.len(),
            pagination: None,
            data,
        }
    }

    /// `count` is the number of records on this page, not the filter total
    pub fn page(page: QueryPage) -> Self {
        Self {
            success: true,
            count: page.items.len(),
            pagination: Some(page.pagination),
            data: page.items,
        }
    }
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match serde_json::to_value(&self) {
            Ok(body) => (StatusCode::OK, Json(body)).into_response(),
            Err(e) => serialization_failure(e),
        }
    }
}

fn serialization_failure(e: serde_json::Error) -> Response {
    tracing::error!("Failed to serialize response data: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "success": false,
            "error": "Failed to serialize response data",
            "code": "INTERNAL_SERVER_ERROR"
        })),
    )
        .into_response()
}

// Convenience type aliases
pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;
pub type ListResult = Result<ListResponse, crate::error::ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpaginated_list_omits_pagination() {
        let body = serde_json::to_value(ListResponse::all(vec![json!({"id": 1}), json!({"id": 2})])).unwrap();
        assert_eq!(body, json!({ "success": true, "count": 2, "data": [{"id": 1}, {"id": 2}] }));
    }

    #[test]
    fn page_count_is_items_on_page() {
        let page = QueryPage {
            items: vec![json!({"id": 1})],
            total: 9,
            pagination: Pagination::new(2, 1, 9),
        };
        let body = serde_json::to_value(ListResponse::page(page)).unwrap();
        assert_eq!(body["count"], 1);
        assert_eq!(body["pagination"]["next"], json!({ "page": 3, "limit": 1 }));
        assert_eq!(body["pagination"]["prev"], json!({ "page": 1, "limit": 1 }));
    }
}
