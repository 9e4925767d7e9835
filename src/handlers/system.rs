use axum::{http::StatusCode, response::IntoResponse, Extension, Json};
use serde_json::{json, Value};

use crate::database::manager::DatabaseManager;
use crate::state::AppState;

/// GET / - service information
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Bootcamp API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Bootcamp directory with courses, reviews and users",
            "endpoints": {
                "auth": "/api/v1/auth/{register,login,me,logout}",
                "bootcamps": "/api/v1/bootcamps[/:id[/courses|/reviews]]",
                "courses": "/api/v1/courses[/:id]",
                "reviews": "/api/v1/reviews[/:id]",
                "users": "/api/v1/users[/:id] (admin)"
            }
        }
    }))
}

/// GET /health - database connectivity probe
pub async fn health(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database_error": e.to_string()
                    }
                })),
            )
        }
    }
}
