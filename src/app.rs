use axum::{
    http::{HeaderValue, Method},
    routing::get,
    Extension, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config;
use crate::handlers::{auth, bootcamps, courses, reviews, system, users};
use crate::state::AppState;

pub const API_PREFIX: &str = "/api/v1";

/// Full application router with shared state and global layers applied
pub fn app(state: AppState) -> Router {
    let router = Router::new()
        // Public
        .route("/", get(system::root))
        .route("/health", get(system::health))
        .nest(API_PREFIX, api_routes())
        .layer(Extension(state))
        .layer(cors_layer());

    if config::config().api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn api_routes() -> Router {
    Router::new()
        .merge(auth_routes())
        .merge(bootcamp_routes())
        .merge(course_routes())
        .merge(review_routes())
        .merge(user_routes())
}

fn auth_routes() -> Router {
    use axum::routing::post;

    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", get(auth::logout))
}

fn bootcamp_routes() -> Router {
    Router::new()
        .route("/bootcamps", get(bootcamps::list).post(bootcamps::create))
        .route(
            "/bootcamps/:id",
            get(bootcamps::get).put(bootcamps::update).delete(bootcamps::delete),
        )
        // Nested resources re-routed to their own handlers
        .route(
            "/bootcamps/:id/courses",
            get(courses::list_for_bootcamp).post(courses::create),
        )
        .route(
            "/bootcamps/:id/reviews",
            get(reviews::list_for_bootcamp).post(reviews::create),
        )
}

fn course_routes() -> Router {
    Router::new()
        .route("/courses", get(courses::list))
        .route("/courses/:id", get(courses::get).put(courses::update).delete(courses::delete))
}

fn review_routes() -> Router {
    Router::new()
        .route("/reviews", get(reviews::list))
        .route("/reviews/:id", get(reviews::get).put(reviews::update).delete(reviews::delete))
}

fn user_routes() -> Router {
    Router::new()
        .route("/users", get(users::list).post(users::create))
        .route("/users/:id", get(users::get).put(users::update).delete(users::delete))
}

/// Permissive unless explicit origins are configured
fn cors_layer() -> CorsLayer {
    let origins: Vec<HeaderValue> = config::config()
        .security
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([axum::http::header::AUTHORIZATION, axum::http::header::CONTENT_TYPE])
        .allow_credentials(true)
}
