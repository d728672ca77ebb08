//! HTTP surface of the engine.

mod error;
mod handlers;
mod middleware;
mod models;
mod state;

pub use error::{ApiError, codes};
pub use state::HttpState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};

use self::middleware::{log_responses, set_request_context};

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/resolve", get(handlers::resolve))
        .route("/uris", get(handlers::list_uris))
        .route(
            "/collections/{collection}/documents",
            post(handlers::create_document),
        )
        .route(
            "/collections/{collection}/documents/{id}",
            put(handlers::update_document).delete(handlers::delete_document),
        )
        .route("/settings/routing", put(handlers::save_routing_settings))
        .route("/admin/cache/clear", post(handlers::clear_cache))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
