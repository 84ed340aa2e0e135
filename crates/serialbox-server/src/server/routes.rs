use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{self, AppState};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/allocate/{pool}/{size}", get(handlers::allocate))
        .route("/pools", get(handlers::list_pools).post(handlers::create_pool))
        .route(
            "/pools/{machine_name}",
            get(handlers::get_pool)
                .patch(handlers::update_pool)
                .delete(handlers::delete_pool),
        )
        .route("/pools/{machine_name}/copy", post(handlers::copy_pool))
        .route(
            "/sequential-regions",
            get(handlers::list_regions).post(handlers::create_region),
        )
        .route(
            "/sequential-regions/{machine_name}",
            get(handlers::get_region)
                .patch(handlers::update_region)
                .delete(handlers::delete_region),
        )
        .route(
            "/response-rules",
            get(handlers::list_response_rules).post(handlers::create_response_rule),
        )
        .route(
            "/response-rules/{pool}/{content_type}",
            delete(handlers::delete_response_rule),
        )
        .route("/responses", get(handlers::list_responses))
        .route("/responses/{id}", get(handlers::get_response))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
