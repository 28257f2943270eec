use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// REST API for programmatic access
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::api::home))
        .nest(
            "/api",
            Router::new()
                // Question answering
                .route("/ask", post(handlers::api::ask))
                .route("/ask/best-effort", post(handlers::api::ask_best_effort))

                // Service health
                .route("/status", get(handlers::api::system_status))
                .route("/health", get(handlers::api::bridge_health))

                // Unanswered-question log administration
                .route(
                    "/unanswered",
                    get(handlers::admin::list_unanswered).delete(handlers::admin::clear_unanswered),
                ),
        )
}
