pub mod handlers;
pub mod routes;
pub mod state;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::WebConfig;
use crate::error::AskError;
use state::AppState;

/// Maps request failures onto HTTP statuses: gate rejections are the client's
/// problem, bridge/parse trouble is an upstream failure, database and
/// configuration errors are ours.
impl IntoResponse for AskError {
    fn into_response(self) -> Response {
        let status = match &self {
            AskError::Rejected(_) => StatusCode::BAD_REQUEST,
            AskError::BridgeUnavailable(_) | AskError::ParseFailure => StatusCode::BAD_GATEWAY,
            AskError::Database(_) | AskError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Binds the listener and serves the router until shutdown.
pub async fn run_server(
    web_config: WebConfig,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = routes::api_routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", web_config.host, web_config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
