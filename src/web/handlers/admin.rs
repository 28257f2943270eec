use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tracing::{error, info};

use crate::qlog::UnansweredEntry;
use crate::web::state::AppState;

/// GET /api/unanswered — the full unanswered-question log.
pub async fn list_unanswered(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UnansweredEntry>>, (StatusCode, String)> {
    let entries = state.qlog.read().map_err(|e| {
        error!("Failed to read unanswered log: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to read unanswered log".to_string(),
        )
    })?;

    Ok(Json(entries))
}

/// DELETE /api/unanswered — administrative reset back to an empty log.
pub async fn clear_unanswered(
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, (StatusCode, String)> {
    state.qlog.clear().map_err(|e| {
        error!("Failed to clear unanswered log: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to clear unanswered log".to_string(),
        )
    })?;

    info!("Unanswered log cleared");
    Ok(StatusCode::NO_CONTENT)
}
