use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::AskError;
use crate::orchestrator::{AskOutcome, AskRequest};
use crate::sql::apply_limit;
use crate::web::state::AppState;

/// GET / — liveness plus registry size, the original's home route.
pub async fn home(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "registry_entries": state.registry.len(),
    }))
}

/// POST /api/ask — registry-first, bridge-fallback, strict errors.
pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AskRequest>,
) -> Result<Json<AskOutcome>, AskError> {
    info!("Ask request: {:?}", payload.question);
    let outcome = state.orchestrator.ask(&payload).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Serialize)]
pub struct BestEffortResponse {
    pub answered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Vec<Value>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub learn_more: Vec<String>,
}

const SHRUG: &str =
    "Sorry, I couldn't answer that one. The question has been logged so it can be added to the curated queries.";

fn shrugged(question: &str) -> Json<BestEffortResponse> {
    Json(BestEffortResponse {
        answered: false,
        message: Some(SHRUG.to_string()),
        question: question.to_string(),
        sql: None,
        columns: None,
        rows: None,
        interpretation: None,
        learn_more: Vec::new(),
    })
}

/// POST /api/ask/best-effort — the lenient flow. Nothing on this path raises
/// toward the caller: an unusable model reply, a gate rejection, or an
/// execution failure all log the question and return a neutral "couldn't
/// answer" instead of an error response.
pub async fn ask_best_effort(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AskRequest>,
) -> Json<BestEffortResponse> {
    let question = payload.question.trim().to_string();
    info!("Best-effort ask: {:?}", question);

    let Some(generated) = state.bridge.generate_or_log(&question).await else {
        return shrugged(&question);
    };

    let sql = apply_limit(&generated.sql, payload.limit);
    if let Err(rejection) = state.orchestrator.gate().validate(&sql) {
        warn!("Best-effort SQL rejected: {}", rejection);
        log_quietly(&state, &question, &sql);
        return shrugged(&question);
    }

    let result = match state.orchestrator.executor().execute(&sql).await {
        Ok(result) => result,
        Err(e) => {
            warn!("Best-effort execution failed: {}", e);
            log_quietly(&state, &question, &sql);
            return shrugged(&question);
        }
    };

    // Optional enrichment; failures here never cost the answer.
    let interpretation = match state.bridge.interpret_business(&question).await {
        Ok(text) => text,
        Err(_) => generated.interpretation.clone(),
    };
    let learn_more = state
        .bridge
        .suggest_learn_more_links(&interpretation, 3)
        .await;

    Json(BestEffortResponse {
        answered: true,
        message: None,
        question,
        sql: Some(sql),
        columns: Some(result.columns),
        rows: Some(result.rows),
        interpretation: Some(interpretation),
        learn_more,
    })
}

fn log_quietly(state: &AppState, question: &str, failed_sql: &str) {
    if let Err(e) = state.qlog.append(question, failed_sql) {
        warn!("Failed to append to unanswered log: {}", e);
    }
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub registry_entries: usize,
    pub unanswered_count: usize,
}

/// GET /api/status
pub async fn system_status(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    let now = chrono::Utc::now();
    let uptime = now.signed_duration_since(state.startup_time).num_seconds();
    let unanswered_count = state.qlog.read().map(|entries| entries.len()).unwrap_or(0);

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        registry_entries: state.registry.len(),
        unanswered_count,
    })
}

/// GET /api/health — probes the model endpoint.
pub async fn bridge_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let bridge_ok = state.bridge.health_check().await;
    Json(json!({ "bridge_ok": bridge_ok }))
}
