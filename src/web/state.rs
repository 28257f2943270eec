use std::sync::Arc;

use crate::config::AppConfig;
use crate::llm::lmstudio::LmStudioBridge;
use crate::orchestrator::Orchestrator;
use crate::qlog::QuestionLog;
use crate::registry::QueryRegistry;

/// Shared application state for the web server. Built once at startup and
/// passed in explicitly; nothing here mutates after construction except the
/// unanswered log file itself.
pub struct AppState {
    pub config: AppConfig,
    pub registry: Arc<QueryRegistry>,
    pub orchestrator: Orchestrator,
    pub bridge: Arc<LmStudioBridge>,
    pub qlog: QuestionLog,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        registry: Arc<QueryRegistry>,
        orchestrator: Orchestrator,
        bridge: Arc<LmStudioBridge>,
        qlog: QuestionLog,
    ) -> Self {
        Self {
            config,
            registry,
            orchestrator,
            bridge,
            qlog,
            startup_time: chrono::Utc::now(),
        }
    }
}
