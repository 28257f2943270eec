use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::executor::{QueryResult, SqlExecutor};
use crate::error::AskError;
use crate::llm::SqlBridge;
use crate::registry::QueryRegistry;
use crate::sql::{apply_limit, SqlGate};

/// One ask-request. `params` is reserved for future parameter templating and
/// currently unused.
#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub params: Option<HashMap<String, serde_json::Value>>,
}

/// Where the executed SQL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AskSource {
    #[serde(rename = "registry")]
    Registry,
    #[serde(rename = "registry_match_missing_sql_lmstudio_fallback")]
    RegistryMissingSql,
    #[serde(rename = "lmstudio_fallback")]
    Bridge,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskOutcome {
    pub source: AskSource,
    pub question: String,
    pub sql: String,
    #[serde(flatten)]
    pub result: QueryResult,
    pub interpretation: String,
    pub source_url: Option<String>,
}

/// Registry-first, bridge-fallback request flow. Terminal on the first
/// successful result or the first unrecoverable error; there is no fallback
/// tier beyond the bridge.
pub struct Orchestrator {
    registry: Arc<QueryRegistry>,
    bridge: Arc<dyn SqlBridge>,
    executor: SqlExecutor,
    gate: SqlGate,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<QueryRegistry>,
        bridge: Arc<dyn SqlBridge>,
        executor: SqlExecutor,
        gate: SqlGate,
    ) -> Self {
        Self {
            registry,
            bridge,
            executor,
            gate,
        }
    }

    pub fn gate(&self) -> &SqlGate {
        &self.gate
    }

    pub fn executor(&self) -> &SqlExecutor {
        &self.executor
    }

    pub async fn ask(&self, request: &AskRequest) -> Result<AskOutcome, AskError> {
        let question = request.question.trim();
        debug!("Ask: {}", question);

        if let Some(entry) = self.registry.find(question) {
            // Registry SQL present: run it as curated.
            if let Some(sql) = entry.sql_text() {
                info!("Registry hit with SQL for '{}'", entry.question);
                let sql = apply_limit(sql, request.limit);
                self.gate.validate(&sql)?;
                let result = self.executor.execute(&sql).await?;

                return Ok(AskOutcome {
                    source: AskSource::Registry,
                    question: entry.question.clone(),
                    sql,
                    result,
                    interpretation: entry
                        .interpretation
                        .clone()
                        .unwrap_or_else(|| "No interpretation available.".to_string()),
                    source_url: entry.links.as_ref().and_then(|l| l.first()).map(String::from),
                });
            }

            // Registry SQL missing: bridge fallback, but the curated
            // interpretation/source win over the generated ones.
            info!("Registry hit without SQL for '{}', falling back to bridge", entry.question);
            let generated = self.bridge.generate(question).await?;
            let sql = apply_limit(&generated.sql, request.limit);
            self.gate.validate(&sql)?;
            let result = self.executor.execute(&sql).await?;

            return Ok(AskOutcome {
                source: AskSource::RegistryMissingSql,
                question: entry.question.clone(),
                sql,
                result,
                interpretation: entry
                    .interpretation
                    .clone()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(generated.interpretation),
                source_url: entry
                    .links
                    .as_ref()
                    .and_then(|l| l.first())
                    .map(String::from)
                    .or(generated.source_url),
            });
        }

        // No registry match: full bridge fallback.
        info!("No registry match, asking bridge");
        let generated = self.bridge.generate(question).await?;
        let sql = apply_limit(&generated.sql, request.limit);
        self.gate.validate(&sql)?;
        let result = self.executor.execute(&sql).await?;

        Ok(AskOutcome {
            source: AskSource::Bridge,
            question: question.to_string(),
            sql,
            result,
            interpretation: generated.interpretation,
            source_url: generated.source_url,
        })
    }
}
