use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::AskError;
use crate::llm::{parse, GeneratedSql, SqlBridge};
use crate::qlog::QuestionLog;
use crate::PERMITTED_TABLE;

/// Fixed system instruction: schema description, output-format contract,
/// column whitelist and allowed-table whitelist.
const SYSTEM_PROMPT: &str = r#"You are an expert SQL generator for DuckDB. Return output in the EXACT format below:

```sql
SELECT ... -- A single valid SELECT for table forex_bars ONLY
```
Interpretation: <1-3 concise business sentences about the result>
Source: <one authoritative URL for context>

Constraints:
- Query ONLY the table forex_bars.
- The table columns are:
  symbol TEXT,
  "datetime" TIMESTAMP,
  open DOUBLE,
  high DOUBLE,
  low DOUBLE,
  close DOUBLE,
  pip_hl DOUBLE,
  pip_oc DOUBLE,
  confidence_score DOUBLE,
  confidence_tag TEXT.
- Use double quotes when referencing the "datetime" column.
- Do NOT include any text before or after the three required parts.
"#;

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Bridge to an LM Studio style chat-completions endpoint.
pub struct LmStudioBridge {
    client: reqwest::Client,
    api_url: String,
    model: String,
    qlog: QuestionLog,
}

impl LmStudioBridge {
    pub fn new(config: &LlmConfig, qlog: QuestionLog) -> Result<Self, AskError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AskError::BridgeUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            qlog,
        })
    }

    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, AskError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: 0.0,
            max_tokens: 500,
        };

        let response = self
            .client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AskError::BridgeUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AskError::BridgeUnavailable(format!(
                "LM Studio API error: {status} {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AskError::BridgeUnavailable(e.to_string()))?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| {
                AskError::BridgeUnavailable("no choices in completion response".to_string())
            })?;

        debug!("Model response: {}", content);
        Ok(content)
    }

    fn ask_messages(&self, question: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage {
                role: "system".to_string(),
                content: SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: question.trim().to_string(),
            },
        ]
    }

    /// Lenient variant: on sanity-check failure or any error, the question and
    /// the failure reason land in the unanswered log and the caller gets `None`
    /// instead of an error.
    pub async fn generate_or_log(&self, question: &str) -> Option<GeneratedSql> {
        match self.generate(question).await {
            Ok(generated) => {
                let lowered = generated.sql.to_lowercase();
                let bad_sql = generated.sql.trim().is_empty()
                    || matches!(lowered.trim(), "none" | "null")
                    || !lowered.contains("select")
                    || !lowered.contains(PERMITTED_TABLE);

                if bad_sql {
                    self.log_unanswered(question, &generated.sql);
                    return None;
                }
                Some(generated)
            }
            Err(e) => {
                self.log_unanswered(question, &format!("ERROR: {e}"));
                None
            }
        }
    }

    /// Probes the sibling `/models` endpoint with a short timeout.
    pub async fn health_check(&self) -> bool {
        let models_url = self.api_url.replace("/chat/completions", "/models");
        let probe = self
            .client
            .get(&models_url)
            .timeout(Duration::from_secs(5))
            .send()
            .await;
        matches!(probe, Ok(resp) if resp.status().is_success())
    }

    fn log_unanswered(&self, question: &str, failed_sql: &str) {
        if let Err(e) = self.qlog.append(question, failed_sql) {
            warn!("Failed to append to unanswered log: {}", e);
        }
    }

    pub(crate) async fn raw_completion(&self, prompt: String) -> Result<String, AskError> {
        self.complete(vec![ChatMessage {
            role: "user".to_string(),
            content: prompt,
        }])
        .await
    }
}

#[async_trait]
impl SqlBridge for LmStudioBridge {
    async fn generate(&self, question: &str) -> Result<GeneratedSql, AskError> {
        let content = self.complete(self.ask_messages(question)).await?;

        let sql = parse::extract_fenced_sql(&content).ok_or(AskError::ParseFailure)?;
        let interpretation = parse::extract_interpretation(&content)
            .unwrap_or_else(|| "No interpretation provided.".to_string());
        let source_url = parse::extract_source_url(&content);

        Ok(GeneratedSql {
            sql,
            interpretation,
            source_url,
        })
    }
}
