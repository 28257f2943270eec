//! End-to-end ask-flow tests: a seeded DuckDB file, the real bridge pointed at
//! a mock chat-completions server, and the real gate in between.

use std::sync::Arc;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fxlens::config::LlmConfig;
use fxlens::db::executor::SqlExecutor;
use fxlens::db::pool::DuckDbConnectionManager;
use fxlens::error::AskError;
use fxlens::llm::lmstudio::LmStudioBridge;
use fxlens::llm::SqlBridge;
use fxlens::orchestrator::{AskRequest, AskSource, Orchestrator};
use fxlens::qlog::QuestionLog;
use fxlens::registry::{QueryRegistry, RegistryEntry};
use fxlens::sql::SqlGate;
use fxlens::PERMITTED_TABLE;

const REGISTRY_YAML: &str = r#"
- question: "What is the max close?"
  sql: "SELECT MAX(close) AS max_close FROM forex_bars"
  interpretation: "Highest closing price in the loaded history."
  source_url: "https://www.babypips.com/learn"
- question: "Where did price gap at the open?"
  interpretation: "Sessions opening away from the prior close."
  learn_more: "https://www.babypips.com/learn/forex/gaps"
"#;

struct Harness {
    _dir: tempfile::TempDir,
    orchestrator: Orchestrator,
    bridge: Arc<LmStudioBridge>,
    qlog: QuestionLog,
}

fn seed_database(dir: &tempfile::TempDir) -> String {
    let db_path = dir.path().join("bars.duckdb");
    let conn = duckdb::Connection::open(&db_path).unwrap();
    conn.execute_batch(
        r#"
        CREATE TABLE forex_bars (
            symbol TEXT,
            "datetime" TIMESTAMP,
            open DOUBLE,
            high DOUBLE,
            low DOUBLE,
            close DOUBLE,
            pip_hl DOUBLE,
            pip_oc DOUBLE,
            confidence_score DOUBLE,
            confidence_tag TEXT
        );
        INSERT INTO forex_bars VALUES
            ('EURUSD', '2025-08-01 00:00:00', 1.10, 1.12, 1.09, 1.11, 30.0, 10.0, 0.9, 'high'),
            ('EURUSD', '2025-08-02 00:00:00', 1.11, 1.15, 1.10, 1.14, 50.0, 30.0, 0.7, 'medium'),
            ('GBPUSD', '2025-08-01 00:00:00', 1.30, 1.31, 1.28, 1.29, 30.0, 10.0, 0.4, 'low');
        "#,
    )
    .unwrap();
    db_path.to_string_lossy().to_string()
}

fn build_harness(server_uri: &str) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let db_path = seed_database(&dir);

    let manager = DuckDbConnectionManager::new(db_path);
    let pool = r2d2::Pool::builder().max_size(2).build(manager).unwrap();

    let entries: Vec<RegistryEntry> = serde_yaml::from_str(REGISTRY_YAML).unwrap();
    let registry = Arc::new(QueryRegistry::from_entries(entries));

    let qlog = QuestionLog::new(dir.path().join("unanswered.csv"));
    let llm_config = LlmConfig {
        api_url: format!("{server_uri}/v1/chat/completions"),
        model: "test-model".to_string(),
        timeout_secs: 5,
    };
    let bridge = Arc::new(LmStudioBridge::new(&llm_config, qlog.clone()).unwrap());

    let orchestrator = Orchestrator::new(
        registry,
        bridge.clone(),
        SqlExecutor::new(pool),
        SqlGate::new(PERMITTED_TABLE),
    );

    Harness {
        _dir: dir,
        orchestrator,
        bridge,
        qlog,
    }
}

fn completion_body(content: &str) -> Value {
    json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    })
}

fn ask(question: &str, limit: Option<u64>) -> AskRequest {
    AskRequest {
        question: question.to_string(),
        limit,
        params: None,
    }
}

/// Registry hit with SQL and no limit: the curated SQL reaches the executor
/// byte for byte, the bridge is never called, and the source tag is
/// `registry`.
#[tokio::test]
async fn registry_hit_runs_curated_sql_unmodified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let harness = build_harness(&server.uri());
    let outcome = harness
        .orchestrator
        .ask(&ask("What is the max close?", None))
        .await
        .unwrap();

    assert_eq!(outcome.source, AskSource::Registry);
    assert_eq!(outcome.sql, "SELECT MAX(close) AS max_close FROM forex_bars");
    assert_eq!(outcome.result.columns, vec!["max_close"]);
    assert_eq!(outcome.result.rows, vec![vec![Value::from(1.14)]]);
    assert_eq!(
        outcome.interpretation,
        "Highest closing price in the loaded history."
    );
    assert_eq!(
        outcome.source_url.as_deref(),
        Some("https://www.babypips.com/learn")
    );
}

/// Registry lookup is case-insensitive exact match.
#[tokio::test]
async fn registry_match_ignores_question_case() {
    let server = MockServer::start().await;
    let harness = build_harness(&server.uri());

    let outcome = harness
        .orchestrator
        .ask(&ask("what is the MAX close?", None))
        .await
        .unwrap();

    assert_eq!(outcome.source, AskSource::Registry);
    assert_eq!(outcome.question, "What is the max close?");
}

/// No registry match: the bridge supplies SQL which must pass the gate, and
/// the source tag is `lmstudio_fallback`.
#[tokio::test]
async fn unknown_question_falls_back_to_bridge() {
    let server = MockServer::start().await;
    let reply = "```sql\nSELECT symbol, close FROM forex_bars ORDER BY close DESC;\n```\nInterpretation: Pairs ranked by closing price.\nSource: https://www.fxstreet.com/rates-charts";
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(reply)))
        .expect(1)
        .mount(&server)
        .await;

    let harness = build_harness(&server.uri());
    let outcome = harness
        .orchestrator
        .ask(&ask("Rank the pairs by close", None))
        .await
        .unwrap();

    assert_eq!(outcome.source, AskSource::Bridge);
    assert_eq!(outcome.result.rows.len(), 3);
    assert_eq!(outcome.interpretation, "Pairs ranked by closing price.");
    assert_eq!(
        outcome.source_url.as_deref(),
        Some("https://www.fxstreet.com/rates-charts")
    );
    // The terminator was stripped with the first-statement split.
    assert!(!outcome.sql.contains(';'));
}

/// Registry entry without SQL: the bridge fills in the statement but the
/// curated interpretation and link win over the generated ones.
#[tokio::test]
async fn registry_entry_without_sql_keeps_curated_interpretation() {
    let server = MockServer::start().await;
    let reply = "```sql\nSELECT symbol, open, close FROM forex_bars WHERE open <> close\n```\nInterpretation: Generated text that should lose.\nSource: https://example.com/generated";
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(reply)))
        .expect(1)
        .mount(&server)
        .await;

    let harness = build_harness(&server.uri());
    let outcome = harness
        .orchestrator
        .ask(&ask("Where did price gap at the open?", None))
        .await
        .unwrap();

    assert_eq!(outcome.source, AskSource::RegistryMissingSql);
    assert_eq!(
        outcome.interpretation,
        "Sessions opening away from the prior close."
    );
    assert_eq!(
        outcome.source_url.as_deref(),
        Some("https://www.babypips.com/learn/forex/gaps")
    );
}

/// A model reply with no fenced block is a parse failure, not a silent empty
/// result.
#[tokio::test]
async fn bridge_reply_without_fence_is_parse_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            "SELECT close FROM forex_bars -- but no code fence anywhere",
        )))
        .mount(&server)
        .await;

    let harness = build_harness(&server.uri());
    let err = harness
        .orchestrator
        .ask(&ask("Anything unfenced", None))
        .await
        .unwrap_err();

    assert!(matches!(err, AskError::ParseFailure));
}

/// Generated write statements die at the gate with a client-facing rejection.
#[tokio::test]
async fn generated_write_statement_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            "```sql\nDROP TABLE forex_bars\n```",
        )))
        .mount(&server)
        .await;

    let harness = build_harness(&server.uri());
    let err = harness
        .orchestrator
        .ask(&ask("Please clean up the table", None))
        .await
        .unwrap_err();

    match err {
        AskError::Rejected(reason) => assert!(reason.contains("Only SELECT")),
        other => panic!("expected gate rejection, got {other:?}"),
    }
}

/// A requested row limit lands on generated SQL exactly once.
#[tokio::test]
async fn limit_is_applied_to_generated_sql() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            "```sql\nSELECT symbol, close FROM forex_bars ORDER BY close DESC;\n```",
        )))
        .mount(&server)
        .await;

    let harness = build_harness(&server.uri());
    let outcome = harness
        .orchestrator
        .ask(&ask("Top pair by close", Some(1)))
        .await
        .unwrap();

    assert!(outcome.sql.ends_with("LIMIT 1;"));
    assert_eq!(outcome.sql.matches("LIMIT").count(), 1);
    assert_eq!(outcome.result.rows.len(), 1);
    assert_eq!(outcome.result.rows[0][0], Value::from("EURUSD"));
}

/// An unreachable model endpoint surfaces as bridge-unavailable, untouched by
/// any retry.
#[tokio::test]
async fn unreachable_endpoint_is_bridge_unavailable() {
    let server = MockServer::start().await;
    let harness = build_harness(&server.uri());
    // Shut the mock down so the port refuses connections.
    drop(server);

    let err = harness
        .orchestrator
        .ask(&ask("Unknown question", None))
        .await
        .unwrap_err();

    assert!(matches!(err, AskError::BridgeUnavailable(_)));
}

/// A non-success status from the model endpoint is bridge-unavailable as well.
#[tokio::test]
async fn error_status_is_bridge_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model exploded"))
        .mount(&server)
        .await;

    let harness = build_harness(&server.uri());
    let err = harness
        .orchestrator
        .ask(&ask("Unknown question", None))
        .await
        .unwrap_err();

    match err {
        AskError::BridgeUnavailable(msg) => assert!(msg.contains("model exploded")),
        other => panic!("expected bridge-unavailable, got {other:?}"),
    }
}

/// The lenient bridge logs sanity-check failures and answers `None` instead of
/// erroring.
#[tokio::test]
async fn lenient_bridge_logs_unusable_replies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            "```sql\nnone\n```",
        )))
        .mount(&server)
        .await;

    let harness = build_harness(&server.uri());
    let generated = harness.bridge.generate_or_log("Nonsense question").await;
    assert!(generated.is_none());

    let logged = harness.qlog.read().unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].question, "Nonsense question");
}

/// The lenient bridge also logs transport failures, with the reason in the
/// failed_sql column.
#[tokio::test]
async fn lenient_bridge_logs_transport_failures() {
    let server = MockServer::start().await;
    let harness = build_harness(&server.uri());
    drop(server);

    let generated = harness.bridge.generate_or_log("Down again").await;
    assert!(generated.is_none());

    let logged = harness.qlog.read().unwrap();
    assert_eq!(logged.len(), 1);
    assert!(logged[0].failed_sql.starts_with("ERROR:"));
}

/// A usable reply passes the lenient sanity checks untouched.
#[tokio::test]
async fn lenient_bridge_passes_usable_replies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            "```sql\nSELECT COUNT(*) FROM forex_bars\n```",
        )))
        .mount(&server)
        .await;

    let harness = build_harness(&server.uri());
    let generated = harness
        .bridge
        .generate_or_log("How many bars are loaded?")
        .await
        .expect("reply should pass sanity checks");

    assert_eq!(generated.sql, "SELECT COUNT(*) FROM forex_bars");
    assert!(harness.qlog.read().unwrap().is_empty());
}

/// The strict bridge keeps only the first statement of a multi-statement
/// block, so the trailing injection never reaches the gate.
#[tokio::test]
async fn bridge_takes_first_statement_only() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            "```sql\nSELECT close FROM forex_bars; DELETE FROM forex_bars;\n```",
        )))
        .mount(&server)
        .await;

    let harness = build_harness(&server.uri());
    let generated = harness.bridge.generate("Just the closes").await.unwrap();
    assert_eq!(generated.sql, "SELECT close FROM forex_bars");
}

/// Source tags serialize to the wire names callers depend on.
#[tokio::test]
async fn source_tags_serialize_to_wire_names() {
    let server = MockServer::start().await;
    let harness = build_harness(&server.uri());

    let outcome = harness
        .orchestrator
        .ask(&ask("What is the max close?", None))
        .await
        .unwrap();

    let body = serde_json::to_value(&outcome).unwrap();
    assert_eq!(body["source"], "registry");
    assert!(body["columns"].is_array());
    assert!(body["rows"].is_array());

    assert_eq!(
        serde_json::to_value(AskSource::RegistryMissingSql).unwrap(),
        "registry_match_missing_sql_lmstudio_fallback"
    );
    assert_eq!(serde_json::to_value(AskSource::Bridge).unwrap(), "lmstudio_fallback");
}
