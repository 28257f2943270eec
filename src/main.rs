use clap::Parser;
use r2d2::Pool;
use std::sync::Arc;
use tracing::{error, info};

use fxlens::config::{AppConfig, CliArgs};
use fxlens::db::executor::SqlExecutor;
use fxlens::db::pool::DuckDbConnectionManager;
use fxlens::llm::lmstudio::LmStudioBridge;
use fxlens::orchestrator::Orchestrator;
use fxlens::qlog::QuestionLog;
use fxlens::registry::QueryRegistry;
use fxlens::sql::SqlGate;
use fxlens::util::logging::init_tracing;
use fxlens::web::state::AppState;
use fxlens::{web, PERMITTED_TABLE};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Pick up a .env file if one is present, then initialize logging
    dotenvy::dotenv().ok();
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Load the curated query registry; a missing or malformed registry aborts
    // startup rather than running degraded.
    let registry = match QueryRegistry::load(&config.registry_path) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!("Failed to load query registry: {}", e);
            return Err(e.into());
        }
    };

    info!("Initializing DuckDB connection pool at {}", config.database.path);
    let manager = DuckDbConnectionManager::new(config.database.path.clone());
    let pool = Pool::builder()
        .max_size(config.database.pool_size as u32)
        .build(manager)?;

    // Unanswered-question log and the model bridge
    let qlog = QuestionLog::new(config.unanswered_log.clone());
    info!("Initializing LM Studio bridge at {}", config.llm.api_url);
    let bridge = Arc::new(LmStudioBridge::new(&config.llm, qlog.clone())?);

    let orchestrator = Orchestrator::new(
        Arc::clone(&registry),
        bridge.clone(),
        SqlExecutor::new(pool),
        SqlGate::new(PERMITTED_TABLE),
    );

    let app_state = Arc::new(AppState::new(
        config.clone(),
        registry,
        orchestrator,
        bridge,
        qlog,
    ));

    // Start the web server
    info!("Starting FXLens server on {}:{}", config.web.host, config.web.port);
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e as Box<dyn std::error::Error>);
        }
    }

    Ok(())
}
