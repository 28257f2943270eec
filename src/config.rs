use clap::Parser;
use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Chat-completions endpoint, LM Studio style.
    pub api_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
    /// YAML file holding the curated question -> SQL registry.
    pub registry_path: String,
    /// CSV file the lenient bridge appends unanswered questions to.
    pub unanswered_log: String,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to the query registry YAML
    #[arg(long)]
    pub registry: Option<String>,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config_builder = Config::builder();
        let mut file_found = false;

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
            file_found = true;
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/fxlens/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    file_found = true;
                    break;
                }
            }
        }

        let mut config: AppConfig = if file_found {
            config_builder.build()?.try_deserialize()?
        } else {
            AppConfig::default()
        };

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(registry) = &args.registry {
            config.registry_path = registry.clone();
        }

        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: "fxlens.duckdb".to_string(),
                pool_size: 4,
            },
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            llm: LlmConfig {
                api_url: "http://localhost:1234/v1/chat/completions".to_string(),
                model: "qwen/qwen2.5-vl-7b".to_string(),
                timeout_secs: 90,
            },
            registry_path: "queries_registry.yml".to_string(),
            unanswered_log: "unanswered_queries.csv".to_string(),
        }
    }
}
