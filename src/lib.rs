pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod qlog;
pub mod registry;
pub mod sql;
pub mod util;
pub mod web;

/// The single table this service is allowed to query.
pub const PERMITTED_TABLE: &str = "forex_bars";
