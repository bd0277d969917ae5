pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod service;

pub use application::{ImportOrchestrator, IngestionPipeline, OrchestratorSettings, PipelineReport};
pub use config::AppConfig;
pub use domain::error::IngestionError;
pub use domain::models::ImportStats;
pub use infrastructure::parsers::ParserRegistry;
pub use service::ImportService;
