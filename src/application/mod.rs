pub mod import_orchestrator;
pub mod ingestion_pipeline;

pub use import_orchestrator::{ImportOrchestrator, OrchestratorSettings};
pub use ingestion_pipeline::{FailedFile, IngestionPipeline, PipelineReport};
