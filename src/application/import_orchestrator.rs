use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::application::ingestion_pipeline::{IngestionPipeline, PipelineReport};
use crate::domain::{
    error::IngestionError,
    models::ImportStats,
    ports::{ImporterBackend, ProviderParser},
};
use crate::infrastructure::parsers::ParserRegistry;

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Root holding one `<provider>/` folder of XML dumps per chain.
    pub dumps_folder: PathBuf,
    pub batch_size: usize,
    pub max_workers: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            dumps_folder: PathBuf::from("./dumps"),
            batch_size: 50,
            max_workers: 4,
        }
    }
}

/// Drives provider imports against one long-lived backend.
pub struct ImportOrchestrator {
    registry: ParserRegistry,
    backend: Arc<dyn ImporterBackend>,
    settings: OrchestratorSettings,
}

impl ImportOrchestrator {
    pub fn new(
        registry: ParserRegistry,
        backend: Arc<dyn ImporterBackend>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            registry,
            backend,
            settings,
        }
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Imports one provider. Unknown providers and parsers without a mapping
    /// fail with [`IngestionError::UnsupportedOperation`]; a missing dump folder
    /// yields zero counts.
    pub async fn import_provider(
        &self,
        name: &str,
        clear_existing: bool,
        batch_size: Option<usize>,
    ) -> Result<ImportStats, IngestionError> {
        self.import_provider_report(name, clear_existing, batch_size)
            .await
            .map(|report| report.stats)
    }

    /// [`import_provider`](Self::import_provider) with the full run report.
    pub async fn import_provider_report(
        &self,
        name: &str,
        clear_existing: bool,
        batch_size: Option<usize>,
    ) -> Result<PipelineReport, IngestionError> {
        let parser = self.registry.get(name).ok_or_else(|| {
            error!("Parser not found for provider: {}", name);
            IngestionError::unsupported(name, "no parser registered")
        })?;
        let provider = parser.provider_name().to_string();
        let batch_size = batch_size.unwrap_or(self.settings.batch_size);

        let span = info_span!("import", provider = %provider, run_id = %Uuid::new_v4());
        self.run_provider(name, &provider, parser, clear_existing, batch_size)
            .instrument(span)
            .await
    }

    async fn run_provider(
        &self,
        requested: &str,
        provider: &str,
        parser: Arc<dyn ProviderParser>,
        clear_existing: bool,
        batch_size: usize,
    ) -> Result<PipelineReport, IngestionError> {
        info!("=== Importing {} ===", provider);

        if clear_existing {
            self.backend.clear_provider_data(provider).await?;
        }

        let Some(folder) = self.provider_folder(requested, provider) else {
            warn!(
                "Dumps folder not found for {} under {}",
                provider,
                self.settings.dumps_folder.display()
            );
            return Ok(PipelineReport::default());
        };

        let pipeline =
            IngestionPipeline::new(parser, Arc::clone(&self.backend), self.settings.max_workers);
        let files = pipeline.discover_files(&folder)?;
        if files.is_empty() {
            warn!("No XML files found in {}", folder.display());
            return Ok(PipelineReport::default());
        }

        let report = pipeline.run(files, batch_size).await?;
        info!(
            "Total imported for {}: {} ({} batches, {} failed files, {} skipped)",
            provider,
            report.stats,
            report.batch_sizes.len(),
            report.failed.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// The dump folder named as requested, else under the canonical name.
    fn provider_folder(&self, requested: &str, canonical: &str) -> Option<PathBuf> {
        [requested, canonical]
            .into_iter()
            .map(|name| self.settings.dumps_folder.join(name))
            .find(|path| path.is_dir())
    }

    /// Imports every selected provider, logging and skipping the ones that fail.
    pub async fn import_all(
        &self,
        implemented_only: bool,
        fast_mode: bool,
    ) -> BTreeMap<String, ImportStats> {
        if fast_mode {
            info!("Fast mode: dropping indexes before import");
            if let Err(e) = self.backend.drop_indexes().await {
                warn!("Failed to drop indexes, continuing with them in place: {}", e);
            }
        }

        let providers = if implemented_only {
            self.registry.list_implemented()
        } else {
            self.discover_providers()
        };
        info!("Importing {} providers", providers.len());

        let mut results = BTreeMap::new();
        for provider in providers {
            match self.import_provider(&provider, false, None).await {
                Ok(stats) => {
                    let key = self
                        .registry
                        .canonical_name(&provider)
                        .unwrap_or(provider.as_str())
                        .to_string();
                    *results.entry(key).or_insert_with(ImportStats::default) += stats;
                }
                Err(e) if e.is_unsupported() => {
                    warn!("Skipping {}: parser not yet implemented", provider);
                }
                Err(e) => {
                    error!("Failed to import {}: {}", provider, e);
                }
            }
        }
        results
    }

    /// Folders under the dumps root whose name resolves to a registered parser.
    pub fn discover_providers(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.settings.dumps_folder) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(
                    "No providers discovered in {}: {}",
                    self.settings.dumps_folder.display(),
                    e
                );
                return Vec::new();
            }
        };

        let mut providers: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| self.registry.has(name))
            .collect();
        providers.sort();
        providers
    }

    pub async fn get_stats(&self) -> Result<ImportStats, IngestionError> {
        self.backend.get_stats().await
    }

    pub async fn create_indexes(&self) -> Result<(), IngestionError> {
        self.backend.create_indexes().await
    }

    pub async fn drop_indexes(&self) -> Result<(), IngestionError> {
        self.backend.drop_indexes().await
    }

    pub async fn close(&self) -> Result<(), IngestionError> {
        self.backend.close().await
    }
}
