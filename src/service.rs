use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    application::ImportOrchestrator,
    config::{AppConfig, DatabaseType},
    domain::{error::IngestionError, models::ImportStats, ports::ImporterBackend},
    infrastructure::{clickhouse::ClickHouseImporter, mongodb::MongoImporter, parsers::ParserRegistry},
};

/// Long-lived owner of the backend connection and the import run lock.
///
/// At most one import runs at a time; a trigger that arrives while one is
/// active is rejected with [`IngestionError::ImportInProgress`], not queued.
pub struct ImportService {
    orchestrator: ImportOrchestrator,
    config: AppConfig,
    run_lock: Mutex<()>,
}

impl ImportService {
    /// Connects the backend selected by `config.database_type`.
    pub async fn new(config: AppConfig) -> Result<Self, IngestionError> {
        debug!("Initializing import service");
        config.validate()?;

        let backend: Arc<dyn ImporterBackend> = match config.database_type {
            DatabaseType::Clickhouse => {
                let settings = &config.clickhouse;
                info!(
                    "Using ClickHouse at {}, database: {}",
                    settings.base_url(),
                    settings.database
                );
                Arc::new(
                    ClickHouseImporter::connect(
                        settings.base_url(),
                        settings.user.clone(),
                        settings.password.clone(),
                        settings.database.clone(),
                    )
                    .await?,
                )
            }
            DatabaseType::Mongodb => {
                info!(
                    "Using MongoDB URI: {}, Database: {}",
                    config.mongodb.uri, config.mongodb.database
                );
                Arc::new(MongoImporter::connect(&config.mongodb.uri, &config.mongodb.database).await?)
            }
        };

        Ok(Self::with_backend(config, backend))
    }

    pub fn with_backend(config: AppConfig, backend: Arc<dyn ImporterBackend>) -> Self {
        let orchestrator = ImportOrchestrator::new(
            ParserRegistry::with_default_providers(),
            backend,
            config.orchestrator_settings(),
        );
        debug!("Import service initialization complete");
        Self {
            orchestrator,
            config,
            run_lock: Mutex::new(()),
        }
    }

    pub fn orchestrator(&self) -> &ImportOrchestrator {
        &self.orchestrator
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    /// Runs `import_all` with the configured flags. Indexes dropped by fast
    /// mode are recreated before the lock is released.
    pub async fn trigger_import_all(&self) -> Result<BTreeMap<String, ImportStats>, IngestionError> {
        let _guard = self.run_lock.try_lock().map_err(|_| {
            warn!("Import trigger rejected: a run is already in progress");
            IngestionError::ImportInProgress
        })?;

        let settings = &self.config.import;
        let results = self
            .orchestrator
            .import_all(settings.implemented_only, settings.fast_mode)
            .await;

        if settings.fast_mode {
            info!("Recreating indexes after fast-mode import");
            if let Err(e) = self.orchestrator.create_indexes().await {
                error!("Failed to recreate indexes: {}", e);
            }
        }

        let total = results
            .values()
            .fold(ImportStats::default(), |mut acc, stats| {
                acc += *stats;
                acc
            });
        info!("✅ Import run finished for {} providers: {}", results.len(), total);
        Ok(results)
    }

    /// Imports one provider under the run lock.
    pub async fn trigger_import(
        &self,
        provider: &str,
        clear_existing: bool,
    ) -> Result<ImportStats, IngestionError> {
        let _guard = self.run_lock.try_lock().map_err(|_| {
            warn!("Import of {} rejected: a run is already in progress", provider);
            IngestionError::ImportInProgress
        })?;

        self.orchestrator
            .import_provider(provider, clear_existing, None)
            .await
    }

    pub async fn close(&self) -> Result<(), IngestionError> {
        self.orchestrator.close().await
    }
}
