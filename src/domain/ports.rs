use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::path::Path;

use crate::domain::{
    error::IngestionError,
    file_name::{detect_file_type, extract_timestamp},
    models::{FileKind, ImportStats, NormalizedRecords, Price, Promotion, Store},
};

/// Per-chain XML normalizer.
///
/// Implementations are blocking; the pipeline runs them on tokio's blocking pool.
pub trait ProviderParser: Send + Sync {
    fn provider_name(&self) -> &str;

    fn detect_file_type(&self, filename: &str) -> FileKind {
        detect_file_type(filename)
    }

    fn extract_timestamp(&self, filename: &str) -> Option<NaiveDateTime> {
        extract_timestamp(filename)
    }

    fn parse_stores(&self, path: &Path) -> Result<Vec<Store>, IngestionError>;

    fn parse_prices(&self, path: &Path) -> Result<Vec<Price>, IngestionError>;

    fn parse_promotions(&self, path: &Path) -> Result<Vec<Promotion>, IngestionError>;

    /// Dispatches to the `parse_*` matching `kind`. `None` for [`FileKind::Unknown`].
    fn parse_kind(
        &self,
        kind: FileKind,
        path: &Path,
    ) -> Option<Result<NormalizedRecords, IngestionError>> {
        let parsed = match kind {
            FileKind::Stores => self.parse_stores(path).map(NormalizedRecords::Stores),
            FileKind::Prices => self.parse_prices(path).map(NormalizedRecords::Prices),
            FileKind::Promotions => self
                .parse_promotions(path)
                .map(NormalizedRecords::Promotions),
            FileKind::Unknown => return None,
        };
        Some(parsed)
    }
}

/// Bulk sink for normalized records.
#[async_trait]
pub trait ImporterBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn import_stores(&self, stores: &[Store]) -> Result<u64, IngestionError>;

    async fn import_prices(&self, prices: &[Price]) -> Result<u64, IngestionError>;

    async fn import_promotions(&self, promotions: &[Promotion]) -> Result<u64, IngestionError>;

    async fn get_stats(&self) -> Result<ImportStats, IngestionError>;

    async fn clear_provider_data(&self, provider: &str) -> Result<(), IngestionError>;

    async fn create_indexes(&self) -> Result<(), IngestionError> {
        Ok(())
    }

    async fn drop_indexes(&self) -> Result<(), IngestionError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), IngestionError>;
}
