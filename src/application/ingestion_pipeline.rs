use futures_util::future::join_all;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::domain::{
    error::IngestionError,
    models::{FileKind, ImportStats, NormalizedRecords, RecordGroups, SourceFile},
    ports::{ImporterBackend, ProviderParser},
};

/// A file whose parse failed; the rest of its batch still went through.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedFile {
    pub path: PathBuf,
    pub error: String,
}

/// What one provider run did.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub stats: ImportStats,
    /// Size of every batch executed, in order.
    pub batch_sizes: Vec<usize>,
    pub failed: Vec<FailedFile>,
    /// Files whose name matches no known kind.
    pub skipped: Vec<PathBuf>,
}

enum FileOutcome {
    Parsed(NormalizedRecords),
    Skipped,
    Failed(IngestionError),
}

fn parse_file(parser: &dyn ProviderParser, file: &SourceFile) -> FileOutcome {
    let parsed = panic::catch_unwind(AssertUnwindSafe(|| parser.parse_kind(file.kind, &file.path)));
    match parsed {
        Ok(None) => FileOutcome::Skipped,
        Ok(Some(Ok(records))) => FileOutcome::Parsed(records),
        Ok(Some(Err(e))) => FileOutcome::Failed(e),
        Err(_) => FileOutcome::Failed(IngestionError::malformed(&file.path, "parser panicked")),
    }
}

/// Parses a provider's files batch by batch on a fixed pool of blocking
/// workers and writes each batch's records with one bulk call per kind.
pub struct IngestionPipeline {
    parser: Arc<dyn ProviderParser>,
    backend: Arc<dyn ImporterBackend>,
    max_workers: usize,
}

impl IngestionPipeline {
    pub fn new(
        parser: Arc<dyn ProviderParser>,
        backend: Arc<dyn ImporterBackend>,
        max_workers: usize,
    ) -> Self {
        Self {
            parser,
            backend,
            max_workers: max_workers.max(1),
        }
    }

    /// Every `*.xml` file directly under `folder`, sorted by file name.
    pub fn discover_files(&self, folder: &Path) -> Result<Vec<SourceFile>, IngestionError> {
        debug!("Listing XML files in {}", folder.display());

        let mut files = Vec::new();
        for entry in std::fs::read_dir(folder)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("xml") {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                warn!("Skipping file with non UTF-8 name: {}", path.display());
                continue;
            };

            files.push(SourceFile {
                provider: self.parser.provider_name().to_string(),
                kind: self.parser.detect_file_type(name),
                timestamp: self.parser.extract_timestamp(name),
                path,
            });
        }

        files.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
        debug!("Found {} XML files in {}", files.len(), folder.display());
        Ok(files)
    }

    /// Runs `files` in sequential batches of `batch_size`.
    ///
    /// File-level parse failures and per-kind write failures are recorded and
    /// skipped. An [`IngestionError::UnsupportedOperation`] from the parser
    /// aborts the run once its batch has finished parsing.
    pub async fn run(
        &self,
        files: Vec<SourceFile>,
        batch_size: usize,
    ) -> Result<PipelineReport, IngestionError> {
        let batch_size = batch_size.max(1);
        let provider = self.parser.provider_name();
        let batch_count = files.len().div_ceil(batch_size);
        let mut report = PipelineReport::default();

        for (batch_index, batch) in files.chunks(batch_size).enumerate() {
            debug!(
                "{}: batch {}/{} - parsing {} files",
                provider,
                batch_index + 1,
                batch_count,
                batch.len()
            );
            report.batch_sizes.push(batch.len());

            let outcomes = self.parse_batch(batch.to_vec()).await;

            let mut groups = RecordGroups::default();
            let mut unsupported = None;
            for (file, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    FileOutcome::Parsed(records) => {
                        debug!("✓ {}: {} {}", file.file_name(), records.len(), records.kind());
                        groups.push(records);
                    }
                    FileOutcome::Skipped => {
                        warn!("{}: unknown file type", file.file_name());
                        report.skipped.push(file.path.clone());
                    }
                    FileOutcome::Failed(e) if e.is_unsupported() => {
                        unsupported.get_or_insert(e);
                    }
                    FileOutcome::Failed(e) => {
                        error!("{}: {}", file.file_name(), e);
                        report.failed.push(FailedFile {
                            path: file.path.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }

            if let Some(e) = unsupported {
                error!("{}: {}", provider, e);
                return Err(e);
            }

            let written = self.write_groups(&groups).await;
            info!(
                "{}: batch {}/{} done - {} records parsed, {} written",
                provider,
                batch_index + 1,
                batch_count,
                groups.len(),
                written
            );
            report.stats += written;
        }

        Ok(report)
    }

    /// Parses one batch with up to `max_workers` blocking workers. Returns one
    /// outcome per file, in input order, after every worker has finished.
    async fn parse_batch(&self, files: Vec<SourceFile>) -> Vec<FileOutcome> {
        let files = Arc::new(files);
        let next = Arc::new(AtomicUsize::new(0));
        let workers = self.max_workers.min(files.len());

        let handles = (0..workers).map(|_| {
            let files = Arc::clone(&files);
            let next = Arc::clone(&next);
            let parser = Arc::clone(&self.parser);
            tokio::task::spawn_blocking(move || {
                let mut done = Vec::new();
                loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    let Some(file) = files.get(index) else {
                        break;
                    };
                    done.push((index, parse_file(parser.as_ref(), file)));
                }
                done
            })
        });

        let mut slots: Vec<Option<FileOutcome>> = (0..files.len()).map(|_| None).collect();
        for joined in join_all(handles).await {
            match joined {
                Ok(done) => {
                    for (index, outcome) in done {
                        slots[index] = Some(outcome);
                    }
                }
                Err(e) => error!("Parse worker failed: {}", e),
            }
        }

        slots
            .into_iter()
            .zip(files.iter())
            .map(|(slot, file)| {
                slot.unwrap_or_else(|| {
                    FileOutcome::Failed(IngestionError::malformed(&file.path, "parse worker aborted"))
                })
            })
            .collect()
    }

    async fn write_groups(&self, groups: &RecordGroups) -> ImportStats {
        let mut stats = ImportStats::default();

        if !groups.stores.is_empty() {
            let result = self.backend.import_stores(&groups.stores).await;
            self.record_write(&mut stats, FileKind::Stores, groups.stores.len(), result);
        }
        if !groups.prices.is_empty() {
            let result = self.backend.import_prices(&groups.prices).await;
            self.record_write(&mut stats, FileKind::Prices, groups.prices.len(), result);
        }
        if !groups.promotions.is_empty() {
            let result = self.backend.import_promotions(&groups.promotions).await;
            self.record_write(&mut stats, FileKind::Promotions, groups.promotions.len(), result);
        }

        stats
    }

    fn record_write(
        &self,
        stats: &mut ImportStats,
        kind: FileKind,
        submitted: usize,
        result: Result<u64, IngestionError>,
    ) {
        match result {
            Ok(count) => {
                debug!("{}: wrote {} of {} {}", self.backend.name(), count, submitted, kind);
                stats.add(kind, count);
            }
            Err(e) => error!(
                "{}: bulk write of {} {} failed: {}",
                self.backend.name(),
                submitted,
                kind,
                e
            ),
        }
    }
}
