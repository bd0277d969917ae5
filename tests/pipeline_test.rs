mod common;

use std::sync::Arc;
use tempfile::TempDir;

use common::{price_file_name, super_pharm_prices, super_pharm_stores, write_file, MemoryBackend};
use supermarket_ingestion::domain::models::{FileKind, ImportStats};
use supermarket_ingestion::domain::ports::ImporterBackend;
use supermarket_ingestion::infrastructure::parsers::SuperPharmParser;
use supermarket_ingestion::IngestionPipeline;

fn pipeline(backend: &Arc<MemoryBackend>, workers: usize) -> IngestionPipeline {
    IngestionPipeline::new(Arc::new(SuperPharmParser::new()), backend.clone(), workers)
}

#[tokio::test]
async fn test_malformed_file_is_isolated_from_its_batch() {
    let dir = TempDir::new().unwrap();
    for store in 1..=10 {
        let body = if store == 4 {
            "<OrderXml><Envelope><StoreId>4</StoreId><Header>".to_string()
        } else {
            super_pharm_prices(store, &["100", "200"])
        };
        write_file(dir.path(), &price_file_name(store), &body);
    }

    let backend = Arc::new(MemoryBackend::new());
    let pipeline = pipeline(&backend, 4);
    let files = pipeline.discover_files(dir.path()).unwrap();
    assert_eq!(files.len(), 10);

    let report = pipeline.run(files, 50).await.unwrap();

    assert_eq!(report.stats.prices, 18);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].path.ends_with(price_file_name(4)));
    assert!(report.failed[0].error.contains("malformed input"));
    assert_eq!(backend.write_sizes(FileKind::Prices), vec![18]);
    assert_eq!(backend.get_stats().await.unwrap().prices, 18);
}

#[tokio::test]
async fn test_batches_run_in_order_with_remainder_last() {
    let dir = TempDir::new().unwrap();
    for store in 1..=120 {
        write_file(dir.path(), &price_file_name(store), &super_pharm_prices(store, &["7"]));
    }

    let backend = Arc::new(MemoryBackend::new());
    let pipeline = pipeline(&backend, 4);
    let files = pipeline.discover_files(dir.path()).unwrap();

    let report = pipeline.run(files, 50).await.unwrap();

    assert_eq!(report.batch_sizes, vec![50, 50, 20]);
    assert_eq!(backend.write_sizes(FileKind::Prices), vec![50, 50, 20]);
    assert_eq!(report.stats.prices, 120);
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn test_bulk_write_counts_sum_to_parsed_records() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "Stores7290172900007-000-202512060600.xml", &super_pharm_stores(&["1", "2", "3"]));
    write_file(dir.path(), &price_file_name(1), &super_pharm_prices(1, &["a", "b"]));
    write_file(dir.path(), &price_file_name(2), &super_pharm_prices(2, &["a", "b", "c", "d"]));
    write_file(
        dir.path(),
        "Promo7290172900007-001-202512060600.xml",
        &common::super_pharm_promotions(1, &["p1", "p2"]),
    );

    let backend = Arc::new(MemoryBackend::new());
    let pipeline = pipeline(&backend, 2);
    let files = pipeline.discover_files(dir.path()).unwrap();
    let report = pipeline.run(files, 3).await.unwrap();

    assert_eq!(report.batch_sizes, vec![3, 1]);
    assert_eq!(
        report.stats,
        ImportStats {
            stores: 3,
            prices: 6,
            promotions: 2
        }
    );

    let written: usize = [FileKind::Stores, FileKind::Prices, FileKind::Promotions]
        .into_iter()
        .flat_map(|kind| backend.write_sizes(kind))
        .sum();
    assert_eq!(written as u64, report.stats.total());
}

#[tokio::test]
async fn test_unknown_files_are_skipped_not_failed() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), &price_file_name(1), &super_pharm_prices(1, &["1"]));
    write_file(dir.path(), "inventory-202512060600.xml", "<Whatever/>");

    let backend = Arc::new(MemoryBackend::new());
    let pipeline = pipeline(&backend, 4);
    let files = pipeline.discover_files(dir.path()).unwrap();
    let report = pipeline.run(files, 50).await.unwrap();

    assert_eq!(report.stats.prices, 1);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn test_backend_failure_on_one_kind_keeps_other_kinds() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "Stores7290172900007-000-202512060600.xml", &super_pharm_stores(&["1", "2"]));
    write_file(dir.path(), &price_file_name(1), &super_pharm_prices(1, &["1", "2", "3"]));

    let backend = Arc::new(MemoryBackend::new());
    backend.fail_on(FileKind::Stores);
    let pipeline = pipeline(&backend, 2);
    let files = pipeline.discover_files(dir.path()).unwrap();
    let report = pipeline.run(files, 50).await.unwrap();

    assert_eq!(report.stats.stores, 0);
    assert_eq!(report.stats.prices, 3);
    assert!(backend.calls().contains(&"stores:failed".to_string()));
}
