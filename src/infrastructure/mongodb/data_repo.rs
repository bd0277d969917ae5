use async_trait::async_trait;
use chrono::NaiveDateTime;
use mongodb::{
    bson::{self, doc, Bson, Document},
    options::IndexOptions,
    Client, Collection, Database, IndexModel,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::domain::{
    error::IngestionError,
    models::{ImportStats, Price, Promotion, Store},
    ports::ImporterBackend,
};

const STORES: &str = "stores";
const PRICES: &str = "prices";
const PROMOTIONS: &str = "promotions";

/// Operations per `update` command.
const UPSERT_CHUNK_SIZE: usize = 1000;

/// A record kind stored as one document per natural key.
trait MongoRecord: Serialize + Sync {
    const COLLECTION: &'static str;

    /// Natural-key filter of the upsert.
    fn key_filter(&self) -> Document;

    fn date_fields(&self) -> Vec<(&'static str, Option<NaiveDateTime>)>;
}

impl MongoRecord for Store {
    const COLLECTION: &'static str = STORES;

    fn key_filter(&self) -> Document {
        doc! { "provider": &self.provider, "store_id": &self.store_id }
    }

    fn date_fields(&self) -> Vec<(&'static str, Option<NaiveDateTime>)> {
        vec![("last_updated", self.last_updated), ("scraped_at", self.scraped_at)]
    }
}

impl MongoRecord for Price {
    const COLLECTION: &'static str = PRICES;

    fn key_filter(&self) -> Document {
        doc! {
            "provider": &self.provider,
            "store_id": &self.store_id,
            "item_code": &self.item_code,
        }
    }

    fn date_fields(&self) -> Vec<(&'static str, Option<NaiveDateTime>)> {
        vec![
            ("price_update_date", self.price_update_date),
            ("last_update_date", self.last_update_date),
            ("scraped_at", self.scraped_at),
        ]
    }
}

impl MongoRecord for Promotion {
    const COLLECTION: &'static str = PROMOTIONS;

    fn key_filter(&self) -> Document {
        doc! {
            "provider": &self.provider,
            "store_id": &self.store_id,
            "promotion_id": &self.promotion_id,
        }
    }

    fn date_fields(&self) -> Vec<(&'static str, Option<NaiveDateTime>)> {
        vec![
            ("promotion_update_date", self.promotion_update_date),
            ("promotion_start_date", self.promotion_start_date),
            ("promotion_end_date", self.promotion_end_date),
            ("price_update_date", self.price_update_date),
            ("scraped_at", self.scraped_at),
        ]
    }
}

fn bson_datetime(value: Option<NaiveDateTime>) -> Bson {
    match value {
        Some(dt) => Bson::DateTime(bson::DateTime::from_millis(dt.and_utc().timestamp_millis())),
        None => Bson::Null,
    }
}

/// Full `$set` payload for one record: every field, dates as BSON dates, plus
/// `imported_at`.
fn record_document<T: MongoRecord>(
    record: &T,
    imported_at: bson::DateTime,
) -> Result<Document, bson::ser::Error> {
    let mut document = bson::to_document(record)?;
    for (field, value) in record.date_fields() {
        document.insert(field, bson_datetime(value));
    }
    document.insert("imported_at", imported_at);
    Ok(document)
}

/// Unordered upsert-by-filter `update` command. One failing statement does not
/// stop the others.
fn upsert_command(collection: &str, operations: Vec<(Document, Document)>) -> Document {
    let updates: Vec<Document> = operations
        .into_iter()
        .map(|(filter, fields)| {
            doc! {
                "q": filter,
                "u": { "$set": fields },
                "upsert": true,
                "multi": false,
            }
        })
        .collect();

    doc! {
        "update": collection,
        "updates": updates,
        "ordered": false,
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct UpsertOutcome {
    upserted: u64,
    modified: u64,
    write_errors: usize,
}

impl UpsertOutcome {
    fn from_response(response: &Document) -> Self {
        Self {
            upserted: response
                .get_array("upserted")
                .map(|ids| ids.len() as u64)
                .unwrap_or(0),
            modified: count_field(response, "nModified"),
            write_errors: response
                .get_array("writeErrors")
                .map(|errors| errors.len())
                .unwrap_or(0),
        }
    }

    fn imported(&self) -> u64 {
        self.upserted + self.modified
    }
}

fn count_field(document: &Document, key: &str) -> u64 {
    match document.get(key) {
        Some(Bson::Int32(n)) => (*n).max(0) as u64,
        Some(Bson::Int64(n)) => (*n).max(0) as u64,
        Some(Bson::Double(n)) if *n > 0.0 => *n as u64,
        _ => 0,
    }
}

/// Document-store backend: one current document per natural key.
pub struct MongoImporter {
    database_name: String,
    db: Database,
}

impl MongoImporter {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, IngestionError> {
        debug!("Connecting to MongoDB for database: {}", database);
        let client = Client::with_uri_str(uri).await.map_err(|e| {
            error!("Failed to create MongoDB client: {}", e);
            IngestionError::Database(e.to_string())
        })?;

        let importer = Self::new(client, database.to_string());
        importer
            .db
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                error!("Failed to connect to MongoDB: {}", e);
                IngestionError::Database(e.to_string())
            })?;

        info!("Connected to MongoDB database: {}", database);
        Ok(importer)
    }

    pub fn new(client: Client, database_name: String) -> Self {
        debug!("Initializing MongoDB importer for database: {}", database_name);
        let db = client.database(&database_name);
        Self { database_name, db }
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection(name)
    }

    async fn bulk_upsert<T: MongoRecord>(&self, records: &[T]) -> Result<u64, IngestionError> {
        if records.is_empty() {
            debug!("No documents to upsert into {}", T::COLLECTION);
            return Ok(0);
        }

        let imported_at = bson::DateTime::now();
        let mut total = 0;
        let mut failed_chunks = 0;
        let chunks = records.chunks(UPSERT_CHUNK_SIZE);
        let chunk_count = chunks.len();

        for (chunk_index, chunk) in chunks.enumerate() {
            let mut operations = Vec::with_capacity(chunk.len());
            for (i, record) in chunk.iter().enumerate() {
                match record_document(record, imported_at) {
                    Ok(document) => operations.push((record.key_filter(), document)),
                    Err(e) => warn!(
                        "Skipping {} record {} in chunk {}: BSON conversion failed: {}",
                        T::COLLECTION,
                        i,
                        chunk_index + 1,
                        e
                    ),
                }
            }
            if operations.is_empty() {
                continue;
            }

            let operation_count = operations.len();
            let command = upsert_command(T::COLLECTION, operations);
            match self.db.run_command(command, None).await {
                Ok(response) => {
                    let outcome = UpsertOutcome::from_response(&response);
                    if outcome.write_errors > 0 {
                        warn!(
                            "{}: chunk {}/{} had {} write errors",
                            T::COLLECTION,
                            chunk_index + 1,
                            chunk_count,
                            outcome.write_errors
                        );
                    }
                    debug!(
                        "{}: chunk {}/{} - {} operations, {} upserted, {} modified",
                        T::COLLECTION,
                        chunk_index + 1,
                        chunk_count,
                        operation_count,
                        outcome.upserted,
                        outcome.modified
                    );
                    total += outcome.imported();
                }
                Err(e) => {
                    error!(
                        "Bulk upsert into {} failed for chunk {}/{}: {}",
                        T::COLLECTION,
                        chunk_index + 1,
                        chunk_count,
                        e
                    );
                    failed_chunks += 1;
                }
            }
        }

        if failed_chunks > 0 && failed_chunks == chunk_count {
            return Err(IngestionError::BackendWrite(format!(
                "all {} upsert chunks into {}.{} failed",
                chunk_count, self.database_name, T::COLLECTION
            )));
        }

        info!(
            "✅ Upserted {} of {} documents into collection: {}",
            total,
            records.len(),
            T::COLLECTION
        );
        Ok(total)
    }

    async fn create_index(
        &self,
        collection: &str,
        keys: Document,
        name: &str,
        unique: bool,
    ) -> Result<(), IngestionError> {
        let options = IndexOptions::builder()
            .unique(unique)
            .name(name.to_string())
            .build();
        let model = IndexModel::builder().keys(keys).options(options).build();

        self.collection(collection)
            .create_index(model, None)
            .await
            .map_err(|e| {
                error!("Failed to create index {} on {}: {}", name, collection, e);
                IngestionError::Database(e.to_string())
            })?;
        debug!("Index {} ready on {}", name, collection);
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<u64, IngestionError> {
        self.collection(collection)
            .count_documents(doc! {}, None)
            .await
            .map_err(|e| {
                error!("Failed to count documents in {}: {}", collection, e);
                IngestionError::Database(e.to_string())
            })
    }
}

#[async_trait]
impl ImporterBackend for MongoImporter {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn import_stores(&self, stores: &[Store]) -> Result<u64, IngestionError> {
        self.bulk_upsert(stores).await
    }

    async fn import_prices(&self, prices: &[Price]) -> Result<u64, IngestionError> {
        self.bulk_upsert(prices).await
    }

    async fn import_promotions(&self, promotions: &[Promotion]) -> Result<u64, IngestionError> {
        self.bulk_upsert(promotions).await
    }

    async fn get_stats(&self) -> Result<ImportStats, IngestionError> {
        Ok(ImportStats {
            stores: self.count(STORES).await?,
            prices: self.count(PRICES).await?,
            promotions: self.count(PROMOTIONS).await?,
        })
    }

    async fn clear_provider_data(&self, provider: &str) -> Result<(), IngestionError> {
        for collection in [STORES, PRICES, PROMOTIONS] {
            let result = self
                .collection(collection)
                .delete_many(doc! { "provider": provider }, None)
                .await
                .map_err(|e| {
                    error!("Failed to clear {} for {}: {}", collection, provider, e);
                    IngestionError::Database(e.to_string())
                })?;
            debug!(
                "Deleted {} documents from {} for provider {}",
                result.deleted_count, collection, provider
            );
        }
        info!("✓ Cleared all data for provider: {}", provider);
        Ok(())
    }

    async fn create_indexes(&self) -> Result<(), IngestionError> {
        self.create_index(STORES, doc! { "provider": 1, "store_id": 1 }, "idx_provider_store_id", true)
            .await?;
        self.create_index(STORES, doc! { "city": 1 }, "idx_city", false).await?;
        self.create_index(STORES, doc! { "chain_id": 1 }, "idx_chain_id", false).await?;

        self.create_index(
            PRICES,
            doc! { "provider": 1, "store_id": 1, "item_code": 1 },
            "idx_provider_store_item",
            true,
        )
        .await?;
        self.create_index(PRICES, doc! { "item_code": 1 }, "idx_item_code", false).await?;
        self.create_index(PRICES, doc! { "item_name": "text" }, "idx_item_name_text", false)
            .await?;
        self.create_index(PRICES, doc! { "price_update_date": -1 }, "idx_price_update_date", false)
            .await?;

        self.create_index(
            PROMOTIONS,
            doc! { "provider": 1, "store_id": 1, "promotion_id": 1 },
            "idx_provider_store_promo",
            true,
        )
        .await?;
        self.create_index(PROMOTIONS, doc! { "item_code": 1 }, "idx_promo_item_code", false)
            .await?;
        self.create_index(PROMOTIONS, doc! { "promotion_start_date": 1 }, "idx_promo_start_date", false)
            .await?;
        self.create_index(PROMOTIONS, doc! { "promotion_end_date": 1 }, "idx_promo_end_date", false)
            .await?;

        info!("✓ MongoDB indexes created successfully");
        Ok(())
    }

    async fn drop_indexes(&self) -> Result<(), IngestionError> {
        for collection in [STORES, PRICES, PROMOTIONS] {
            self.collection(collection)
                .drop_indexes(None)
                .await
                .map_err(|e| {
                    error!("Failed to drop indexes on {}: {}", collection, e);
                    IngestionError::Database(e.to_string())
                })?;
        }
        warn!("Dropped all secondary indexes; recreate them after the import");
        Ok(())
    }

    async fn close(&self) -> Result<(), IngestionError> {
        // The driver releases its pool when the last client handle is dropped.
        debug!("Closing MongoDB importer for database: {}", self.database_name);
        Ok(())
    }
}
