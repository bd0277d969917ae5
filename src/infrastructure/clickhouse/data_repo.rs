use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::domain::{
    error::IngestionError,
    models::{ImportStats, Price, Promotion, Store},
    ports::ImporterBackend,
};

const TABLES: [&str; 3] = ["stores", "prices", "promotions"];
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StoreRow {
    provider: String,
    chain_id: String,
    store_id: i32,
    store_name: String,
    address: String,
    city: String,
    zip_code: String,
    last_update: String,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PriceRow {
    provider: String,
    chain_id: String,
    store_id: i32,
    item_code: String,
    item_name: String,
    manufacturer_name: String,
    manufacture_country: String,
    unit_qty: String,
    quantity: f32,
    #[serde(rename = "bIsWeighted")]
    is_weighted: i8,
    unit_of_measure: String,
    qty_in_package: i32,
    item_price: f32,
    unit_of_measure_price: f32,
    allow_discount: i8,
    item_status: i8,
    last_update: String,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PromotionRow {
    provider: String,
    chain_id: String,
    store_id: i32,
    promotion_id: String,
    promotion_description: String,
    promotion_start_date: String,
    promotion_end_date: String,
    // Column name is misspelled in deployed schemas.
    #[serde(rename = "DisplayPrioroty")]
    display_prioroty: i32,
    is_weighted: i8,
    last_update: String,
}

fn store_id(value: &str) -> Option<i32> {
    value.trim().parse().ok()
}

fn float32(value: f64) -> Option<f32> {
    let narrowed = value as f32;
    narrowed.is_finite().then_some(narrowed)
}

fn int32(value: f64) -> Option<i32> {
    (value.is_finite() && value >= i32::MIN as f64 && value <= i32::MAX as f64)
        .then(|| value as i32)
}

fn format_datetime(value: NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

impl StoreRow {
    fn from_record(store: &Store, now: NaiveDateTime) -> Option<Self> {
        Some(Self {
            provider: store.provider.clone(),
            chain_id: store.chain_id.clone(),
            store_id: store_id(&store.store_id)?,
            store_name: store.store_name.clone(),
            address: store.address.clone(),
            city: store.city.clone(),
            zip_code: store.zip_code.clone(),
            last_update: format_datetime(now),
        })
    }
}

impl PriceRow {
    fn from_record(price: &Price, now: NaiveDateTime) -> Option<Self> {
        Some(Self {
            provider: price.provider.clone(),
            chain_id: price.chain_id.clone(),
            store_id: store_id(&price.store_id)?,
            item_code: price.item_code.clone(),
            item_name: price.item_name.clone(),
            manufacturer_name: price.manufacturer_name.clone(),
            manufacture_country: price.manufacture_country.clone(),
            unit_qty: price.unit_qty.clone(),
            quantity: float32(price.quantity)?,
            is_weighted: i8::try_from(price.is_weighted).ok()?,
            unit_of_measure: price.unit_of_measure.clone(),
            qty_in_package: int32(price.qty_in_package)?,
            item_price: float32(price.item_price)?,
            unit_of_measure_price: float32(price.unit_of_measure_price)?,
            allow_discount: i8::try_from(price.allow_discount).ok()?,
            item_status: i8::try_from(price.item_status).ok()?,
            last_update: format_datetime(now),
        })
    }
}

impl PromotionRow {
    fn from_record(promotion: &Promotion, now: NaiveDateTime) -> Option<Self> {
        Some(Self {
            provider: promotion.provider.clone(),
            chain_id: promotion.chain_id.clone(),
            store_id: store_id(&promotion.store_id)?,
            promotion_id: promotion.promotion_id.clone(),
            promotion_description: promotion.promotion_description.clone(),
            promotion_start_date: format_datetime(promotion.promotion_start_date.unwrap_or(now)),
            promotion_end_date: format_datetime(promotion.promotion_end_date.unwrap_or(now)),
            display_prioroty: i32::try_from(promotion.display_prioroty).ok()?,
            is_weighted: i8::try_from(promotion.is_weighted_promo).ok()?,
            last_update: format_datetime(now),
        })
    }
}

fn table_ddl(database: &str) -> [String; 3] {
    [
        format!(
            "CREATE TABLE IF NOT EXISTS {database}.stores (
                Provider String,
                ChainId String,
                StoreId Int32,
                StoreName String,
                Address String,
                City String,
                ZipCode String,
                LastUpdate DateTime DEFAULT now()
            ) ENGINE = ReplacingMergeTree(LastUpdate)
            ORDER BY (Provider, StoreId)"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {database}.prices (
                Provider String,
                ChainId String,
                StoreId Int32,
                ItemCode String,
                ItemName String,
                ManufacturerName String,
                ManufactureCountry String,
                UnitQty String,
                Quantity Float32,
                bIsWeighted Int8,
                UnitOfMeasure String,
                QtyInPackage Int32,
                ItemPrice Float32,
                UnitOfMeasurePrice Float32,
                AllowDiscount Int8,
                ItemStatus Int8,
                LastUpdate DateTime DEFAULT now()
            ) ENGINE = MergeTree()
            ORDER BY (Provider, StoreId, ItemCode, LastUpdate)"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {database}.promotions (
                Provider String,
                ChainId String,
                StoreId Int32,
                PromotionId String,
                PromotionDescription String,
                PromotionStartDate DateTime,
                PromotionEndDate DateTime,
                DisplayPrioroty Int32,
                IsWeighted Int8,
                LastUpdate DateTime DEFAULT now()
            ) ENGINE = MergeTree()
            ORDER BY (Provider, StoreId, PromotionId, LastUpdate)"
        ),
    ]
}

/// Brings tables created before the `Provider` column existed up to date.
/// `CREATE TABLE IF NOT EXISTS` leaves such tables untouched, so inserts naming
/// `Provider` would otherwise be rejected. Their sort keys stay as they were.
fn provider_column_migrations(database: &str) -> Vec<String> {
    TABLES
        .iter()
        .map(|table| {
            format!("ALTER TABLE {database}.{table} ADD COLUMN IF NOT EXISTS Provider String FIRST")
        })
        .collect()
}

/// Single-quoted ClickHouse string literal.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn json_each_row<T: Serialize>(rows: &[T]) -> Result<String, serde_json::Error> {
    let lines = rows
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}

/// Columnar backend speaking to ClickHouse's HTTP interface.
///
/// Inserts are append-only: prices and promotions keep one row per import,
/// stores collapse to the latest `LastUpdate` on merge.
pub struct ClickHouseImporter {
    client: Client,
    base_url: String,
    user: String,
    password: String,
    database: String,
}

impl ClickHouseImporter {
    pub fn new(base_url: String, user: String, password: String, database: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            user,
            password,
            database,
        }
    }

    /// Builds the importer and makes sure the database and tables exist.
    pub async fn connect(
        base_url: String,
        user: String,
        password: String,
        database: String,
    ) -> Result<Self, IngestionError> {
        debug!("Connecting to ClickHouse at {}", base_url);
        let importer = Self::new(base_url, user, password, database);

        importer
            .execute(&format!("CREATE DATABASE IF NOT EXISTS {}", importer.database), None)
            .await?;
        for ddl in table_ddl(&importer.database) {
            importer.execute(&ddl, None).await?;
        }
        for migration in provider_column_migrations(&importer.database) {
            debug!("ClickHouse migration: {}", migration);
            importer.execute(&migration, None).await?;
        }

        info!(
            "Connected to ClickHouse at {}, tables verified in {}",
            importer.base_url, importer.database
        );
        Ok(importer)
    }

    async fn execute(&self, query: &str, body: Option<String>) -> Result<String, IngestionError> {
        let mut request = self
            .client
            .post(&self.base_url)
            .query(&[("query", query)])
            .header("X-ClickHouse-User", &self.user)
            .header("X-ClickHouse-Key", &self.password);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| {
            error!("ClickHouse request failed: {}", e);
            IngestionError::Database(e.to_string())
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            error!("Failed to read ClickHouse response: {}", e);
            IngestionError::Database(e.to_string())
        })?;

        if !status.is_success() {
            error!("ClickHouse returned {}: {}", status, text.trim());
            return Err(IngestionError::Database(format!(
                "ClickHouse returned {}: {}",
                status,
                text.trim()
            )));
        }
        Ok(text)
    }

    async fn insert<T: Serialize>(
        &self,
        table: &str,
        columns: &str,
        rows: &[T],
        received: usize,
    ) -> Result<u64, IngestionError> {
        let dropped = received - rows.len();
        if dropped > 0 {
            warn!("{}: dropped {} of {} records that do not fit the column types", table, dropped, received);
        }
        if rows.is_empty() {
            return Ok(0);
        }

        let body = json_each_row(rows).map_err(|e| IngestionError::BackendWrite(e.to_string()))?;
        let query = format!(
            "INSERT INTO {}.{} ({}) FORMAT JSONEachRow",
            self.database, table, columns
        );
        self.execute(&query, Some(body))
            .await
            .map_err(|e| IngestionError::BackendWrite(format!("insert into {} failed: {}", table, e)))?;

        info!("✅ Inserted {} rows into {}.{}", rows.len(), self.database, table);
        Ok(rows.len() as u64)
    }

    async fn count(&self, table: &str) -> Result<u64, IngestionError> {
        let query = format!("SELECT count() FROM {}.{} FORMAT TabSeparated", self.database, table);
        let text = self.execute(&query, None).await?;
        text.trim().parse().map_err(|e| {
            error!("Unexpected count response from {}: {:?}", table, text);
            IngestionError::Database(format!("invalid count for {}: {}", table, e))
        })
    }
}

#[async_trait]
impl ImporterBackend for ClickHouseImporter {
    fn name(&self) -> &'static str {
        "clickhouse"
    }

    async fn import_stores(&self, stores: &[Store]) -> Result<u64, IngestionError> {
        let now = Utc::now().naive_utc();
        let rows: Vec<StoreRow> = stores
            .iter()
            .filter_map(|s| StoreRow::from_record(s, now))
            .collect();
        self.insert(
            "stores",
            "Provider, ChainId, StoreId, StoreName, Address, City, ZipCode, LastUpdate",
            &rows,
            stores.len(),
        )
        .await
    }

    async fn import_prices(&self, prices: &[Price]) -> Result<u64, IngestionError> {
        let now = Utc::now().naive_utc();
        let rows: Vec<PriceRow> = prices
            .iter()
            .filter_map(|p| PriceRow::from_record(p, now))
            .collect();
        self.insert(
            "prices",
            "Provider, ChainId, StoreId, ItemCode, ItemName, ManufacturerName, ManufactureCountry, \
             UnitQty, Quantity, bIsWeighted, UnitOfMeasure, QtyInPackage, ItemPrice, \
             UnitOfMeasurePrice, AllowDiscount, ItemStatus, LastUpdate",
            &rows,
            prices.len(),
        )
        .await
    }

    async fn import_promotions(&self, promotions: &[Promotion]) -> Result<u64, IngestionError> {
        let now = Utc::now().naive_utc();
        let rows: Vec<PromotionRow> = promotions
            .iter()
            .filter_map(|p| PromotionRow::from_record(p, now))
            .collect();
        self.insert(
            "promotions",
            "Provider, ChainId, StoreId, PromotionId, PromotionDescription, PromotionStartDate, \
             PromotionEndDate, DisplayPrioroty, IsWeighted, LastUpdate",
            &rows,
            promotions.len(),
        )
        .await
    }

    async fn get_stats(&self) -> Result<ImportStats, IngestionError> {
        Ok(ImportStats {
            stores: self.count("stores").await?,
            prices: self.count("prices").await?,
            promotions: self.count("promotions").await?,
        })
    }

    async fn clear_provider_data(&self, provider: &str) -> Result<(), IngestionError> {
        warn!("Clearing data for {} in ClickHouse (synchronous mutation)", provider);
        for table in TABLES {
            let query = format!(
                "ALTER TABLE {}.{} DELETE WHERE Provider = {} SETTINGS mutations_sync = 2",
                self.database,
                table,
                quote(provider)
            );
            self.execute(&query, None).await?;
            debug!("Deleted rows of {} from {}", provider, table);
        }
        info!("✓ Cleared all data for provider: {}", provider);
        Ok(())
    }

    async fn close(&self) -> Result<(), IngestionError> {
        debug!("Closing ClickHouse importer for {}", self.base_url);
        Ok(())
    }
}
