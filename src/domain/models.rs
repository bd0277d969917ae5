use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::AddAssign;
use std::path::PathBuf;

/// Kind of a dump file, inferred from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Stores,
    Prices,
    Promotions,
    Unknown,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stores => "stores",
            Self::Prices => "prices",
            Self::Promotions => "promotions",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One XML file discovered under `<dumps_root>/<provider>/`.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub provider: String,
    pub path: PathBuf,
    pub kind: FileKind,
    /// Provenance timestamp from a trailing `-YYYYMMDDHHMM.xml`, if any.
    pub timestamp: Option<NaiveDateTime>,
}

impl SourceFile {
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub provider: String,
    pub chain_id: String,
    pub chain_name: String,
    pub sub_chain_id: String,
    pub sub_chain_name: String,
    pub store_id: String,
    pub bikoret_no: String,
    pub store_type: String,
    pub store_name: String,
    pub address: String,
    pub city: String,
    pub zip_code: String,
    pub latitude: String,
    pub longitude: String,
    pub last_updated: Option<NaiveDateTime>,
    pub scraped_at: Option<NaiveDateTime>,
}

impl Store {
    pub fn natural_key(&self) -> (&str, &str) {
        (&self.provider, &self.store_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub provider: String,
    pub chain_id: String,
    pub sub_chain_id: String,
    pub store_id: String,
    pub bikoret_no: String,
    pub item_code: String,
    pub item_type: i64,
    pub item_name: String,
    pub manufacturer_name: String,
    pub manufacture_country: String,
    pub manufacturer_item_description: String,
    pub unit_qty: String,
    pub quantity: f64,
    pub unit_of_measure: String,
    pub is_weighted: i64,
    pub qty_in_package: f64,
    pub item_price: f64,
    pub unit_of_measure_price: f64,
    pub allow_discount: i64,
    pub item_status: i64,
    pub price_update_date: Option<NaiveDateTime>,
    pub last_update_date: Option<NaiveDateTime>,
    pub scraped_at: Option<NaiveDateTime>,
}

impl Price {
    pub fn natural_key(&self) -> (&str, &str, &str) {
        (&self.provider, &self.store_id, &self.item_code)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromotionItem {
    pub item_code: String,
    pub item_type: i64,
    pub is_gift_item: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    pub provider: String,
    pub chain_id: String,
    pub sub_chain_id: String,
    pub store_id: String,
    pub bikoret_no: String,
    pub promotion_id: String,
    pub promotion_description: String,
    pub promotion_update_date: Option<NaiveDateTime>,
    pub promotion_start_date: Option<NaiveDateTime>,
    pub promotion_start_hour: String,
    pub promotion_end_date: Option<NaiveDateTime>,
    pub promotion_end_hour: String,
    /// Set when the promotion is attached to a single line item.
    pub item_code: String,
    pub item_type: i64,
    pub is_gift_item: i64,
    pub reward_type: i64,
    pub allow_multiple_discounts: i64,
    pub is_weighted_promo: i64,
    pub club_ids: Vec<String>,
    pub min_qty: f64,
    pub max_qty: f64,
    pub discount_rate: f64,
    pub discount_type: i64,
    pub min_purchase_amount: f64,
    pub discounted_price: f64,
    pub discounted_price_per_mida: f64,
    pub min_no_of_item_offered: i64,
    // Column name already in use by stored data; keep the spelling.
    pub display_prioroty: i64,
    pub promotion_items: Vec<PromotionItem>,
    pub additional_is_coupon: i64,
    pub additional_gift_count: f64,
    pub additional_is_total: i64,
    pub additional_is_active: i64,
    pub additional_min_basket_amount: f64,
    pub additional_restrictions: String,
    pub remarks: String,
    pub price_update_date: Option<NaiveDateTime>,
    pub scraped_at: Option<NaiveDateTime>,
}

impl Promotion {
    pub fn natural_key(&self) -> (&str, &str, &str) {
        (&self.provider, &self.store_id, &self.promotion_id)
    }
}

/// Records parsed from a single file. One file only ever yields one kind.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedRecords {
    Stores(Vec<Store>),
    Prices(Vec<Price>),
    Promotions(Vec<Promotion>),
}

impl NormalizedRecords {
    pub fn kind(&self) -> FileKind {
        match self {
            Self::Stores(_) => FileKind::Stores,
            Self::Prices(_) => FileKind::Prices,
            Self::Promotions(_) => FileKind::Promotions,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Stores(v) => v.len(),
            Self::Prices(v) => v.len(),
            Self::Promotions(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A batch's parsed records, grouped by kind for one bulk write per kind.
#[derive(Debug, Default)]
pub struct RecordGroups {
    pub stores: Vec<Store>,
    pub prices: Vec<Price>,
    pub promotions: Vec<Promotion>,
}

impl RecordGroups {
    pub fn push(&mut self, records: NormalizedRecords) {
        match records {
            NormalizedRecords::Stores(v) => self.stores.extend(v),
            NormalizedRecords::Prices(v) => self.prices.extend(v),
            NormalizedRecords::Promotions(v) => self.promotions.extend(v),
        }
    }

    pub fn len(&self) -> usize {
        self.stores.len() + self.prices.len() + self.promotions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-kind counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStats {
    pub stores: u64,
    pub prices: u64,
    pub promotions: u64,
}

impl ImportStats {
    pub fn total(&self) -> u64 {
        self.stores + self.prices + self.promotions
    }

    pub fn add(&mut self, kind: FileKind, count: u64) {
        match kind {
            FileKind::Stores => self.stores += count,
            FileKind::Prices => self.prices += count,
            FileKind::Promotions => self.promotions += count,
            FileKind::Unknown => {}
        }
    }
}

impl AddAssign for ImportStats {
    fn add_assign(&mut self, other: Self) {
        self.stores += other.stores;
        self.prices += other.prices;
        self.promotions += other.promotions;
    }
}

impl fmt::Display for ImportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stores={}, prices={}, promotions={}",
            self.stores, self.prices, self.promotions
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_groups_partition_by_kind() {
        let mut groups = RecordGroups::default();
        groups.push(NormalizedRecords::Stores(vec![Store::default()]));
        groups.push(NormalizedRecords::Prices(vec![Price::default(), Price::default()]));
        groups.push(NormalizedRecords::Prices(vec![Price::default()]));

        assert_eq!(groups.stores.len(), 1);
        assert_eq!(groups.prices.len(), 3);
        assert!(groups.promotions.is_empty());
        assert_eq!(groups.len(), 4);
    }

    #[test]
    fn test_import_stats_accumulate() {
        let mut stats = ImportStats::default();
        stats.add(FileKind::Prices, 10);
        stats.add(FileKind::Unknown, 99);
        stats += ImportStats {
            stores: 1,
            prices: 2,
            promotions: 3,
        };

        assert_eq!(stats.stores, 1);
        assert_eq!(stats.prices, 12);
        assert_eq!(stats.promotions, 3);
        assert_eq!(stats.total(), 16);
    }

    #[test]
    fn test_natural_keys() {
        let price = Price {
            provider: "Victory".into(),
            store_id: "12".into(),
            item_code: "7290000".into(),
            ..Default::default()
        };
        assert_eq!(price.natural_key(), ("Victory", "12", "7290000"));
    }
}
