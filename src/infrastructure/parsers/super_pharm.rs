use std::path::Path;
use tracing::debug;

use super::{file_timestamp, xml};
use crate::domain::{
    error::IngestionError,
    models::{Price, Promotion, Store},
    ports::ProviderParser,
};

/// SuperPharm: stores nested under `SubChain`, prices and promotions as
/// `Envelope/.../Line` rows.
pub struct SuperPharmParser {
    provider: String,
}

impl SuperPharmParser {
    pub fn new() -> Self {
        Self {
            provider: "SuperPharm".to_string(),
        }
    }
}

impl Default for SuperPharmParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderParser for SuperPharmParser {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn parse_stores(&self, path: &Path) -> Result<Vec<Store>, IngestionError> {
        let scraped_at = file_timestamp(path);
        let root = xml::parse_file(path)?;

        let chain_id = root.text_or("ChainId", "");
        let chain_name = root.text_or("ChainName", "");
        let last_updated = root.date("LastUpdateDate", &["%Y-%m-%d"]);

        let mut stores = Vec::new();
        for sub_chain in root.descendants("SubChain") {
            let sub_chain_id = sub_chain.text_or("SubChainID", "");

            for store in sub_chain.descendants("Store") {
                stores.push(Store {
                    provider: self.provider.clone(),
                    chain_id: chain_id.clone(),
                    chain_name: chain_name.clone(),
                    sub_chain_id: sub_chain_id.clone(),
                    store_id: store.text_or("StoreID", ""),
                    bikoret_no: store.text_or("BikoretNo", ""),
                    store_type: store.text_or("StoreType", ""),
                    store_name: store.text_or("StoreName", ""),
                    address: store.text_or("Address", ""),
                    city: store.text_or("City", ""),
                    zip_code: store.text_or("ZipCode", ""),
                    last_updated,
                    scraped_at,
                    ..Default::default()
                });
            }
        }

        debug!("{}: parsed {} stores from {}", self.provider, stores.len(), path.display());
        Ok(stores)
    }

    fn parse_prices(&self, path: &Path) -> Result<Vec<Price>, IngestionError> {
        let scraped_at = file_timestamp(path);
        let root = xml::parse_file(path)?;

        let Some(envelope) = root.child("Envelope") else {
            debug!("{}: no Envelope in {}", self.provider, path.display());
            return Ok(Vec::new());
        };

        let chain_id = envelope.text_or("ChainId", "");
        let sub_chain_id = envelope.text_or("SubChainId", "");
        let store_id = envelope.text_or("StoreId", "");
        let bikoret_no = envelope.text_or("BikoretNo", "");

        let prices: Vec<Price> = envelope
            .descendants("Line")
            .into_iter()
            .map(|line| Price {
                provider: self.provider.clone(),
                chain_id: chain_id.clone(),
                sub_chain_id: sub_chain_id.clone(),
                store_id: store_id.clone(),
                bikoret_no: bikoret_no.clone(),
                item_code: line.text_or("ItemCode", ""),
                item_name: line.text_or("ItemName", ""),
                manufacturer_name: line.text_or("ManufacturerName", ""),
                manufacture_country: line.text_or("ManufactureCountry", ""),
                manufacturer_item_description: line.text_or("ManufacturerItemDescription", ""),
                unit_qty: line.text_or("UnitQty", ""),
                quantity: line.float_or("Quantity", 0.0),
                unit_of_measure: line.text_or("UnitOfMeasure", ""),
                is_weighted: line.int_or("blsWeighted", 0),
                qty_in_package: line.float_or("QtyInPackage", 0.0),
                item_price: line.float_or("ItemPrice", 0.0),
                unit_of_measure_price: line.float_or("UnitOfMeasurePrice", 0.0),
                allow_discount: line.int_or("AllowDiscount", 0),
                item_status: line.int_or("ItemStatus", 0),
                price_update_date: line.date("PriceUpdateDate", &["%Y-%m-%d"]),
                scraped_at,
                ..Default::default()
            })
            .collect();

        debug!("{}: parsed {} prices from {}", self.provider, prices.len(), path.display());
        Ok(prices)
    }

    fn parse_promotions(&self, path: &Path) -> Result<Vec<Promotion>, IngestionError> {
        let scraped_at = file_timestamp(path);
        let root = xml::parse_file(path)?;

        let Some(envelope) = root.child("Envelope") else {
            return Ok(Vec::new());
        };

        let chain_id = envelope.text_or("ChainId", "");
        let sub_chain_id = envelope.text_or("SubChainId", "");
        let store_id = envelope.text_or("StoreId", "");
        let bikoret_no = envelope.text_or("BikoretNo", "");

        let mut promotions = Vec::new();
        for line in envelope.descendants("Line") {
            // Lines without details describe plain items, not promotions.
            let Some(details) = line.child("PromotionDetails") else {
                continue;
            };

            let club_id = details.text_or("ClubId", "");
            promotions.push(Promotion {
                provider: self.provider.clone(),
                chain_id: chain_id.clone(),
                sub_chain_id: sub_chain_id.clone(),
                store_id: store_id.clone(),
                bikoret_no: bikoret_no.clone(),
                item_code: line.text_or("ItemCode", ""),
                is_gift_item: line.int_or("IsGiftItem", 0),
                reward_type: line.int_or("RewardType", 0),
                allow_multiple_discounts: line.int_or("AllowMultipleDiscounts", 0),
                promotion_id: line.text_or("PromotionId", ""),
                promotion_description: details.text_or("PromotionDescription", ""),
                promotion_start_date: details.date("PromotionStartDate", &["%Y-%m-%d"]),
                promotion_end_date: details.date("PromotionEndDate", &["%Y-%m-%d"]),
                promotion_start_hour: details.text_or("PromotionStartHour", ""),
                promotion_end_hour: details.text_or("PromotionEndHour", ""),
                club_ids: if club_id.is_empty() { Vec::new() } else { vec![club_id] },
                min_qty: details.float_or("MinQty", 0.0),
                max_qty: details.float_or("MaxQty", 0.0),
                discount_rate: details.float_or("DiscountRate", 0.0),
                discount_type: details.int_or("DiscountType", 0),
                min_purchase_amount: details.float_or("MinPurchaseAmnt", 0.0),
                discounted_price: details.float_or("DiscountedPrice", 0.0),
                discounted_price_per_mida: details.float_or("DiscountedPricePerMida", 0.0),
                min_no_of_item_offered: details.int_or("MinNoOfItemOfered", 0),
                display_prioroty: details.int_or("DisplayPriority", 0),
                additional_is_coupon: details.int_or("AdditionalIsCoupon", 0),
                additional_gift_count: details.float_or("AdditionalGiftCount", 0.0),
                additional_is_total: details.int_or("AdditionalIsTotal", 0),
                additional_min_basket_amount: details.float_or("AdditionalMinBasketAmount", 0.0),
                remarks: details.text_or("Remarks", ""),
                price_update_date: line.date("PriceUpdateDate", &["%Y-%m-%d %H:%M:%S"]),
                scraped_at,
                ..Default::default()
            });
        }

        debug!(
            "{}: parsed {} promotions from {}",
            self.provider,
            promotions.len(),
            path.display()
        );
        Ok(promotions)
    }
}
