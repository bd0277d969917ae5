use std::path::Path;
use tracing::debug;

use super::{file_timestamp, xml};
use crate::domain::{
    error::IngestionError,
    models::{Price, Promotion, Store},
    ports::ProviderParser,
};

pub struct VictoryParser {
    provider: String,
}

impl VictoryParser {
    pub fn new() -> Self {
        Self {
            provider: "Victory".to_string(),
        }
    }
}

impl Default for VictoryParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderParser for VictoryParser {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn parse_stores(&self, path: &Path) -> Result<Vec<Store>, IngestionError> {
        let scraped_at = file_timestamp(path);
        let root = xml::parse_file(path)?;

        // <Store Date="06/12/25" Time="06:00:01"> is the fallback for branches
        // without their own LastUpdateDate.
        let file_updated = match (root.attr("Date"), root.attr("Time")) {
            (Some(date), Some(time)) if !date.is_empty() && !time.is_empty() => {
                xml::parse_date(&format!("{} {}", date, time), &["%d/%m/%y %H:%M:%S"])
            }
            _ => None,
        };

        let stores: Vec<Store> = root
            .descendants("Branch")
            .into_iter()
            .map(|branch| Store {
                provider: self.provider.clone(),
                chain_id: branch.text_or("ChainID", ""),
                chain_name: branch.text_or("ChainName", ""),
                sub_chain_id: branch.text_or("SubChainID", ""),
                sub_chain_name: branch.text_or("SubChainName", ""),
                store_id: branch.text_or("StoreID", ""),
                bikoret_no: branch.text_or("BikoretNo", ""),
                store_type: branch.text_or("StoreType", ""),
                store_name: branch.text_or("StoreName", ""),
                address: branch.text_or("Address", ""),
                city: branch.text_or("City", ""),
                zip_code: branch.text_or("ZIPCode", ""),
                latitude: branch.text_or("Latitude", ""),
                longitude: branch.text_or("Longitude", ""),
                last_updated: branch
                    .date("LastUpdateDate", &["%d/%m/%Y %H:%M:%S"])
                    .or(file_updated),
                scraped_at,
            })
            .collect();

        debug!("{}: parsed {} stores from {}", self.provider, stores.len(), path.display());
        Ok(stores)
    }

    fn parse_prices(&self, path: &Path) -> Result<Vec<Price>, IngestionError> {
        let scraped_at = file_timestamp(path);
        let root = xml::parse_file(path)?;

        let chain_id = root.text_or("ChainID", "");
        let sub_chain_id = root.text_or("SubChainID", "");
        let store_id = root.text_or("StoreID", "");
        let bikoret_no = root.text_or("BikoretNo", "");

        let mut prices = Vec::new();
        for product in root.descendants("Product") {
            let last_update_date = product.text_or("LastUpdateDate", "");
            let last_update_time = product.text_or("LastUpdateTime", "");
            let last_update = if last_update_date.is_empty() || last_update_time.is_empty() {
                None
            } else {
                xml::parse_date(
                    &format!("{} {}", last_update_date, last_update_time),
                    &["%Y/%m/%d %H:%M", "%Y/%m/%d %H:%M:%S"],
                )
            };

            prices.push(Price {
                provider: self.provider.clone(),
                chain_id: chain_id.clone(),
                sub_chain_id: sub_chain_id.clone(),
                store_id: store_id.clone(),
                bikoret_no: bikoret_no.clone(),
                item_code: product.text_or("ItemCode", ""),
                item_type: product.int_or("ItemType", 0),
                item_name: product.text_or("ItemName", ""),
                manufacturer_name: product.text_or("ManufactureName", ""),
                manufacture_country: product.text_or("ManufactureCountry", ""),
                manufacturer_item_description: product.text_or("ManufactureItemDescription", ""),
                unit_qty: product.text_or("UnitQty", ""),
                quantity: product.float_or("Quantity", 0.0),
                unit_of_measure: product.text_or("UnitMeasure", ""),
                is_weighted: product.int_or("BisWeighted", 0),
                qty_in_package: product.float_or("QtyInPackage", 0.0),
                item_price: product.float_or("ItemPrice", 0.0),
                unit_of_measure_price: product.float_or("UnitOfMeasurePrice", 0.0),
                allow_discount: product.int_or("AllowDiscount", 0),
                item_status: product.int_or("itemStatus", 0),
                price_update_date: product.date("PriceUpdateDate", &["%Y/%m/%d %H:%M", "%Y/%m/%d"]),
                last_update_date: last_update,
                scraped_at,
            });
        }

        debug!("{}: parsed {} prices from {}", self.provider, prices.len(), path.display());
        Ok(prices)
    }

    fn parse_promotions(&self, path: &Path) -> Result<Vec<Promotion>, IngestionError> {
        let scraped_at = file_timestamp(path);
        let root = xml::parse_file(path)?;

        let chain_id = root.text_or("ChainID", "");
        let sub_chain_id = root.text_or("SubChainID", "");
        let store_id = root.text_or("StoreID", "");
        let bikoret_no = root.text_or("BikoretNo", "");

        let promotions: Vec<Promotion> = root
            .descendants("Sale")
            .into_iter()
            .map(|sale| {
                let club_id = sale.text_or("ClubID", "");
                Promotion {
                    provider: self.provider.clone(),
                    chain_id: chain_id.clone(),
                    sub_chain_id: sub_chain_id.clone(),
                    store_id: store_id.clone(),
                    bikoret_no: bikoret_no.clone(),
                    item_code: sale.text_or("ItemCode", ""),
                    item_type: sale.int_or("ItemType", 0),
                    is_gift_item: sale.int_or("IsGiftItem", 0),
                    reward_type: sale.int_or("RewardType", 0),
                    allow_multiple_discounts: sale.int_or("AllowMultipleDiscounts", 0),
                    promotion_id: sale.text_or("PromotionID", ""),
                    promotion_description: sale.text_or("PromotionDescription", ""),
                    promotion_start_date: sale.date("PromotionStartDate", &["%Y/%m/%d"]),
                    promotion_start_hour: sale.text_or("PromotionStartHour", ""),
                    promotion_end_date: sale.date("PromotionEndDate", &["%Y/%m/%d"]),
                    promotion_end_hour: sale.text_or("PromotionEndHour", ""),
                    club_ids: if club_id.is_empty() { Vec::new() } else { vec![club_id] },
                    min_qty: sale.float_or("MinQty", 0.0),
                    max_qty: sale.float_or("MaxQty", 0.0),
                    discount_rate: sale.float_or("DiscountRate", 0.0),
                    discount_type: sale.int_or("DiscountType", 0),
                    min_purchase_amount: sale.float_or("MinPurchaseAmount", 0.0),
                    discounted_price: sale.float_or("DiscountedPrice", 0.0),
                    discounted_price_per_mida: sale.float_or("DiscountedPricePerMida", 0.0),
                    min_no_of_item_offered: sale.int_or("MinNoOfItemsOffered", 0),
                    display_prioroty: sale.int_or("DisplayPriority", 0),
                    additional_is_coupon: sale.int_or("AdditionalsCoupon", 0),
                    additional_gift_count: sale.float_or("AdditionalsGiftCount", 0.0),
                    additional_is_total: sale.int_or("AdditionalsTotals", 0),
                    additional_min_basket_amount: sale.float_or("AdditionalsMinBasketAmount", 0.0),
                    additional_restrictions: sale.text_or("AdditionalRestrictions", ""),
                    remarks: sale.text_or("Remarks", ""),
                    price_update_date: sale.date(
                        "PriceUpdateDate",
                        &["%Y/%m/%d %H:%M:%S", "%Y/%m/%d %H:%M", "%Y/%m/%d"],
                    ),
                    scraped_at,
                    ..Default::default()
                }
            })
            .collect();

        debug!(
            "{}: parsed {} promotions from {}",
            self.provider,
            promotions.len(),
            path.display()
        );
        Ok(promotions)
    }
}
