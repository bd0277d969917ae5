use std::path::Path;
use tracing::debug;

use super::{file_timestamp, xml};
use crate::domain::{
    error::IngestionError,
    models::{Price, Promotion, PromotionItem, Store},
    ports::ProviderParser,
};

/// Shufersal publishes stores as an SAP `asx:abap` export and prices and
/// promotions in the common `Items`/`Promotions` layout.
pub struct ShufersalParser {
    provider: String,
}

impl ShufersalParser {
    pub fn new() -> Self {
        Self {
            provider: "Shufersal".to_string(),
        }
    }
}

impl Default for ShufersalParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderParser for ShufersalParser {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn parse_stores(&self, path: &Path) -> Result<Vec<Store>, IngestionError> {
        let scraped_at = file_timestamp(path);
        let root = xml::parse_file(path)?;

        let chain_id = root.text_or(".//values/CHAINID", "");
        let Some(container) = root.find(".//values/STORES") else {
            debug!("{}: no STORES block in {}", self.provider, path.display());
            return Ok(Vec::new());
        };

        let stores: Vec<Store> = container
            .children("STORE")
            .map(|store| Store {
                provider: self.provider.clone(),
                chain_id: chain_id.clone(),
                chain_name: store.text_or("CHAINNAME", ""),
                sub_chain_id: store.text_or("SUBCHAINID", ""),
                sub_chain_name: store.text_or("SUBCHAINNAME", ""),
                store_id: store.text_or("STOREID", ""),
                bikoret_no: store.text_or("BIKORETNO", ""),
                store_type: store.text_or("STORETYPE", ""),
                store_name: store.text_or("STORENAME", ""),
                address: store.text_or("ADDRESS", ""),
                city: store.text_or("CITY", ""),
                zip_code: store.text_or("ZIPCODE", ""),
                scraped_at,
                ..Default::default()
            })
            .collect();

        debug!("{}: parsed {} stores from {}", self.provider, stores.len(), path.display());
        Ok(stores)
    }

    fn parse_prices(&self, path: &Path) -> Result<Vec<Price>, IngestionError> {
        let scraped_at = file_timestamp(path);
        let root = xml::parse_file(path)?;

        let chain_id = root.text_or("ChainId", "");
        let sub_chain_id = root.text_or("SubChainId", "");
        let store_id = root.text_or("StoreId", "");
        let bikoret_no = root.text_or("BikoretNo", "");

        let prices: Vec<Price> = root
            .descendants("Item")
            .into_iter()
            .map(|item| Price {
                provider: self.provider.clone(),
                chain_id: chain_id.clone(),
                sub_chain_id: sub_chain_id.clone(),
                store_id: store_id.clone(),
                bikoret_no: bikoret_no.clone(),
                item_code: item.text_or("ItemCode", ""),
                item_type: item.int_or("ItemType", 0),
                item_name: item.text_or("ItemName", ""),
                manufacturer_name: item.text_or("ManufacturerName", ""),
                manufacture_country: item.text_or("ManufactureCountry", ""),
                manufacturer_item_description: item.text_or("ManufacturerItemDescription", ""),
                unit_qty: item.text_or("UnitQty", ""),
                quantity: item.float_or("Quantity", 0.0),
                is_weighted: item.int_or("bIsWeighted", 0),
                unit_of_measure: item.text_or("UnitOfMeasure", ""),
                qty_in_package: item.float_or("QtyInPackage", 0.0),
                item_price: item.float_or("ItemPrice", 0.0),
                unit_of_measure_price: item.float_or("UnitOfMeasurePrice", 0.0),
                allow_discount: item.int_or("AllowDiscount", 0),
                item_status: item.int_or("ItemStatus", 0),
                price_update_date: item.date("PriceUpdateDate", &["%Y-%m-%d %H:%M"]),
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

        let chain_id = root.text_or("ChainId", "");
        let sub_chain_id = root.text_or("SubChainId", "");
        let store_id = root.text_or("StoreId", "");
        let bikoret_no = root.text_or("BikoretNo", "");

        let mut promotions = Vec::new();
        for promo in root.descendants("Promotion") {
            let promotion_items: Vec<PromotionItem> = promo
                .child("PromotionItems")
                .map(|items| {
                    items
                        .children("Item")
                        .map(|item| PromotionItem {
                            item_code: item.text_or("ItemCode", ""),
                            item_type: item.int_or("ItemType", 0),
                            is_gift_item: item.int_or("IsGiftItem", 0),
                        })
                        .collect()
                })
                .unwrap_or_default();

            let mut record = Promotion {
                provider: self.provider.clone(),
                chain_id: chain_id.clone(),
                sub_chain_id: sub_chain_id.clone(),
                store_id: store_id.clone(),
                bikoret_no: bikoret_no.clone(),
                promotion_id: promo.text_or("PromotionId", ""),
                allow_multiple_discounts: promo.int_or("AllowMultipleDiscounts", 0),
                promotion_description: promo.text_or("PromotionDescription", ""),
                promotion_update_date: promo.date("PromotionUpdateDate", &["%Y-%m-%d %H:%M"]),
                promotion_start_date: promo.date("PromotionStartDate", &["%Y-%m-%d"]),
                promotion_start_hour: promo.text_or("PromotionStartHour", ""),
                promotion_end_date: promo.date("PromotionEndDate", &["%Y-%m-%d"]),
                promotion_end_hour: promo.text_or("PromotionEndHour", ""),
                is_weighted_promo: promo.int_or("IsWeightedPromo", 0),
                min_qty: promo.float_or("MinQty", 0.0),
                reward_type: promo.int_or("RewardType", 0),
                discounted_price: promo.float_or("DiscountedPrice", 0.0),
                min_no_of_item_offered: promo.int_or("MinNoOfItemOfered", 0),
                display_prioroty: promo.int_or("DisplayPriority", 0),
                promotion_items,
                club_ids: promo
                    .child("Clubs")
                    .map(|clubs| {
                        clubs
                            .children("ClubId")
                            .filter(|c| !c.text().is_empty())
                            .map(|c| c.text().to_string())
                            .collect()
                    })
                    .unwrap_or_default(),
                scraped_at,
                ..Default::default()
            };

            if let Some(restrictions) = promo.child("AdditionalRestrictions") {
                record.additional_is_coupon = restrictions.int_or("AdditionalIsCoupon", 0);
                record.additional_gift_count =
                    restrictions.int_or("AdditionalGiftCount", 0) as f64;
                record.additional_is_total = restrictions.int_or("AdditionalIsTotal", 0);
                record.additional_is_active = restrictions.int_or("AdditionalIsActive", 0);
            }

            promotions.push(record);
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const STORES: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<asx:abap xmlns:asx="http://www.sap.com/abapxml" version="1.0">
  <asx:values>
    <CHAINID>7290027600007</CHAINID>
    <STORES>
      <STORE><STOREID>1</STOREID><STORENAME>Shufersal Deal</STORENAME><CITY>Jerusalem</CITY></STORE>
      <STORE><STOREID>2</STOREID><ZIPCODE>1234</ZIPCODE></STORE>
    </STORES>
  </asx:values>
</asx:abap>"#;

    const PROMOS: &str = r#"<root>
  <ChainId>7290027600007</ChainId>
  <StoreId>001</StoreId>
  <Promotions Count="1">
    <Promotion>
      <PromotionId>55</PromotionId>
      <PromotionDescription>Cheese deal</PromotionDescription>
      <PromotionUpdateDate>2025-12-06 00:55</PromotionUpdateDate>
      <PromotionStartDate>2025-12-01</PromotionStartDate>
      <PromotionEndDate>not-a-date</PromotionEndDate>
      <PromotionItems Count="2">
        <Item><ItemCode>1</ItemCode><IsGiftItem>0</IsGiftItem></Item>
        <Item><ItemCode>2</ItemCode><IsGiftItem>1</IsGiftItem></Item>
      </PromotionItems>
      <AdditionalRestrictions><AdditionalIsCoupon>1</AdditionalIsCoupon></AdditionalRestrictions>
      <Clubs><ClubId>0</ClubId><ClubId></ClubId><ClubId>3</ClubId></Clubs>
    </Promotion>
  </Promotions>
</root>"#;

    #[test]
    fn test_parse_sap_stores() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Stores7290027600007-000-202512060201.xml");
        std::fs::write(&path, STORES).unwrap();

        let stores = ShufersalParser::new().parse_stores(&path).unwrap();
        assert_eq!(stores.len(), 2);
        assert!(stores.iter().all(|s| s.chain_id == "7290027600007"));
        assert_eq!(stores[0].city, "Jerusalem");
        assert_eq!(stores[1].zip_code, "1234");
        assert_eq!(stores[1].store_name, "");
    }

    #[test]
    fn test_parse_promotions_nested_blocks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("PromoFull7290027600007-001-202512060201.xml");
        std::fs::write(&path, PROMOS).unwrap();

        let promos = ShufersalParser::new().parse_promotions(&path).unwrap();
        assert_eq!(promos.len(), 1);

        let promo = &promos[0];
        assert_eq!(promo.natural_key(), ("Shufersal", "001", "55"));
        assert_eq!(promo.promotion_items.len(), 2);
        assert_eq!(promo.promotion_items[1].is_gift_item, 1);
        assert_eq!(promo.additional_is_coupon, 1);
        assert_eq!(promo.club_ids, vec!["0".to_string(), "3".to_string()]);
        assert!(promo.promotion_start_date.is_some());
        assert!(promo.promotion_end_date.is_none());
    }

    #[test]
    fn test_parse_prices() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("PriceFull7290027600007-001-202512060201.xml");
        std::fs::write(
            &path,
            "<root><StoreId>001</StoreId><Items><Item><ItemCode>7290000000001</ItemCode>\
             <ItemPrice>5.90</ItemPrice><bIsWeighted>1</bIsWeighted></Item></Items></root>",
        )
        .unwrap();

        let prices = ShufersalParser::new().parse_prices(&path).unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0].item_price, 5.90);
        assert_eq!(prices[0].is_weighted, 1);
        assert_eq!(prices[0].quantity, 0.0);
    }
}
