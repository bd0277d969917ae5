#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use supermarket_ingestion::domain::{
    error::IngestionError,
    models::{FileKind, ImportStats, Price, Promotion, Store},
    ports::ImporterBackend,
};

type Key2 = (String, String);
type Key3 = (String, String, String);

/// In-memory backend with document-store semantics: one entry per natural key,
/// last write wins. Every call is appended to a log.
#[derive(Default)]
pub struct MemoryBackend {
    stores: Mutex<HashMap<Key2, Store>>,
    prices: Mutex<HashMap<Key3, Price>>,
    promotions: Mutex<HashMap<Key3, Promotion>>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<Option<FileKind>>,
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// `drop_indexes` signals `entered` and then waits for `release`.
    pub fn gated(entered: Arc<Notify>, release: Arc<Notify>) -> Self {
        Self {
            gate: Some((entered, release)),
            ..Self::default()
        }
    }

    pub fn fail_on(&self, kind: FileKind) {
        *self.failing.lock().unwrap() = Some(kind);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Record counts of every bulk write of `kind`, in call order.
    pub fn write_sizes(&self, kind: FileKind) -> Vec<usize> {
        let prefix = format!("{}:", kind);
        self.calls()
            .iter()
            .filter_map(|call| call.strip_prefix(&prefix))
            .filter_map(|n| n.parse().ok())
            .collect()
    }

    pub fn store_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .stores
            .lock()
            .unwrap()
            .keys()
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, kind: FileKind, len: usize) -> Result<(), IngestionError> {
        if *self.failing.lock().unwrap() == Some(kind) {
            self.log(format!("{}:failed", kind));
            return Err(IngestionError::BackendWrite(format!("{} collection offline", kind)));
        }
        self.log(format!("{}:{}", kind, len));
        Ok(())
    }
}

#[async_trait]
impl ImporterBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn import_stores(&self, stores: &[Store]) -> Result<u64, IngestionError> {
        self.check(FileKind::Stores, stores.len())?;
        let mut map = self.stores.lock().unwrap();
        for store in stores {
            map.insert((store.provider.clone(), store.store_id.clone()), store.clone());
        }
        Ok(stores.len() as u64)
    }

    async fn import_prices(&self, prices: &[Price]) -> Result<u64, IngestionError> {
        self.check(FileKind::Prices, prices.len())?;
        let mut map = self.prices.lock().unwrap();
        for price in prices {
            let (p, s, i) = price.natural_key();
            map.insert((p.into(), s.into(), i.into()), price.clone());
        }
        Ok(prices.len() as u64)
    }

    async fn import_promotions(&self, promotions: &[Promotion]) -> Result<u64, IngestionError> {
        self.check(FileKind::Promotions, promotions.len())?;
        let mut map = self.promotions.lock().unwrap();
        for promo in promotions {
            let (p, s, id) = promo.natural_key();
            map.insert((p.into(), s.into(), id.into()), promo.clone());
        }
        Ok(promotions.len() as u64)
    }

    async fn get_stats(&self) -> Result<ImportStats, IngestionError> {
        Ok(ImportStats {
            stores: self.stores.lock().unwrap().len() as u64,
            prices: self.prices.lock().unwrap().len() as u64,
            promotions: self.promotions.lock().unwrap().len() as u64,
        })
    }

    async fn clear_provider_data(&self, provider: &str) -> Result<(), IngestionError> {
        self.log(format!("clear:{}", provider));
        self.stores.lock().unwrap().retain(|(p, _), _| p != provider);
        self.prices.lock().unwrap().retain(|(p, _, _), _| p != provider);
        self.promotions.lock().unwrap().retain(|(p, _, _), _| p != provider);
        Ok(())
    }

    async fn create_indexes(&self) -> Result<(), IngestionError> {
        self.log("create_indexes".into());
        Ok(())
    }

    async fn drop_indexes(&self) -> Result<(), IngestionError> {
        self.log("drop_indexes".into());
        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), IngestionError> {
        self.log("close".into());
        Ok(())
    }
}

pub fn write_file(dir: &Path, name: &str, body: &str) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

/// SuperPharm price file for `store` with one line per item code.
pub fn super_pharm_prices(store: u32, items: &[&str]) -> String {
    let lines: String = items
        .iter()
        .map(|code| format!("<Line><ItemCode>{}</ItemCode><ItemPrice>9.90</ItemPrice></Line>", code))
        .collect();
    format!(
        "<OrderXml><Envelope><ChainId>7290172900007</ChainId><StoreId>{}</StoreId>\
         <Header><Details>{}</Details></Header></Envelope></OrderXml>",
        store, lines
    )
}

pub fn super_pharm_stores(ids: &[&str]) -> String {
    let stores: String = ids
        .iter()
        .map(|id| format!("<Store><StoreID>{}</StoreID><StoreName>Branch {}</StoreName></Store>", id, id))
        .collect();
    format!(
        "<OrderXml><ChainId>7290172900007</ChainId><ChainName>Super-Pharm</ChainName>\
         <SubChains><SubChain><SubChainID>1</SubChainID><Stores>{}</Stores></SubChain></SubChains></OrderXml>",
        stores
    )
}

pub fn super_pharm_promotions(store: u32, ids: &[&str]) -> String {
    let lines: String = ids
        .iter()
        .map(|id| {
            format!(
                "<Line><ItemCode>1</ItemCode><PromotionId>{}</PromotionId>\
                 <PromotionDetails><PromotionDescription>deal</PromotionDescription></PromotionDetails></Line>",
                id
            )
        })
        .collect();
    format!(
        "<OrderXml><Envelope><StoreId>{}</StoreId><Header><Details>{}</Details></Header></Envelope></OrderXml>",
        store, lines
    )
}

/// Price file names that sort in store order.
pub fn price_file_name(store: u32) -> String {
    format!("Price7290172900007-{:03}-202512061339.xml", store)
}
