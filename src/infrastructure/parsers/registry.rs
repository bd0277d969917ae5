use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

use super::{ShufersalParser, SkeletonParser, SuperPharmParser, VictoryParser};
use crate::domain::ports::ProviderParser;

/// Chains with a working field mapping. Kept by hand, not derived from the
/// parser types, so a half-written parser never gets picked up by bulk runs.
const IMPLEMENTED: &[&str] = &["SuperPharm", "Shufersal", "Victory"];

/// Registered chains without a mapping yet, with the extra spellings their
/// dump folders and callers use.
const SKELETONS: &[(&str, &[&str])] = &[
    ("Bareket", &[]),
    ("Bitan", &[]),
    ("CityMarket", &["City_Market"]),
    ("Cofix", &[]),
    ("Doralon", &[]),
    ("GoodPharm", &["Good_Pharm"]),
    ("Hazihinam", &[]),
    ("HetCohen", &["Het_Cohen"]),
    ("Keshet", &[]),
    ("KingStore", &["King_Store"]),
    ("Maayan2000", &[]),
    ("MachsaniAshuk", &["Machsani_Ashuk"]),
    ("Mega", &[]),
    ("MeshnatYosef", &["Meshnat_Yosef"]),
    ("NativHashed", &["Nativ_Hashed"]),
    ("Osherad", &[]),
    ("Polizer", &[]),
    ("Quik", &[]),
    ("RamiLevy", &["Rami_Levy"]),
    ("SalachDabach", &[]),
    ("ShefaBarcartAshem", &["Shefa_Barcart_Ashem"]),
    ("ShukAhir", &["Shuk_Ahir"]),
    ("StopMarket", &["Stop_Market"]),
    ("SuperSapir", &["Super_Sapir"]),
    ("SuperYuda", &["Super_Yuda"]),
    ("Superdosh", &[]),
    ("Tivtaam", &[]),
    ("Wolt", &[]),
    ("Yellow", &[]),
    ("Yohananof", &[]),
    ("Zolvebegadol", &[]),
];

/// Upper-cases and maps spaces and hyphens to underscores:
/// `"Super-Pharm"` → `"SUPER_PHARM"`.
pub fn normalize_provider_name(name: &str) -> String {
    name.trim().to_uppercase().replace([' ', '-'], "_")
}

struct Entry {
    name: String,
    parser: Arc<dyn ProviderParser>,
}

/// Provider name → parser lookup.
#[derive(Default)]
pub struct ParserRegistry {
    entries: Vec<Entry>,
    keys: HashMap<String, usize>,
    implemented: Vec<String>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All 34 chains: three working parsers and the skeletons.
    pub fn with_default_providers() -> Self {
        let mut registry = Self::new();

        registry.register_implemented(Arc::new(SuperPharmParser::new()), &["Super_Pharm"]);
        registry.register_implemented(Arc::new(ShufersalParser::new()), &[]);
        registry.register_implemented(Arc::new(VictoryParser::new()), &[]);

        for (name, aliases) in SKELETONS {
            registry.register(Arc::new(SkeletonParser::new(*name)), aliases);
        }

        debug_assert!(IMPLEMENTED.iter().all(|name| registry.has(name)));
        debug!(
            "Parser registry initialized: {} providers, {} implemented",
            registry.entries.len(),
            registry.implemented.len()
        );
        registry
    }

    /// Registers `parser` under its own name plus `aliases`.
    pub fn register(&mut self, parser: Arc<dyn ProviderParser>, aliases: &[&str]) {
        let name = parser.provider_name().to_string();
        let index = self.entries.len();

        self.keys.insert(normalize_provider_name(&name), index);
        for alias in aliases {
            self.keys.insert(normalize_provider_name(alias), index);
        }
        self.entries.push(Entry { name, parser });
    }

    /// Registers `parser` and adds it to the implemented allow-list.
    pub fn register_implemented(&mut self, parser: Arc<dyn ProviderParser>, aliases: &[&str]) {
        self.implemented.push(parser.provider_name().to_string());
        self.register(parser, aliases);
    }

    fn entry(&self, name: &str) -> Option<&Entry> {
        self.keys
            .get(&normalize_provider_name(name))
            .map(|&index| &self.entries[index])
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ProviderParser>> {
        self.entry(name).map(|entry| Arc::clone(&entry.parser))
    }

    pub fn has(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// Canonical spelling of a registered provider (`"super-pharm"` → `"SuperPharm"`).
    pub fn canonical_name(&self, name: &str) -> Option<&str> {
        self.entry(name).map(|entry| entry.name.as_str())
    }

    pub fn is_implemented(&self, name: &str) -> bool {
        let key = normalize_provider_name(name);
        self.implemented
            .iter()
            .any(|implemented| normalize_provider_name(implemented) == key)
    }

    pub fn list_implemented(&self) -> Vec<String> {
        self.implemented.clone()
    }

    /// Registered providers minus the implemented allow-list, sorted.
    pub fn list_skeletons(&self) -> Vec<String> {
        let implemented: BTreeSet<String> = self
            .implemented
            .iter()
            .map(|name| normalize_provider_name(name))
            .collect();

        let mut skeletons: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| !implemented.contains(&normalize_provider_name(&entry.name)))
            .map(|entry| entry.name.clone())
            .collect();
        skeletons.sort();
        skeletons
    }

    pub fn list_all(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.name.clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_has_34_providers() {
        let registry = ParserRegistry::with_default_providers();
        assert_eq!(registry.list_all().len(), 34);
        assert_eq!(registry.list_implemented(), vec!["SuperPharm", "Shufersal", "Victory"]);
        assert_eq!(registry.list_skeletons().len(), 31);
    }

    #[test]
    fn test_lookup_normalizes_and_resolves_aliases() {
        let registry = ParserRegistry::with_default_providers();

        for spelling in ["SuperPharm", "superpharm", "Super Pharm", "super-pharm", "SUPER_PHARM"] {
            let parser = registry.get(spelling).unwrap();
            assert_eq!(parser.provider_name(), "SuperPharm", "spelling {spelling}");
        }
        assert_eq!(registry.canonical_name("rami-levy"), Some("RamiLevy"));
        assert!(registry.has("King Store"));
        assert!(!registry.has("Carrefour"));
        assert!(registry.get("Carrefour").is_none());
    }

    #[test]
    fn test_skeletons_exclude_implemented() {
        let registry = ParserRegistry::with_default_providers();
        let skeletons = registry.list_skeletons();

        assert!(skeletons.contains(&"Yellow".to_string()));
        assert!(!skeletons.contains(&"Victory".to_string()));
        assert!(registry.is_implemented("victory"));
        assert!(!registry.is_implemented("Yellow"));

        let mut sorted = skeletons.clone();
        sorted.sort();
        assert_eq!(skeletons, sorted);
    }
}
