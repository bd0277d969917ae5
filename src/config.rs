use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use crate::application::OrchestratorSettings;
use crate::domain::error::IngestionError;

/// Names the YAML file to load before environment overrides.
pub const CONFIG_PATH_VAR: &str = "INGESTION_CONFIG";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    #[default]
    Mongodb,
    Clickhouse,
}

impl FromStr for DatabaseType {
    type Err = IngestionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(Self::Mongodb),
            "clickhouse" => Ok(Self::Clickhouse),
            other => Err(IngestionError::Config(format!(
                "unknown DATABASE_TYPE '{}', expected mongodb or clickhouse",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoSettings {
    pub uri: String,
    pub database: String,
}

impl Default for MongoSettings {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: "supermarket_data".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickHouseSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for ClickHouseSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8123,
            user: "default".to_string(),
            password: String::new(),
            database: "supermarket_data".to_string(),
        }
    }
}

impl ClickHouseSettings {
    /// HTTP endpoint; a host given with a scheme is used as-is.
    pub fn base_url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}:{}", self.host.trim_end_matches('/'), self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    pub dumps_folder: PathBuf,
    pub batch_size: usize,
    pub max_workers: usize,
    pub implemented_only: bool,
    pub fast_mode: bool,
    pub clear_existing: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            dumps_folder: PathBuf::from("./dumps"),
            batch_size: 50,
            max_workers: 4,
            implemented_only: true,
            fast_mode: false,
            clear_existing: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_type: DatabaseType,
    pub mongodb: MongoSettings,
    pub clickhouse: ClickHouseSettings,
    pub import: ImportSettings,
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, IngestionError> {
    value
        .trim()
        .parse()
        .map_err(|_| IngestionError::Config(format!("invalid value for {}: '{}'", key, value)))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, IngestionError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(IngestionError::Config(format!(
            "invalid boolean for {}: '{}'",
            key, value
        ))),
    }
}

impl AppConfig {
    /// YAML file named by `INGESTION_CONFIG` (if set), then environment overrides.
    pub fn load() -> Result<Self, IngestionError> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::from_yaml_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        info!(
            "Configuration loaded: database={:?}, dumps={}",
            config.database_type,
            config.import.dumps_folder.display()
        );
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, IngestionError> {
        debug!("Reading configuration from {}", path.display());
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, IngestionError> {
        serde_yaml::from_str(raw).map_err(|e| IngestionError::Config(e.to_string()))
    }

    /// Overlays every variable `lookup` knows about.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), IngestionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DATABASE_TYPE") {
            self.database_type = v.parse()?;
        }

        if let Some(v) = lookup("MONGODB_URI") {
            self.mongodb.uri = v;
        }
        if let Some(v) = lookup("MONGODB_DATABASE") {
            self.mongodb.database = v;
        }

        if let Some(v) = lookup("CLICKHOUSE_HOST") {
            self.clickhouse.host = v;
        }
        if let Some(v) = lookup("CLICKHOUSE_PORT") {
            self.clickhouse.port = parse_var("CLICKHOUSE_PORT", &v)?;
        }
        if let Some(v) = lookup("CLICKHOUSE_USER") {
            self.clickhouse.user = v;
        }
        if let Some(v) = lookup("CLICKHOUSE_PASSWORD") {
            self.clickhouse.password = v;
        }
        if let Some(v) = lookup("CLICKHOUSE_DATABASE") {
            self.clickhouse.database = v;
        }

        if let Some(v) = lookup("DUMPS_FOLDER") {
            self.import.dumps_folder = PathBuf::from(v);
        }
        if let Some(v) = lookup("IMPORT_BATCH_SIZE") {
            self.import.batch_size = parse_var("IMPORT_BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("IMPORT_MAX_WORKERS") {
            self.import.max_workers = parse_var("IMPORT_MAX_WORKERS", &v)?;
        }
        if let Some(v) = lookup("IMPORT_IMPLEMENTED_ONLY") {
            self.import.implemented_only = parse_flag("IMPORT_IMPLEMENTED_ONLY", &v)?;
        }
        if let Some(v) = lookup("IMPORT_FAST_MODE") {
            self.import.fast_mode = parse_flag("IMPORT_FAST_MODE", &v)?;
        }
        if let Some(v) = lookup("IMPORT_CLEAR_EXISTING") {
            self.import.clear_existing = parse_flag("IMPORT_CLEAR_EXISTING", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), IngestionError> {
        if self.import.batch_size == 0 {
            return Err(IngestionError::Config("batch_size must be at least 1".into()));
        }
        if self.import.max_workers == 0 {
            return Err(IngestionError::Config("max_workers must be at least 1".into()));
        }
        Ok(())
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            dumps_folder: self.import.dumps_folder.clone(),
            batch_size: self.import.batch_size,
            max_workers: self.import.max_workers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.database_type, DatabaseType::Mongodb);
        assert_eq!(config.import.batch_size, 50);
        assert_eq!(config.import.max_workers, 4);
        assert!(config.import.implemented_only);
        assert_eq!(config.clickhouse.base_url(), "http://localhost:8123");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(lookup(&[
                ("DATABASE_TYPE", "ClickHouse"),
                ("CLICKHOUSE_HOST", "clickhouse"),
                ("CLICKHOUSE_PORT", "18123"),
                ("IMPORT_BATCH_SIZE", "10"),
                ("IMPORT_FAST_MODE", "yes"),
                ("DUMPS_FOLDER", "/data/dumps"),
            ]))
            .unwrap();

        assert_eq!(config.database_type, DatabaseType::Clickhouse);
        assert_eq!(config.clickhouse.base_url(), "http://clickhouse:18123");
        assert_eq!(config.import.batch_size, 10);
        assert!(config.import.fast_mode);
        assert_eq!(config.import.dumps_folder, PathBuf::from("/data/dumps"));
        assert_eq!(config.orchestrator_settings().batch_size, 10);
    }

    #[test]
    fn test_bad_values_are_config_errors() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(lookup(&[("IMPORT_MAX_WORKERS", "many")]))
            .unwrap_err();
        assert!(matches!(err, IngestionError::Config(_)));

        let err = config
            .apply_overrides(lookup(&[("DATABASE_TYPE", "postgres")]))
            .unwrap_err();
        assert!(matches!(err, IngestionError::Config(_)));

        config.import.batch_size = 0;
        assert!(matches!(config.validate(), Err(IngestionError::Config(_))));
    }

    #[test]
    fn test_yaml_fills_missing_sections_with_defaults() {
        let config = AppConfig::from_yaml_str(
            "database_type: clickhouse\nimport:\n  batch_size: 25\n  implemented_only: false\n",
        )
        .unwrap();

        assert_eq!(config.database_type, DatabaseType::Clickhouse);
        assert_eq!(config.import.batch_size, 25);
        assert_eq!(config.import.max_workers, 4);
        assert!(!config.import.implemented_only);
        assert_eq!(config.mongodb, MongoSettings::default());
    }
}
