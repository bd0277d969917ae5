pub mod data_repo;

pub use data_repo::ClickHouseImporter;
