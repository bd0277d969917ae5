pub mod clickhouse;
pub mod mongodb;
pub mod parsers;
