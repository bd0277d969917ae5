pub mod error;
pub mod file_name;
pub mod models;
pub mod ports;
