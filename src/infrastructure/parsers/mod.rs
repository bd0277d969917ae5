//! Per-chain XML parsers and the registry that resolves them by provider name.
//!
//! Every chain publishes its own XML layout. Each parser maps one layout onto
//! the shared [`Store`](crate::domain::models::Store),
//! [`Price`](crate::domain::models::Price) and
//! [`Promotion`](crate::domain::models::Promotion) records. Missing or
//! unconvertible fields fall back to defaults through the extractors in
//! [`xml`]; only unreadable markup fails a file.

pub mod registry;
pub mod shufersal;
pub mod skeleton;
pub mod super_pharm;
pub mod victory;
pub mod xml;

pub use crate::domain::file_name::{detect_file_type, extract_timestamp};
pub(crate) use crate::domain::file_name::file_timestamp;
pub use registry::ParserRegistry;
pub use shufersal::ShufersalParser;
pub use skeleton::SkeletonParser;
pub use super_pharm::SuperPharmParser;
pub use victory::VictoryParser;
