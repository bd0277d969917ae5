use std::path::Path;

use crate::domain::{
    error::IngestionError,
    models::{Price, Promotion, Store},
    ports::ProviderParser,
};

/// Registered chain whose XML layout has no field mapping yet.
///
/// File-type detection still works, so listings and dry runs behave normally;
/// every parse call fails with [`IngestionError::UnsupportedOperation`].
pub struct SkeletonParser {
    provider: String,
}

impl SkeletonParser {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
        }
    }

    fn not_implemented(&self, what: &str) -> IngestionError {
        IngestionError::unsupported(
            &self.provider,
            format!("{} parsing not yet implemented", what),
        )
    }
}

impl ProviderParser for SkeletonParser {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn parse_stores(&self, _path: &Path) -> Result<Vec<Store>, IngestionError> {
        Err(self.not_implemented("store"))
    }

    fn parse_prices(&self, _path: &Path) -> Result<Vec<Price>, IngestionError> {
        Err(self.not_implemented("price"))
    }

    fn parse_promotions(&self, _path: &Path) -> Result<Vec<Promotion>, IngestionError> {
        Err(self.not_implemented("promotion"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::FileKind;

    #[test]
    fn test_skeleton_fails_every_parse_with_provider_name() {
        let parser = SkeletonParser::new("Yellow");
        let path = Path::new("/does/not/matter.xml");

        for kind in [FileKind::Stores, FileKind::Prices, FileKind::Promotions] {
            let err = parser.parse_kind(kind, path).unwrap().unwrap_err();
            match err {
                IngestionError::UnsupportedOperation { provider, .. } => {
                    assert_eq!(provider, "Yellow")
                }
                other => panic!("expected UnsupportedOperation, got {:?}", other),
            }
        }
        assert!(parser.parse_kind(FileKind::Unknown, path).is_none());
    }
}
