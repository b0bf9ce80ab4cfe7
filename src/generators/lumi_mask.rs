use super::{require_text, Generator};
use crate::config::DatasetCatalog;
use crate::error::Result;
use crate::params::ParameterMap;
use std::sync::Arc;

pub const NAME: &str = "lumi_mask";

/// Adds the certified-luminosity mask for the entry's year
pub struct LumiMaskGenerator {
    catalog: Arc<DatasetCatalog>,
}

impl LumiMaskGenerator {
    pub fn new(catalog: Arc<DatasetCatalog>) -> Self {
        Self { catalog }
    }
}

impl Generator for LumiMaskGenerator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn required_keys(&self) -> &'static [&'static str] {
        &["YEAR"]
    }

    fn provided_keys(&self) -> &'static [&'static str] {
        &["LUMIMASK"]
    }

    fn apply(&self, params: &ParameterMap) -> Result<ParameterMap> {
        let year = require_text(params, NAME, "YEAR")?;
        let lumi_mask = self.catalog.lumi_mask(&year)?;
        tracing::debug!("Lumi mask for {}: {}", year, lumi_mask);
        Ok(ParameterMap::new().with("LUMIMASK", lumi_mask))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{DATASETS, SELECTIONS};
    use super::*;
    use crate::error::CrabError;

    #[test]
    fn test_lumi_mask_lookup() {
        let generator =
            LumiMaskGenerator::new(Arc::new(DatasetCatalog::from_strs(DATASETS, SELECTIONS).unwrap()));

        let additions = generator
            .apply(&ParameterMap::new().with("YEAR", 2023i64))
            .unwrap();
        assert_eq!(
            additions.text("LUMIMASK").as_deref(),
            Some("Cert_Collisions2023_366442_370790_Golden.json")
        );

        let err = generator
            .apply(&ParameterMap::new().with("YEAR", 2018i64))
            .unwrap_err();
        assert!(matches!(err, CrabError::ConfigLookup { .. }));
    }
}
