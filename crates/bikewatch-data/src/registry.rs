use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::{
    assets::AssetData,
    error::{DataError, Result},
    reference::{ReferenceRecord, default_colors, load_reference_csv},
};

const ASSETS_PARQUET: &str = "assets.parquet";
const ASSETS_CSV: &str = "assets.csv";
const MANUFACTURERS_CSV: &str = "manufacturers.csv";
const COLORS_CSV: &str = "colors.csv";

/// Everything the search core needs: the asset registry and both reference tables.
#[derive(Debug, Clone)]
pub struct RegistryData {
    pub assets: AssetData,
    pub manufacturers: Vec<ReferenceRecord>,
    pub colors: Vec<ReferenceRecord>,
    pub metadata: RegistryMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistryMetadata {
    pub source: String,
    pub loaded_at: DateTime<Utc>,
    pub manufacturer_count: usize,
    pub color_count: usize,
}

impl RegistryData {
    pub fn new(
        assets: AssetData,
        manufacturers: Vec<ReferenceRecord>,
        colors: Vec<ReferenceRecord>,
    ) -> Self {
        let metadata = RegistryMetadata {
            source: assets.source_name().to_string(),
            loaded_at: Utc::now(),
            manufacturer_count: manufacturers.len(),
            color_count: colors.len(),
        };
        Self {
            assets,
            manufacturers,
            colors,
            metadata,
        }
    }

    /// Load from the resolved data directory (see [`crate::DATA_DIR`]).
    pub fn from_default_dir() -> Result<Self> {
        Self::from_dir(crate::get_data_dir())
    }

    /// Load `assets.parquet` (or `assets.csv`), `manufacturers.csv` and, when present,
    /// `colors.csv` from `dir`. Without `colors.csv` the built-in palette is used.
    #[instrument(name = "Load registry", level = "info")]
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let parquet_path = dir.join(ASSETS_PARQUET);
        let csv_path = dir.join(ASSETS_CSV);
        let manufacturers_path = dir.join(MANUFACTURERS_CSV);

        let assets = if parquet_path.exists() {
            AssetData::from_parquet(&parquet_path)?
        } else if csv_path.exists() {
            AssetData::from_csv(&csv_path)?
        } else {
            return Err(DataError::RequiredFilesNotFound(dir.to_path_buf()));
        };

        if !manufacturers_path.exists() {
            return Err(DataError::RequiredFilesNotFound(dir.to_path_buf()));
        }
        let manufacturers = load_reference_csv(&manufacturers_path)?;

        let colors_path = dir.join(COLORS_CSV);
        let colors = if colors_path.exists() {
            load_reference_csv(&colors_path)?
        } else {
            warn!(dir = ?dir, "No colors.csv found, using the built-in palette");
            default_colors()
        };

        let registry = Self::new(assets, manufacturers, colors);
        info!(metadata = ?registry.metadata, "Registry loaded");
        Ok(registry)
    }

    pub fn metadata_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.metadata)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    use crate::{
        AssetStatus, columns,
        test_data::{TestDataConfig, create_test_data_dir},
    };

    #[test]
    fn test_load_from_dir() {
        let dir = create_test_data_dir(&TestDataConfig::minimal()).unwrap();
        let registry = RegistryData::from_dir(dir.path()).unwrap();

        assert_eq!(registry.assets.len(), 8);
        assert!(!registry.manufacturers.is_empty());
        assert_eq!(registry.colors, default_colors());
        assert!(registry.metadata_json().unwrap().contains("manufacturer_count"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_load_from_dir_inside_runtime() {
        let dir = create_test_data_dir(&TestDataConfig::minimal()).unwrap();
        let registry = RegistryData::from_dir(dir.path()).unwrap();
        registry.assets.write_parquet(&dir.path().join("assets.parquet")).unwrap();

        let reloaded = RegistryData::from_dir(dir.path()).unwrap();
        assert!(reloaded.metadata.source.ends_with("assets.parquet"));
        assert_eq!(reloaded.assets.len(), registry.assets.len());
        assert_eq!(reloaded.manufacturers, registry.manufacturers);

        let stolen = reloaded
            .assets
            .lazy()
            .filter(col(columns::STATUS).eq(lit(AssetStatus::Stolen.as_str())))
            .collect()
            .unwrap();
        assert_eq!(stolen.height(), 5);
    }

    #[test]
    fn test_missing_files_are_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = RegistryData::from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, DataError::RequiredFilesNotFound(_)));
    }
}
