//! The asset registry frame: one row per registered bike.
//!
//! Every loader funnels through [`AssetData::from_lazy`], which checks the required
//! columns, fills absent optional columns with typed nulls and casts everything to
//! [`ASSET_SCHEMA`] so downstream predicates can rely on fixed dtypes.

use std::{fs::File, path::Path};

use polars::prelude::*;
use tracing::{debug, info, instrument};

use super::error::{DataError, Result};

/// Column names of the asset frame.
pub mod columns {
    pub const ID: &str = "id";
    pub const SERIAL_NORMALIZED: &str = "serial_normalized";
    pub const MANUFACTURER_ID: &str = "manufacturer_id";
    pub const MANUFACTURER_NAME: &str = "manufacturer_name";
    pub const FRAME_MODEL: &str = "frame_model";
    pub const DESCRIPTION: &str = "description";
    pub const PRIMARY_COLOR_ID: &str = "primary_frame_color_id";
    pub const SECONDARY_COLOR_ID: &str = "secondary_frame_color_id";
    pub const TERTIARY_COLOR_ID: &str = "tertiary_frame_color_id";
    pub const STATUS: &str = "status";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";

    pub const COLOR_SLOTS: [&str; 3] = [PRIMARY_COLOR_ID, SECONDARY_COLOR_ID, TERTIARY_COLOR_ID];
    /// Columns fed to the full-text index.
    pub const TEXT_COLUMNS: [&str; 3] = [MANUFACTURER_NAME, FRAME_MODEL, DESCRIPTION];
}

/// Canonical column order and dtypes. CSV files must follow this order.
pub const ASSET_SCHEMA: [(PlSmallStr, DataType); 12] = [
    (PlSmallStr::from_static(columns::ID), DataType::UInt64),
    (
        PlSmallStr::from_static(columns::SERIAL_NORMALIZED),
        DataType::String,
    ),
    (
        PlSmallStr::from_static(columns::MANUFACTURER_ID),
        DataType::UInt32,
    ),
    (
        PlSmallStr::from_static(columns::MANUFACTURER_NAME),
        DataType::String,
    ),
    (PlSmallStr::from_static(columns::FRAME_MODEL), DataType::String),
    (PlSmallStr::from_static(columns::DESCRIPTION), DataType::String),
    (
        PlSmallStr::from_static(columns::PRIMARY_COLOR_ID),
        DataType::UInt32,
    ),
    (
        PlSmallStr::from_static(columns::SECONDARY_COLOR_ID),
        DataType::UInt32,
    ),
    (
        PlSmallStr::from_static(columns::TERTIARY_COLOR_ID),
        DataType::UInt32,
    ),
    (PlSmallStr::from_static(columns::STATUS), DataType::String),
    (PlSmallStr::from_static(columns::LATITUDE), DataType::Float64),
    (PlSmallStr::from_static(columns::LONGITUDE), DataType::Float64),
];

const REQUIRED_COLUMNS: [&str; 4] = [
    columns::ID,
    columns::SERIAL_NORMALIZED,
    columns::MANUFACTURER_ID,
    columns::STATUS,
];

/// Theft-status category stored in the `status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetStatus {
    /// The owner still has the bike.
    WithOwner,
    Stolen,
    /// Recovered and held by an organization (police, parking enforcement, ...).
    Impounded,
}

impl AssetStatus {
    pub const STOLEN_OR_IMPOUNDED: [Self; 2] = [Self::Stolen, Self::Impounded];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WithOwner => "status_with_owner",
            Self::Stolen => "status_stolen",
            Self::Impounded => "status_impounded",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "status_with_owner" => Some(Self::WithOwner),
            "status_stolen" => Some(Self::Stolen),
            "status_impounded" => Some(Self::Impounded),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The asset registry, materialized once at load time.
///
/// Searches build lazy plans over the in-memory frame via [`AssetData::lazy`]. File
/// scans are never left lazy, since collecting them goes through polars' own async
/// runtime and panics when nested in a tokio runtime.
#[derive(Clone)]
pub struct AssetData {
    frame: DataFrame,
    source_name: String,
}

impl std::fmt::Debug for AssetData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetData")
            .field("source_name", &self.source_name)
            .field("rows", &self.frame.height())
            .finish_non_exhaustive()
    }
}

impl AssetData {
    #[instrument(name = "Load assets from Parquet", level = "info")]
    pub fn from_parquet(path: &Path) -> Result<Self> {
        info!(path = ?path, "Reading asset parquet file");
        let df = ParquetReader::new(File::open(path)?).finish()?;
        Self::from_lazy(df.lazy(), path.display().to_string())
    }

    /// Read a headered CSV whose columns follow [`ASSET_SCHEMA`] order.
    #[instrument(name = "Load assets from CSV", level = "info")]
    pub fn from_csv(path: &Path) -> Result<Self> {
        info!(path = ?path, "Reading asset CSV file");
        let df = crate::read_csv(path, Schema::from_iter(ASSET_SCHEMA))?;
        Self::from_lazy(df.lazy(), path.display().to_string())
    }

    pub fn from_frame(df: DataFrame) -> Result<Self> {
        Self::from_lazy(df.lazy(), "in-memory frame".to_string())
    }

    /// Validate and normalize `lf`, then collect it.
    ///
    /// `lf` should be backed by in-memory data; see the type-level docs.
    pub fn from_lazy(mut lf: LazyFrame, source_name: String) -> Result<Self> {
        let schema = lf.collect_schema()?;
        if let Some(missing) = REQUIRED_COLUMNS
            .into_iter()
            .find(|column| !schema.contains(column))
        {
            return Err(DataError::MissingColumn {
                column: missing,
                source_name,
            });
        }

        let projection = ASSET_SCHEMA
            .iter()
            .map(|(name, dtype)| {
                if schema.contains(name.as_str()) {
                    col(name.clone()).cast(dtype.clone())
                } else {
                    debug!(column = %name, "Optional asset column absent, filling with nulls");
                    lit(NULL).cast(dtype.clone()).alias(name.clone())
                }
            })
            .collect::<Vec<_>>();

        let frame = lf.select(projection).collect()?;
        debug!(rows = frame.height(), source = %source_name, "Asset frame materialized");
        Ok(Self { frame, source_name })
    }

    /// A fresh lazy plan over the registry; cheap to clone.
    #[must_use]
    pub fn lazy(&self) -> LazyFrame {
        self.frame.clone().lazy()
    }

    #[must_use]
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    #[must_use]
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frame.height()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[instrument(name = "Write assets to Parquet", skip(self), level = "info")]
    pub fn write_parquet(&self, path: &Path) -> Result<()> {
        let mut df = self.frame.clone();
        let file = File::create(path)?;
        ParquetWriter::new(file).finish(&mut df)?;
        info!(rows = df.height(), path = ?path, "Asset registry written");
        Ok(())
    }
}
