//! Data layer for bikewatch.
//!
//! Loads the asset registry (one row per registered bike) and the reference tables
//! (manufacturers, colors) into polars frames. The search crate composes its
//! predicates against the [`AssetData`] frame produced here.
use once_cell::sync::Lazy;
use polars::prelude::{CsvReadOptions, DataFrame, Schema, SerReader};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::debug;

pub mod assets;
pub mod reference;
pub mod registry;
pub mod test_data;

pub const DATA_DIR_DEFAULT: &str = "./bikewatch_data";
pub const DATA_DIR_ENV: &str = "BIKEWATCH_DATA_DIR";

/// Directory the registry files are read from when no explicit path is given.
///
/// Resolution order: `BIKEWATCH_DATA_DIR`, the platform data directory (with the
/// `system-dirs` feature), then [`DATA_DIR_DEFAULT`].
pub static DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    let dir = std::env::var(DATA_DIR_ENV)
        .map(PathBuf::from)
        .ok()
        .or_else(system_data_dir)
        .unwrap_or_else(|| PathBuf::from(DATA_DIR_DEFAULT));
    debug!(data_dir = ?dir, "Resolved data directory");
    dir
});

pub fn get_data_dir() -> &'static Path {
    DATA_DIR.as_path()
}

/// Read a headered CSV eagerly against a fixed schema.
fn read_csv(path: &Path, schema: Schema) -> Result<DataFrame> {
    Ok(CsvReadOptions::default()
        .with_has_header(true)
        .with_schema(Some(Arc::new(schema)))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?)
}

#[cfg(feature = "system-dirs")]
fn system_data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "bikewatch", "bikewatch")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

#[cfg(not(feature = "system-dirs"))]
fn system_data_dir() -> Option<PathBuf> {
    None
}

mod error {
    use std::path::PathBuf;

    use polars::prelude::PolarsError;
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum DataError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
        #[error("Polars error: {0}")]
        Polars(#[from] PolarsError),
        #[error("Serialization error: {0}")]
        Serde(#[from] serde_json::Error),
        #[error("Column '{column}' is required in {source_name}")]
        MissingColumn {
            column: &'static str,
            source_name: String,
        },
        #[error("Required registry files not found in {0}")]
        RequiredFilesNotFound(PathBuf),
    }

    pub type Result<T> = std::result::Result<T, DataError>;
}

pub use assets::{AssetData, AssetStatus, columns};
pub use error::{DataError, Result};
pub use reference::ReferenceRecord;
pub use registry::{RegistryData, RegistryMetadata};
pub use test_data::{TestDataConfig, create_test_data, create_test_data_dir};


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_dir_is_resolved() {
        assert!(!get_data_dir().as_os_str().is_empty());
    }
}
