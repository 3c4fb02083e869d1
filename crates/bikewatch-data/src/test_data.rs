use std::fs::File;

use polars::prelude::*;
use tempfile::{NamedTempFile, TempDir};
use tracing::info;

use super::{
    assets::AssetStatus,
    error::Result,
    reference::{ReferenceRecord, default_colors, records_to_df},
};

/// Configuration for test data generation
#[derive(Debug, Clone)]
pub struct TestDataConfig {
    /// Number of generated assets appended after the hand-written fixture rows
    pub generated_assets: usize,
}

impl Default for TestDataConfig {
    fn default() -> Self {
        Self::sample()
    }
}

impl TestDataConfig {
    /// Only the hand-written fixture rows
    pub fn minimal() -> Self {
        Self {
            generated_assets: 0,
        }
    }

    /// Fixture rows plus a few hundred generated ones
    pub fn sample() -> Self {
        Self {
            generated_assets: 300,
        }
    }
}

/// Manufacturers referenced by the fixture registry.
#[must_use]
pub fn sample_manufacturers() -> Vec<ReferenceRecord> {
    vec![
        ReferenceRecord::new(1, "Trek", "trek").with_aux("https://www.trekbikes.com"),
        ReferenceRecord::new(2, "Surly", "surly").with_aux("https://surlybikes.com"),
        ReferenceRecord::new(3, "Specialized", "specialized"),
        ReferenceRecord::new(4, "Giant", "giant"),
        ReferenceRecord::new(5, "All City", "all-city"),
        ReferenceRecord::new(14, "Salsa", "salsa"),
    ]
}

type FixtureRow = (
    u64,
    &'static str,
    u32,
    &'static str,
    &'static str,
    Option<u32>,
    Option<u32>,
    Option<u32>,
    AssetStatus,
    Option<(f64, f64)>,
);

/// Hand-written rows. Serial values are already in normalized form.
const FIXTURE_ROWS: [FixtureRow; 8] = [
    (
        1,
        "00111",
        1,
        "FX 2",
        "commuter with rear rack",
        Some(2),
        None,
        None,
        AssetStatus::Stolen,
        Some((37.7749, -122.4194)),
    ),
    (
        2,
        "00112",
        1,
        "Domane",
        "road bike, drop bars",
        Some(1),
        None,
        None,
        AssetStatus::Stolen,
        Some((37.8044, -122.2712)),
    ),
    (
        3,
        "X00111Y",
        2,
        "Long Haul Trucker",
        "touring bike with blue fenders",
        Some(4),
        Some(2),
        None,
        AssetStatus::Stolen,
        Some((40.7128, -74.0060)),
    ),
    (
        4,
        "00111",
        2,
        "Cross-Check",
        "single speed conversion",
        Some(8),
        None,
        None,
        AssetStatus::WithOwner,
        None,
    ),
    (
        5,
        "A8C123",
        3,
        "Sirrus",
        "hybrid with kickstand",
        Some(12),
        Some(1),
        None,
        AssetStatus::Impounded,
        Some((37.7599, -122.4148)),
    ),
    (
        6,
        "A8C124",
        4,
        "Escape",
        "blue bike with front basket",
        Some(2),
        Some(12),
        Some(13),
        AssetStatus::Stolen,
        Some((34.0522, -118.2437)),
    ),
    (
        7,
        "WTU555",
        14,
        "Vaya",
        "gravel bike",
        Some(3),
        None,
        None,
        AssetStatus::WithOwner,
        None,
    ),
    (
        8,
        "5555",
        5,
        "Space Horse",
        "steel frame touring",
        Some(2),
        None,
        None,
        AssetStatus::Stolen,
        Some((45.5152, -122.6784)),
    ),
];

fn manufacturer_name(id: u32) -> Option<String> {
    sample_manufacturers()
        .into_iter()
        .find(|m| m.id == id)
        .map(|m| m.name)
}

/// Build the fixture registry frame.
///
/// Generated rows (ids from 1000) cycle through manufacturers, colors and statuses and
/// use serials of the form `GEN000123`, far enough from the fixture serials that they
/// never show up as near matches for them.
pub fn sample_assets_frame(config: &TestDataConfig) -> Result<DataFrame> {
    let mut ids = Vec::new();
    let mut serials = Vec::new();
    let mut manufacturer_ids = Vec::new();
    let mut manufacturer_names = Vec::new();
    let mut frame_models = Vec::new();
    let mut descriptions = Vec::new();
    let mut primary = Vec::new();
    let mut secondary = Vec::new();
    let mut tertiary = Vec::new();
    let mut statuses = Vec::new();
    let mut latitudes = Vec::new();
    let mut longitudes = Vec::new();

    for (id, serial, mnfg, model, description, p, s, t, status, location) in FIXTURE_ROWS {
        ids.push(id);
        serials.push(serial.to_string());
        manufacturer_ids.push(mnfg);
        manufacturer_names.push(manufacturer_name(mnfg));
        frame_models.push(Some(model.to_string()));
        descriptions.push(Some(description.to_string()));
        primary.push(p);
        secondary.push(s);
        tertiary.push(t);
        statuses.push(status.as_str());
        latitudes.push(location.map(|(lat, _)| lat));
        longitudes.push(location.map(|(_, lon)| lon));
    }

    let manufacturers = sample_manufacturers();
    let statuses_cycle = [
        AssetStatus::Stolen,
        AssetStatus::WithOwner,
        AssetStatus::Impounded,
        AssetStatus::WithOwner,
    ];
    for i in 0..config.generated_assets {
        let manufacturer = &manufacturers[i % manufacturers.len()];
        let status = statuses_cycle[i % statuses_cycle.len()];
        ids.push(1000 + i as u64);
        serials.push(format!("GEN{i:06}"));
        manufacturer_ids.push(manufacturer.id);
        manufacturer_names.push(Some(manufacturer.name.clone()));
        frame_models.push(Some(format!("Model {}", i % 17)));
        descriptions.push(None);
        primary.push(Some((i % 13) as u32 + 1));
        secondary.push(None);
        tertiary.push(None);
        statuses.push(status.as_str());
        let located = status != AssetStatus::WithOwner;
        // Spread across the continental US
        latitudes.push(located.then(|| 30.0 + (i % 17) as f64));
        longitudes.push(located.then(|| -120.0 + (i % 41) as f64));
    }

    Ok(df!(
        "id" => ids,
        "serial_normalized" => serials,
        "manufacturer_id" => manufacturer_ids,
        "manufacturer_name" => manufacturer_names,
        "frame_model" => frame_models,
        "description" => descriptions,
        "primary_frame_color_id" => primary,
        "secondary_frame_color_id" => secondary,
        "tertiary_frame_color_id" => tertiary,
        "status" => statuses,
        "latitude" => latitudes,
        "longitude" => longitudes
    )?)
}

fn write_csv(df: &mut DataFrame, file: &mut File) -> Result<()> {
    CsvWriter::new(file).include_header(true).finish(df)?;
    Ok(())
}

/// Create test data files in temporary files: (assets, manufacturers, colors).
pub fn create_test_data(
    config: &TestDataConfig,
) -> Result<(NamedTempFile, NamedTempFile, NamedTempFile)> {
    info!("Creating test data with config: {:?}", config);

    let assets = NamedTempFile::new()?;
    let manufacturers = NamedTempFile::new()?;
    let colors = NamedTempFile::new()?;

    write_csv(&mut sample_assets_frame(config)?, &mut assets.reopen()?)?;
    write_csv(
        &mut records_to_df(&sample_manufacturers())?,
        &mut manufacturers.reopen()?,
    )?;
    write_csv(&mut records_to_df(&default_colors())?, &mut colors.reopen()?)?;

    Ok((assets, manufacturers, colors))
}

/// Create a temporary data directory laid out the way [`crate::RegistryData::from_dir`] expects.
pub fn create_test_data_dir(config: &TestDataConfig) -> Result<TempDir> {
    let dir = TempDir::new()?;
    write_csv(
        &mut sample_assets_frame(config)?,
        &mut File::create(dir.path().join("assets.csv"))?,
    )?;
    write_csv(
        &mut records_to_df(&sample_manufacturers())?,
        &mut File::create(dir.path().join("manufacturers.csv"))?,
    )?;
    write_csv(
        &mut records_to_df(&default_colors())?,
        &mut File::create(dir.path().join("colors.csv"))?,
    )?;
    info!(dir = ?dir.path(), "Test data directory created");
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_utils::*;

    #[test]
    fn test_minimal_frame_has_fixture_rows() {
        let df = sample_assets_frame(&TestDataConfig::minimal()).unwrap();
        assert_eq!(df.height(), FIXTURE_ROWS.len());
        assert_no_nulls_in_column(&df, "manufacturer_name");
    }

    #[test]
    fn test_sample_frame_generates_rows() {
        let config = TestDataConfig::sample();
        let df = sample_assets_frame(&config).unwrap();
        assert_eq!(df.height(), FIXTURE_ROWS.len() + config.generated_assets);
        assert_no_nulls_in_column(&df, "serial_normalized");
    }
}
