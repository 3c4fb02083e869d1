//! Reference tables (manufacturers, colors) as plain records.
//!
//! Both tables share one layout: `id,name,slug,aux`. `aux` carries per-kind extra
//! data (a display hex for colors, a website for manufacturers).

use std::path::Path;

use itertools::izip;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::error::Result;

pub const REFERENCE_SCHEMA: [(PlSmallStr, DataType); 4] = [
    (PlSmallStr::from_static("id"), DataType::UInt32),
    (PlSmallStr::from_static("name"), DataType::String),
    (PlSmallStr::from_static("slug"), DataType::String),
    (PlSmallStr::from_static("aux"), DataType::String),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub id: u32,
    pub name: String,
    pub slug: String,
    pub aux: Option<String>,
}

impl ReferenceRecord {
    pub fn new(id: u32, name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            slug: slug.into(),
            aux: None,
        }
    }

    #[must_use]
    pub fn with_aux(mut self, aux: impl Into<String>) -> Self {
        self.aux = Some(aux.into());
        self
    }

    /// Create records from a frame with the [`REFERENCE_SCHEMA`] columns.
    ///
    /// Rows without an id or a name are skipped; a missing slug falls back to the name.
    pub fn from_df(df: &DataFrame) -> Result<Vec<Self>> {
        let cols = df.select(["id", "name", "slug", "aux"])?.take_columns();

        Ok(izip!(
            cols[0].u32()?,
            cols[1].str()?,
            cols[2].str()?,
            cols[3].str()?
        )
        .filter_map(|(id, name, slug, aux)| {
            let (id, name) = (id?, name?);
            Some(Self {
                id,
                name: name.to_string(),
                slug: slug.unwrap_or(name).to_string(),
                aux: aux.map(ToString::to_string),
            })
        })
        .collect())
    }
}

#[instrument(name = "Load reference table", level = "info")]
pub fn load_reference_csv(path: &Path) -> Result<Vec<ReferenceRecord>> {
    let df = crate::read_csv(path, Schema::from_iter(REFERENCE_SCHEMA))?;
    let records = ReferenceRecord::from_df(&df)?;
    info!(path = ?path, records = records.len(), "Loaded reference table");
    Ok(records)
}

pub fn records_to_df(records: &[ReferenceRecord]) -> Result<DataFrame> {
    let ids: Vec<u32> = records.iter().map(|r| r.id).collect();
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    let slugs: Vec<&str> = records.iter().map(|r| r.slug.as_str()).collect();
    let aux: Vec<Option<&str>> = records.iter().map(|r| r.aux.as_deref()).collect();
    Ok(df!(
        "id" => ids,
        "name" => names,
        "slug" => slugs,
        "aux" => aux
    )?)
}

/// The frame color palette shipped with the crate.
#[must_use]
pub fn default_colors() -> Vec<ReferenceRecord> {
    [
        (1, "Black", "black", "#000"),
        (2, "Blue", "blue", "#386ed2"),
        (3, "Brown", "brown", "#734a22"),
        (4, "Green", "green", "#1c9f00"),
        (5, "Orange", "orange", "#ff8d1e"),
        (6, "Pink", "pink", "#ff4cf4"),
        (7, "Purple", "purple", "#c849ff"),
        (8, "Red", "red", "#d60000"),
        (9, "Silver, gray or bare metal", "silver", "#d3d3d3"),
        (10, "Stickers tape or other cover-up", "stickers", ""),
        (11, "Teal", "teal", "#58e2c2"),
        (12, "White", "white", "#fff"),
        (13, "Yellow or Gold", "yellow", "#fff44b"),
    ]
    .into_iter()
    .map(|(id, name, slug, hex)| {
        let record = ReferenceRecord::new(id, name, slug);
        if hex.is_empty() {
            record
        } else {
            record.with_aux(hex)
        }
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_default_colors_have_unique_ids_and_slugs() {
        let colors = default_colors();
        let ids: Vec<_> = colors.iter().map(|c| c.id).collect();
        let slugs: Vec<_> = colors.iter().map(|c| c.slug.as_str()).collect();

        assert_eq!(ids.iter().collect::<std::collections::HashSet<_>>().len(), ids.len());
        assert_eq!(slugs.iter().collect::<std::collections::HashSet<_>>().len(), slugs.len());
    }

    #[test]
    fn test_load_reference_csv() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id,name,slug,aux").unwrap();
        writeln!(file, "14,Salsa,salsa,https://salsacycles.com").unwrap();
        writeln!(file, "2,Surly,,").unwrap();
        writeln!(file, ",Nameless,nameless,").unwrap();
        file.flush().unwrap();

        let records = load_reference_csv(file.path()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0],
            ReferenceRecord::new(14, "Salsa", "salsa").with_aux("https://salsacycles.com")
        );
        assert_eq!(records[1].slug, "Surly");
        assert_eq!(records[1].aux, None);
    }

    #[test]
    fn test_records_frame_round_trip() {
        let colors = default_colors();
        let df = records_to_df(&colors).unwrap();
        assert_eq!(ReferenceRecord::from_df(&df).unwrap(), colors);
    }
}
