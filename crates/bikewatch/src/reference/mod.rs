//! Resolution of manufacturer and color references to canonical ids.
//!
//! A reference arrives as an integer, a numeric string or free text (a name or a
//! slug). Integers and numeric strings are taken as ids directly; free text is
//! matched case- and punctuation-insensitively against the table. Anything that
//! does not resolve is `None` and callers drop it.

use std::{fmt, marker::PhantomData};

use ahash::AHashMap as HashMap;
use bikewatch_data::{ReferenceRecord, RegistryData};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Which reference table a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceTag {
    Manufacturer,
    Color,
}

impl ReferenceTag {
    /// Prefix used by tagged query tokens (`m_14`, `c_3`).
    #[must_use]
    pub const fn token_prefix(self) -> &'static str {
        match self {
            Self::Manufacturer => "m_",
            Self::Color => "c_",
        }
    }

    /// Category label carried by autocomplete options.
    #[must_use]
    pub const fn category(self) -> &'static str {
        match self {
            Self::Manufacturer => "frame_mnfg",
            Self::Color => "colors",
        }
    }
}

/// Per-kind behaviour of a reference table.
pub trait ReferenceKind: fmt::Debug + Send + Sync + 'static {
    const TAG: ReferenceTag;

    /// Auxiliary data shown next to the option text.
    fn display(record: &ReferenceRecord) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Manufacturer;

impl ReferenceKind for Manufacturer {
    const TAG: ReferenceTag = ReferenceTag::Manufacturer;

    fn display(record: &ReferenceRecord) -> Option<String> {
        Some(record.slug.clone())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Color;

impl ReferenceKind for Color {
    const TAG: ReferenceTag = ReferenceTag::Color;

    fn display(record: &ReferenceRecord) -> Option<String> {
        record.aux.clone()
    }
}

/// A raw reference as it appears in request parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceInput {
    Id(i64),
    Text(String),
}

/// Largest float that still holds every integer below it exactly.
const MAX_EXACT_FLOAT_ID: f64 = 9_007_199_254_740_992.0;

impl ReferenceInput {
    /// Reference from a scalar JSON value. Integral numbers (`3`, `3.0`) are ids,
    /// other numbers and strings are text; anything else is not a reference.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(number) => Some(
                number
                    .as_i64()
                    .or_else(|| {
                        number
                            .as_f64()
                            .filter(|f| {
                                f.fract().abs() < f64::EPSILON && f.abs() < MAX_EXACT_FLOAT_ID
                            })
                            .map(|f| f as i64)
                    })
                    .map_or_else(|| Self::Text(number.to_string()), Self::Id),
            ),
            serde_json::Value::String(text) => Some(Self::Text(text.clone())),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for ReferenceInput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Self::from_json(&value).ok_or_else(|| {
            serde::de::Error::custom(format!("expected an id or a name, got {value}"))
        })
    }
}

impl From<i64> for ReferenceInput {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for ReferenceInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for ReferenceInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Option entry for the search box, rebuilt from interpreted criteria.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutocompleteOption {
    pub id: u32,
    pub text: String,
    pub category: &'static str,
    /// Token that selects this option again (`m_14`, `c_3`).
    pub search_id: String,
    pub display: Option<String>,
}

/// Folds case and drops everything but letters and digits.
fn lookup_key(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_numeric_id(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Immutable lookup table for one reference kind.
#[derive(Clone)]
pub struct ReferenceTable<K: ReferenceKind> {
    records: Vec<ReferenceRecord>,
    by_id: HashMap<u32, usize>,
    by_key: HashMap<String, usize>,
    _kind: PhantomData<K>,
}

impl<K: ReferenceKind> fmt::Debug for ReferenceTable<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceTable")
            .field("tag", &K::TAG)
            .field("records", &self.records.len())
            .finish()
    }
}

impl<K: ReferenceKind> ReferenceTable<K> {
    /// Index `records` by id, name and slug. On key collisions the first record wins.
    pub fn new(records: Vec<ReferenceRecord>) -> Self {
        let mut by_id = HashMap::with_capacity(records.len());
        let mut by_key = HashMap::with_capacity(records.len() * 2);
        for (idx, record) in records.iter().enumerate() {
            by_id.entry(record.id).or_insert(idx);
            for key in [lookup_key(&record.name), lookup_key(&record.slug)] {
                if !key.is_empty() {
                    by_key.entry(key).or_insert(idx);
                }
            }
        }
        debug!(
            tag = ?K::TAG,
            records = records.len(),
            keys = by_key.len(),
            "Reference table built"
        );
        Self {
            records,
            by_id,
            by_key,
            _kind: PhantomData,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn find(&self, id: u32) -> Option<&ReferenceRecord> {
        self.by_id.get(&id).map(|&idx| &self.records[idx])
    }

    /// Resolve a textual reference. Numeric strings are ids and are not checked
    /// against the table; other text must match a name or slug.
    #[must_use]
    pub fn resolve_str(&self, value: &str) -> Option<u32> {
        let trimmed = value.trim();
        if is_numeric_id(trimmed) {
            // Overflowing ids resolve to nothing
            return trimmed.parse().ok();
        }
        let key = lookup_key(value);
        let resolved = self.by_key.get(&key).map(|&idx| self.records[idx].id);
        trace!(tag = ?K::TAG, value, ?resolved, "Resolved textual reference");
        resolved
    }

    #[must_use]
    pub fn resolve(&self, input: &ReferenceInput) -> Option<u32> {
        match input {
            ReferenceInput::Id(id) => u32::try_from(*id).ok(),
            ReferenceInput::Text(text) => self.resolve_str(text),
        }
    }

    /// Resolve each input independently, dropping the ones that do not resolve.
    pub fn resolve_all<'a>(
        &self,
        inputs: impl IntoIterator<Item = &'a ReferenceInput>,
    ) -> Vec<u32> {
        inputs
            .into_iter()
            .filter_map(|input| self.resolve(input))
            .collect()
    }

    /// Like [`Self::resolve`], but only returns records present in the table.
    #[must_use]
    pub fn friendly_find(&self, input: &ReferenceInput) -> Option<&ReferenceRecord> {
        self.resolve(input).and_then(|id| self.find(id))
    }

    #[must_use]
    pub fn autocomplete_option(&self, id: u32) -> Option<AutocompleteOption> {
        self.find(id).map(|record| AutocompleteOption {
            id: record.id,
            text: record.name.clone(),
            category: K::TAG.category(),
            search_id: format!("{}{}", K::TAG.token_prefix(), record.id),
            display: K::display(record),
        })
    }
}

/// Both reference tables, dispatching on [`ReferenceTag`].
#[derive(Debug, Clone)]
pub struct ReferenceTables {
    pub manufacturers: ReferenceTable<Manufacturer>,
    pub colors: ReferenceTable<Color>,
}

impl ReferenceTables {
    pub fn new(manufacturers: Vec<ReferenceRecord>, colors: Vec<ReferenceRecord>) -> Self {
        Self {
            manufacturers: ReferenceTable::new(manufacturers),
            colors: ReferenceTable::new(colors),
        }
    }

    pub fn from_registry(registry: &RegistryData) -> Self {
        Self::new(registry.manufacturers.clone(), registry.colors.clone())
    }

    #[must_use]
    pub fn resolve(&self, tag: ReferenceTag, input: &ReferenceInput) -> Option<u32> {
        match tag {
            ReferenceTag::Manufacturer => self.manufacturers.resolve(input),
            ReferenceTag::Color => self.colors.resolve(input),
        }
    }

    #[must_use]
    pub fn autocomplete_option(&self, tag: ReferenceTag, id: u32) -> Option<AutocompleteOption> {
        match tag {
            ReferenceTag::Manufacturer => self.manufacturers.autocomplete_option(id),
            ReferenceTag::Color => self.colors.autocomplete_option(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use bikewatch_data::{reference::default_colors, test_data::sample_manufacturers};

    use super::*;

    fn tables() -> ReferenceTables {
        ReferenceTables::new(sample_manufacturers(), default_colors())
    }

    #[test]
    fn test_resolve_by_id_and_numeric_string() {
        let tables = tables();
        assert_eq!(tables.manufacturers.resolve(&ReferenceInput::Id(14)), Some(14));
        assert_eq!(tables.manufacturers.resolve(&" 14 ".into()), Some(14));
        // Ids are not checked against the table
        assert_eq!(tables.colors.resolve(&"999".into()), Some(999));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let tables = tables();
        for record in sample_manufacturers() {
            let id = tables
                .manufacturers
                .resolve(&record.name.as_str().into())
                .unwrap();
            assert_eq!(id, record.id);
            assert_eq!(tables.manufacturers.resolve(&i64::from(id).into()), Some(id));
            assert_eq!(tables.manufacturers.resolve(&id.to_string().into()), Some(id));
        }
    }

    #[test]
    fn test_resolve_by_name_and_slug_ignoring_case_and_punctuation() {
        let tables = tables();
        assert_eq!(tables.manufacturers.resolve_str("Surly "), Some(2));
        assert_eq!(tables.manufacturers.resolve_str("ALL-CITY"), Some(5));
        assert_eq!(tables.manufacturers.resolve_str("all city"), Some(5));
        assert_eq!(tables.colors.resolve_str("silver"), Some(9));
        assert_eq!(tables.colors.resolve_str("Silver, Gray or Bare Metal"), Some(9));
    }

    #[test]
    fn test_unresolvable_input_is_none() {
        let tables = tables();
        assert_eq!(tables.manufacturers.resolve_str("Nonexistent Bikes"), None);
        assert_eq!(tables.manufacturers.resolve_str("12abc"), None);
        assert_eq!(tables.manufacturers.resolve_str("   "), None);
        assert_eq!(tables.manufacturers.resolve_str("99999999999"), None);
        assert_eq!(tables.manufacturers.resolve(&ReferenceInput::Id(-3)), None);
    }

    #[test]
    fn test_resolve_all_compacts() {
        let tables = tables();
        let inputs: Vec<ReferenceInput> =
            vec!["blue".into(), "not a color".into(), ReferenceInput::Id(8)];
        assert_eq!(tables.colors.resolve_all(&inputs), vec![2, 8]);
    }

    #[test]
    fn test_dispatch_by_tag() {
        let tables = tables();
        let input: ReferenceInput = "trek".into();
        assert_eq!(tables.resolve(ReferenceTag::Manufacturer, &input), Some(1));
        assert_eq!(tables.resolve(ReferenceTag::Color, &input), None);
    }

    #[test]
    fn test_autocomplete_options() {
        let tables = tables();
        let salsa = tables
            .autocomplete_option(ReferenceTag::Manufacturer, 14)
            .unwrap();
        assert_eq!(salsa.text, "Salsa");
        assert_eq!(salsa.category, "frame_mnfg");
        assert_eq!(salsa.search_id, "m_14");
        assert_eq!(salsa.display.as_deref(), Some("salsa"));

        let blue = tables.autocomplete_option(ReferenceTag::Color, 2).unwrap();
        assert_eq!(blue.category, "colors");
        assert_eq!(blue.search_id, "c_2");
        assert_eq!(blue.display.as_deref(), Some("#386ed2"));

        assert!(tables.autocomplete_option(ReferenceTag::Color, 999).is_none());
    }

    #[test]
    fn test_input_deserializes_from_scalars() {
        let inputs: Vec<ReferenceInput> =
            serde_json::from_str(r#"[3, "blue", 14.0, 2.5, -1]"#).unwrap();
        assert_eq!(
            inputs,
            vec![
                ReferenceInput::Id(3),
                "blue".into(),
                ReferenceInput::Id(14),
                "2.5".into(),
                ReferenceInput::Id(-1)
            ]
        );
        assert!(serde_json::from_str::<ReferenceInput>("[3]").is_err());

        let tables = tables();
        assert_eq!(tables.colors.resolve(&inputs[2]), Some(14));
        assert_eq!(tables.colors.resolve(&inputs[3]), None);
        assert_eq!(tables.colors.resolve(&inputs[4]), None);
    }
}
