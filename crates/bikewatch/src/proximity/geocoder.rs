//! The geocoding collaborator and an in-memory implementation of it.

use std::future::Future;

use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::{BoundingBox, Coordinates, error::Result};

static NON_NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\D+$").expect("valid regex"));

/// One candidate returned by a geocoder lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeocodedPlace {
    pub display_name: String,
    pub coordinates: Option<Coordinates>,
    /// Structured address breakdown, most specific component first
    /// (e.g. `["San Francisco", "94107", "California", "United States"]`).
    pub address_components: Vec<String>,
}

impl GeocodedPlace {
    pub fn new(display_name: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            display_name: display_name.into(),
            coordinates: Some(coordinates),
            address_components: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_components<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.address_components = components.into_iter().map(Into::into).collect();
        self
    }

    /// Location string to geocode again for a bounding box.
    ///
    /// With an address breakdown, keeps the purely non-numeric components (postal
    /// codes and street numbers go) in reverse order; otherwise the display name.
    #[must_use]
    pub fn location_label(&self) -> String {
        if self.address_components.is_empty() {
            return self.display_name.trim().to_string();
        }
        self.address_components
            .iter()
            .rev()
            .map(|component| component.trim())
            .filter(|component| NON_NUMERIC.is_match(component))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Address/IP lookup service.
///
/// Implementations must be cheap to share across requests; the resolver never
/// mutates them.
pub trait Geocoder: Send + Sync {
    /// Look up an address or an IP address. No match is an empty vector, not an error.
    fn search(&self, query: &str) -> impl Future<Output = Result<Vec<GeocodedPlace>>> + Send;

    /// Box of `radius_miles` around the first located match for `address`.
    /// Yields [`BoundingBox::undefined`] when nothing is located.
    fn bounding_box(
        &self,
        address: &str,
        radius_miles: f64,
    ) -> impl Future<Output = Result<BoundingBox>> + Send {
        async move {
            let places = self.search(address).await?;
            Ok(places
                .iter()
                .find_map(|place| place.coordinates)
                .map_or_else(BoundingBox::undefined, |center| {
                    BoundingBox::around(center, radius_miles)
                }))
        }
    }
}

/// Gazetteer held in memory, keyed by case-folded query.
#[derive(Debug, Clone, Default)]
pub struct StaticGeocoder {
    places: HashMap<String, Vec<GeocodedPlace>>,
}

fn gazetteer_key(query: &str) -> String {
    query.trim().to_lowercase()
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `place` as a result for `query` (an address or an IP).
    #[must_use]
    pub fn with_place(mut self, query: &str, place: GeocodedPlace) -> Self {
        self.insert(query, place);
        self
    }

    pub fn insert(&mut self, query: &str, place: GeocodedPlace) {
        self.places
            .entry(gazetteer_key(query))
            .or_default()
            .push(place);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.places.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }
}

impl Geocoder for StaticGeocoder {
    fn search(&self, query: &str) -> impl Future<Output = Result<Vec<GeocodedPlace>>> + Send {
        let found = self
            .places
            .get(&gazetteer_key(query))
            .cloned()
            .unwrap_or_default();
        async move { Ok(found) }
    }
}
