use serde::Serialize;

use crate::{
    proximity::{BoundingBox, ProximityMatch},
    serial::SerialNumber,
};

/// Theft-status filter dimension. Always set on [`SearchCriteria`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stolenness {
    All,
    /// Bikes still with their owner.
    Non,
    /// Stolen or impounded; the default when nothing else applies.
    #[default]
    Stolen,
    /// Impounded only. Also requested as `"impounded"`.
    Found,
    /// Stolen or impounded within a bounding box.
    Proximity,
}

impl Stolenness {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Non => "non",
            Self::Stolen => "stolen",
            Self::Found => "found",
            Self::Proximity => "proximity",
        }
    }

    /// Categories taken verbatim from a request. `stolen` and `proximity` are not
    /// among them: the first is the fallback, the second needs geocoding.
    #[must_use]
    pub fn parse_explicit(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Some(Self::All),
            "non" => Some(Self::Non),
            "found" | "impounded" => Some(Self::Found),
            _ => None,
        }
    }
}

impl std::fmt::Display for Stolenness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved manufacturer filter: a single id when exactly one resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ManufacturerFilter {
    One(u32),
    Many(Vec<u32>),
}

impl ManufacturerFilter {
    /// `None` for an empty list, [`Self::One`] for a single id.
    #[must_use]
    pub fn from_ids(mut ids: Vec<u32>) -> Option<Self> {
        match ids.len() {
            0 => None,
            1 => ids.pop().map(Self::One),
            _ => Some(Self::Many(ids)),
        }
    }

    #[must_use]
    pub fn ids(&self) -> &[u32] {
        match self {
            Self::One(id) => std::slice::from_ref(id),
            Self::Many(ids) => ids,
        }
    }
}

/// Normalized, typed search specification built fresh for every request.
///
/// `proximity` is set iff `stolenness` is [`Stolenness::Proximity`];
/// [`Self::with_proximity`] keeps the two together.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchCriteria {
    /// Normalized serial. Absent when nothing comparable was supplied.
    pub serial: Option<String>,
    /// Serial exactly as supplied, for display only.
    pub raw_serial: Option<String>,
    pub query: Option<String>,
    pub manufacturer: Option<ManufacturerFilter>,
    pub colors: Option<Vec<u32>>,
    pub stolenness: Stolenness,
    pub proximity: Option<ProximityMatch>,
}

impl SearchCriteria {
    /// Record `raw` and its normalized form. A serial with nothing comparable in
    /// it keeps `raw_serial` but filters nothing.
    #[must_use]
    pub fn with_serial(mut self, raw: &str) -> Self {
        let serial = SerialNumber::new(raw);
        self.serial = (!serial.is_blank()).then(|| serial.normalized().to_string());
        self.raw_serial = Some(raw.to_string());
        self
    }

    #[must_use]
    pub fn with_query(mut self, query: &str) -> Self {
        let query = query.trim();
        self.query = (!query.is_empty()).then(|| query.to_string());
        self
    }

    #[must_use]
    pub fn with_manufacturers(mut self, ids: Vec<u32>) -> Self {
        self.manufacturer = ManufacturerFilter::from_ids(ids);
        self
    }

    #[must_use]
    pub fn with_colors(mut self, ids: Vec<u32>) -> Self {
        self.colors = (!ids.is_empty()).then_some(ids);
        self
    }

    /// Set a non-proximity category. [`Stolenness::Proximity`] without a box
    /// falls back to [`Stolenness::Stolen`].
    #[must_use]
    pub fn with_stolenness(mut self, stolenness: Stolenness) -> Self {
        self.proximity = None;
        self.stolenness = match stolenness {
            Stolenness::Proximity => Stolenness::Stolen,
            other => other,
        };
        self
    }

    #[must_use]
    pub fn with_proximity(mut self, proximity: ProximityMatch) -> Self {
        self.stolenness = Stolenness::Proximity;
        self.proximity = Some(proximity);
        self
    }

    #[must_use]
    pub fn bounding_box(&self) -> Option<&BoundingBox> {
        self.proximity.as_ref().map(|p| &p.bounding_box)
    }

    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.proximity.as_ref().map(|p| p.location.as_str())
    }

    #[must_use]
    pub fn distance(&self) -> Option<f64> {
        self.proximity.as_ref().map(|p| p.distance)
    }

    /// True when anything besides the stolenness category constrains the search.
    #[must_use]
    pub fn has_search_filters(&self) -> bool {
        self.serial.is_some()
            || self.raw_serial.is_some()
            || self.query.is_some()
            || self.manufacturer.is_some()
            || self.colors.is_some()
            || self.proximity.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proximity::Coordinates;

    #[test]
    fn test_default_is_stolen() {
        let criteria = SearchCriteria::default();
        assert_eq!(criteria.stolenness, Stolenness::Stolen);
        assert!(!criteria.has_search_filters());
    }

    #[test]
    fn test_explicit_categories() {
        assert_eq!(Stolenness::parse_explicit("all"), Some(Stolenness::All));
        assert_eq!(Stolenness::parse_explicit("NON"), Some(Stolenness::Non));
        assert_eq!(Stolenness::parse_explicit("found"), Some(Stolenness::Found));
        assert_eq!(Stolenness::parse_explicit("impounded"), Some(Stolenness::Found));
        assert_eq!(Stolenness::parse_explicit("stolen"), None);
        assert_eq!(Stolenness::parse_explicit("proximity"), None);
        assert_eq!(Stolenness::parse_explicit("whatever"), None);
    }

    #[test]
    fn test_manufacturer_collapses_single_id() {
        assert_eq!(ManufacturerFilter::from_ids(vec![]), None);
        assert_eq!(
            ManufacturerFilter::from_ids(vec![14]),
            Some(ManufacturerFilter::One(14))
        );
        let many = ManufacturerFilter::from_ids(vec![1, 2]).unwrap();
        assert_eq!(many.ids(), &[1, 2]);
    }

    #[test]
    fn test_blank_serial_keeps_raw_only() {
        let criteria = SearchCriteria::default().with_serial(" -- ");
        assert_eq!(criteria.serial, None);
        assert_eq!(criteria.raw_serial.as_deref(), Some(" -- "));
        assert!(criteria.has_search_filters());
    }

    #[test]
    fn test_stolenness_alone_is_not_a_filter() {
        let criteria = SearchCriteria::default().with_stolenness(Stolenness::All);
        assert!(!criteria.has_search_filters());
        assert!(SearchCriteria::default().with_colors(vec![3]).has_search_filters());
    }

    #[test]
    fn test_proximity_travels_with_its_box() {
        let proximity = ProximityMatch {
            bounding_box: BoundingBox::around(Coordinates::new(37.77, -122.42), 10.0),
            location: "San Francisco".to_string(),
            distance: 10.0,
        };
        let criteria = SearchCriteria::default().with_proximity(proximity);
        assert_eq!(criteria.stolenness, Stolenness::Proximity);
        assert_eq!(criteria.location(), Some("San Francisco"));
        assert_eq!(criteria.distance(), Some(10.0));

        let reset = criteria.with_stolenness(Stolenness::Proximity);
        assert_eq!(reset.stolenness, Stolenness::Stolen);
        assert!(reset.bounding_box().is_none());
    }

    #[test]
    fn test_serializes_lowercase_stolenness() {
        let json = serde_json::to_value(SearchCriteria::default().with_manufacturers(vec![14]))
            .unwrap();
        assert_eq!(json["stolenness"], "stolen");
        assert_eq!(json["manufacturer"], 14);
    }
}
