//! Turning a location string and a radius into a bounding box.
//!
//! Every failure on this path (no location, "anywhere", no client IP, provider
//! errors, timeouts, an address that does not geocode) is reported as a
//! [`SoftFailure`] and never as an error. Callers fall back to the default
//! stolenness category.

use std::{fmt, future::Future, time::Duration};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, instrument, warn};

pub use error::GeocodeError;
pub use geocoder::{GeocodedPlace, Geocoder, StaticGeocoder};
#[cfg(feature = "http-geocoder")]
pub use http::HttpGeocoder;

mod geocoder;
#[cfg(feature = "http-geocoder")]
mod http;

/// Radius used when none (or a non-positive one) is requested.
pub const DEFAULT_DISTANCE_MILES: f64 = 100.0;

/// Mean earth radius used by the box calculation.
pub const EARTH_RADIUS_MILES: f64 = 3956.0;

/// Miles spanned by one degree of latitude.
pub const LATITUDE_DEGREE_MILES: f64 = 2.0 * std::f64::consts::PI * EARTH_RADIUS_MILES / 360.0;

static ANYWHERE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)anywhere").expect("valid regex"));

/// Location values asking for the requester's network-derived location.
const REQUESTER_LOCATION: [&str; 3] = ["", "ip", "you"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Geographic rectangle, `(south, west, north, east)` in degrees.
///
/// `west > east` means the box crosses the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    #[must_use]
    pub const fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// The box a geocoder reports for an address it cannot place.
    #[must_use]
    pub const fn undefined() -> Self {
        Self::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN)
    }

    /// Box extending `radius_miles` north, south, east and west of `center`.
    ///
    /// Latitudes are clamped to the poles. Longitudes wrap, so a box near the
    /// antimeridian comes back with `west > east`; a box whose longitude span
    /// covers the whole globe spans `-180..=180`.
    #[must_use]
    pub fn around(center: Coordinates, radius_miles: f64) -> Self {
        let lat_delta = radius_miles / LATITUDE_DEGREE_MILES;
        let lon_degree_miles = LATITUDE_DEGREE_MILES * center.latitude.to_radians().cos();
        let lon_delta = radius_miles / lon_degree_miles;

        let south = (center.latitude - lat_delta).max(-90.0);
        let north = (center.latitude + lat_delta).min(90.0);

        // cos(lat) vanishes at the poles, leaving an infinite or NaN delta
        if !lon_delta.is_finite() || lon_delta < 0.0 || lon_delta >= 180.0 {
            return Self::new(south, -180.0, north, 180.0);
        }

        Self::new(
            south,
            wrap_longitude(center.longitude - lon_delta),
            north,
            wrap_longitude(center.longitude + lon_delta),
        )
    }

    #[must_use]
    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.south, self.west, self.north, self.east)
    }

    /// All four edges are finite numbers.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        [self.south, self.west, self.north, self.east]
            .iter()
            .all(|edge| edge.is_finite())
    }

    #[must_use]
    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }

    #[must_use]
    pub fn contains(&self, point: Coordinates) -> bool {
        if !self.is_defined() || point.latitude < self.south || point.latitude > self.north {
            return false;
        }
        if self.crosses_antimeridian() {
            point.longitude >= self.west || point.longitude <= self.east
        } else {
            point.longitude >= self.west && point.longitude <= self.east
        }
    }
}

fn wrap_longitude(longitude: f64) -> f64 {
    if (-180.0..=180.0).contains(&longitude) {
        longitude
    } else {
        (longitude + 180.0).rem_euclid(360.0) - 180.0
    }
}

/// Distance actually used for a request: non-finite, non-positive or absent means
/// [`DEFAULT_DISTANCE_MILES`].
#[must_use]
pub fn effective_distance(distance: Option<f64>) -> f64 {
    distance
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(DEFAULT_DISTANCE_MILES)
}

/// True when `location` names the requester's own network location.
#[must_use]
pub fn uses_requester_location(location: &str) -> bool {
    let normalized = location.trim().to_lowercase();
    REQUESTER_LOCATION.contains(&normalized.as_str())
}

/// Successful proximity resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProximityMatch {
    pub bounding_box: BoundingBox,
    /// The location that was geocoded: as given, or derived from the client IP.
    pub location: String,
    pub distance: f64,
}

/// Why a proximity lookup produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftFailure {
    NoLocation,
    Anywhere,
    NoClientIp,
    IpNotLocated,
    GeocoderFailed,
    TimedOut,
    UndefinedBoundingBox,
}

impl SoftFailure {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoLocation => "no location given",
            Self::Anywhere => "location is unconstrained",
            Self::NoClientIp => "no client IP to locate",
            Self::IpNotLocated => "client IP could not be located",
            Self::GeocoderFailed => "geocoder failed",
            Self::TimedOut => "geocoder timed out",
            Self::UndefinedBoundingBox => "bounding box is undefined",
        }
    }
}

impl fmt::Display for SoftFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves locations through a [`Geocoder`], bounding every call by a timeout.
///
/// Must be driven from within a tokio runtime with the time driver enabled.
#[derive(Debug, Clone)]
pub struct ProximityResolver<G> {
    geocoder: G,
    timeout: Duration,
}

impl<G: Geocoder> ProximityResolver<G> {
    pub fn new(geocoder: G, timeout: Duration) -> Self {
        Self { geocoder, timeout }
    }

    pub fn geocoder(&self) -> &G {
        &self.geocoder
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Bounding box for `location` and `distance`.
    ///
    /// Makes at most two geocoder calls: one to locate the client IP when
    /// `location` asks for it, and one for the bounding box.
    #[instrument(name = "Resolve proximity", skip(self, client_ip), level = "debug")]
    pub async fn resolve(
        &self,
        location: Option<&str>,
        distance: Option<f64>,
        client_ip: Option<&str>,
    ) -> Result<ProximityMatch, SoftFailure> {
        let location = location.ok_or(SoftFailure::NoLocation)?;
        if ANYWHERE.is_match(location) {
            return Err(SoftFailure::Anywhere);
        }
        let distance = effective_distance(distance);

        let location = if uses_requester_location(location) {
            let client_ip = client_ip
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
                .ok_or(SoftFailure::NoClientIp)?;
            let place = self
                .bounded(self.geocoder.search(client_ip))
                .await?
                .into_iter()
                .next()
                .ok_or(SoftFailure::IpNotLocated)?;
            let label = place.location_label();
            if label.is_empty() {
                // Nothing to geocode again, box the IP's own coordinates
                let center = place.coordinates.ok_or(SoftFailure::IpNotLocated)?;
                return Self::checked(BoundingBox::around(center, distance), label, distance);
            }
            debug!(location = %label, "Located client IP");
            label
        } else {
            location.trim().to_string()
        };

        let bounding_box = self
            .bounded(self.geocoder.bounding_box(&location, distance))
            .await?;
        Self::checked(bounding_box, location, distance)
    }

    fn checked(
        bounding_box: BoundingBox,
        location: String,
        distance: f64,
    ) -> Result<ProximityMatch, SoftFailure> {
        if !bounding_box.is_defined() {
            return Err(SoftFailure::UndefinedBoundingBox);
        }
        Ok(ProximityMatch {
            bounding_box,
            location,
            distance,
        })
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, GeocodeError>>,
    ) -> Result<T, SoftFailure> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => {
                warn!(%error, "Geocoder call failed");
                Err(SoftFailure::GeocoderFailed)
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "Geocoder call timed out");
                Err(SoftFailure::TimedOut)
            }
        }
    }
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum GeocodeError {
        #[cfg(feature = "http-geocoder")]
        #[error("HTTP error: {0}")]
        Http(#[from] reqwest::Error),
        #[error("Malformed provider response: {0}")]
        Parse(#[from] serde_json::Error),
        #[error("Provider rejected the lookup: {0}")]
        Provider(String),
    }

    pub type Result<T> = std::result::Result<T, GeocodeError>;
}
