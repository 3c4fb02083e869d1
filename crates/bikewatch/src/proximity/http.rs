//! Geocoding over HTTP: a Nominatim-compatible endpoint for addresses and an
//! ip-api-compatible endpoint for IP addresses.

use std::{future::Future, net::IpAddr};

use serde::Deserialize;
use tracing::{debug, instrument};

use super::{
    Coordinates, GeocodedPlace, Geocoder,
    error::{GeocodeError, Result},
};

pub const NOMINATIM_SEARCH_URL: &str = "https://nominatim.openstreetmap.org/search";
pub const IP_API_URL: &str = "http://ip-api.com/json";

const USER_AGENT: &str = concat!("bikewatch/", env!("CARGO_PKG_VERSION"));

/// Nominatim address fields, most specific first.
const ADDRESS_FIELDS: [&str; 10] = [
    "road",
    "neighbourhood",
    "suburb",
    "city",
    "town",
    "village",
    "county",
    "state",
    "postcode",
    "country",
];

#[derive(Debug, Clone)]
pub struct HttpGeocoder {
    client: reqwest::Client,
    address_endpoint: String,
    ip_endpoint: String,
}

impl HttpGeocoder {
    /// Geocoder against the public Nominatim and ip-api services.
    pub fn new() -> Result<Self> {
        Self::with_endpoints(NOMINATIM_SEARCH_URL, IP_API_URL)
    }

    pub fn with_endpoints(
        address_endpoint: impl Into<String>,
        ip_endpoint: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            address_endpoint: address_endpoint.into(),
            ip_endpoint: ip_endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    #[instrument(name = "Geocode address", skip(self), level = "debug")]
    async fn search_address(&self, address: &str) -> Result<Vec<GeocodedPlace>> {
        let body = self
            .client
            .get(&self.address_endpoint)
            .query(&[
                ("q", address),
                ("format", "jsonv2"),
                ("addressdetails", "1"),
                ("limit", "1"),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_nominatim(&body)
    }

    #[instrument(name = "Geocode IP", skip(self), level = "debug")]
    async fn search_ip(&self, ip: IpAddr) -> Result<Vec<GeocodedPlace>> {
        let body = self
            .client
            .get(format!("{}/{ip}", self.ip_endpoint))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_ip_api(&body)
    }
}

impl Geocoder for HttpGeocoder {
    fn search(&self, query: &str) -> impl Future<Output = Result<Vec<GeocodedPlace>>> + Send {
        let query = query.trim().to_string();
        async move {
            match query.parse::<IpAddr>() {
                Ok(ip) => self.search_ip(ip).await,
                Err(_) => self.search_address(&query).await,
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    address: serde_json::Map<String, serde_json::Value>,
}

fn parse_nominatim(body: &str) -> Result<Vec<GeocodedPlace>> {
    let places: Vec<NominatimPlace> = serde_json::from_str(body)?;
    let parsed = places
        .into_iter()
        .filter_map(|place| {
            let latitude = place.lat.parse().ok()?;
            let longitude = place.lon.parse().ok()?;
            let components = ADDRESS_FIELDS
                .iter()
                .filter_map(|field| place.address.get(*field)?.as_str())
                .map(str::to_string)
                .collect::<Vec<_>>();
            Some(
                GeocodedPlace::new(place.display_name, Coordinates::new(latitude, longitude))
                    .with_components(components),
            )
        })
        .collect::<Vec<_>>();
    debug!(candidates = parsed.len(), "Parsed address lookup");
    Ok(parsed)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    zip: Option<String>,
    #[serde(default)]
    region_name: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

fn parse_ip_api(body: &str) -> Result<Vec<GeocodedPlace>> {
    let response: IpApiResponse = serde_json::from_str(body)?;
    match response.status.as_str() {
        "success" => {}
        // Private and reserved ranges are reported as failures, not located
        "fail" if response.message.as_deref().is_some_and(|m| m.contains("range")) => {
            return Ok(Vec::new());
        }
        _ => {
            return Err(GeocodeError::Provider(
                response.message.unwrap_or(response.status),
            ));
        }
    }

    let components = [
        response.city,
        response.zip,
        response.region_name,
        response.country,
    ]
    .into_iter()
    .flatten()
    .filter(|component| !component.is_empty())
    .collect::<Vec<_>>();

    Ok(vec![GeocodedPlace {
        display_name: components.join(", "),
        coordinates: response
            .lat
            .zip(response.lon)
            .map(|(lat, lon)| Coordinates::new(lat, lon)),
        address_components: components,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nominatim_response() {
        let body = r#"[{
            "place_id": 1,
            "lat": "37.7790262",
            "lon": "-122.419906",
            "display_name": "San Francisco, California, United States",
            "address": {
                "city": "San Francisco",
                "state": "California",
                "postcode": "94102",
                "country": "United States",
                "country_code": "us"
            }
        }]"#;
        let places = parse_nominatim(body).unwrap();
        assert_eq!(places.len(), 1);
        let place = &places[0];
        assert_eq!(
            place.coordinates,
            Some(Coordinates::new(37.7790262, -122.419906))
        );
        assert_eq!(
            place.address_components,
            vec!["San Francisco", "California", "94102", "United States"]
        );
    }

    #[test]
    fn test_parse_nominatim_skips_unparseable_coordinates() {
        let body = r#"[{"lat": "north", "lon": "0", "display_name": "Nowhere"}]"#;
        assert!(parse_nominatim(body).unwrap().is_empty());
        assert!(parse_nominatim("[]").unwrap().is_empty());
        assert!(parse_nominatim("<html>").is_err());
    }

    #[test]
    fn test_parse_ip_api_success() {
        let body = r#"{
            "status": "success",
            "country": "United States",
            "regionName": "California",
            "city": "San Francisco",
            "zip": "94107",
            "lat": 37.7642,
            "lon": -122.3993,
            "query": "203.0.113.7"
        }"#;
        let places = parse_ip_api(body).unwrap();
        assert_eq!(
            places[0].location_label(),
            "United States, California, San Francisco"
        );
        assert!(places[0].coordinates.is_some());
    }

    #[test]
    fn test_parse_ip_api_reserved_range_is_not_located() {
        let body = r#"{"status": "fail", "message": "reserved range", "query": "127.0.0.1"}"#;
        assert!(parse_ip_api(body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_ip_api_failure_is_an_error() {
        let body = r#"{"status": "fail", "message": "invalid query"}"#;
        assert!(matches!(
            parse_ip_api(body),
            Err(GeocodeError::Provider(message)) if message == "invalid query"
        ));
    }
}
