//! Reverse and forward geocoding against a Nominatim (OpenStreetMap) endpoint.
//! Free, no API key required; a descriptive user agent is mandatory.

use std::future::Future;
use std::time::Duration;

use pulse_core::{GeocodingConfig, NetworkError, ReqwestErrorExt};
use reqwest::Client;
use serde::Deserialize;

/// Geocoding errors
#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("{0}")]
    Network(#[from] NetworkError),
    #[error("Geocoder returned status {0}")]
    Status(u16),
    #[error("No usable place name in response")]
    NoLabel,
    #[error("Parse error: {0}")]
    Parse(String),
}

/// A place found by forward geocoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub latitude: f64,
    pub longitude: f64,
    pub label: String,
}

/// Coordinates to a human-readable place label.
pub trait ReverseGeocoder: Send + Sync {
    fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> impl Future<Output = Result<String, GeocodeError>> + Send;
}

/// Free-text query to the best matching place, `None` when nothing matched.
pub trait ForwardGeocoder: Send + Sync {
    fn search(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Option<Place>, GeocodeError>> + Send;
}

#[derive(Debug, Deserialize)]
struct NominatimReverse {
    address: Option<NominatimAddress>,
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    county: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: Option<String>,
}

/// First comma-separated segment of a Nominatim `display_name`.
fn first_segment(display_name: &str) -> Option<String> {
    display_name
        .split(',')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn reverse_label(body: NominatimReverse) -> Option<String> {
    // Prefer city > town > village > municipality > county
    let from_address = body.address.and_then(|addr| {
        [addr.city, addr.town, addr.village, addr.municipality, addr.county]
            .into_iter()
            .flatten()
            .map(|s| s.trim().to_string())
            .find(|s| !s.is_empty())
    });

    from_address.or_else(|| body.display_name.as_deref().and_then(first_segment))
}

/// HTTP client for a Nominatim-compatible geocoder.
#[derive(Debug, Clone)]
pub struct NominatimClient {
    client: Client,
    base_url: String,
}

impl NominatimClient {
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(config: &GeocodingConfig) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(ReqwestErrorExt::into_network_error)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl ReverseGeocoder for NominatimClient {
    fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> impl Future<Output = Result<String, GeocodeError>> + Send {
        let request = self
            .client
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("format", "json".to_string()),
                ("addressdetails", "1".to_string()),
                ("zoom", "10".to_string()),
            ]);

        async move {
            let response = request
                .send()
                .await
                .map_err(ReqwestErrorExt::into_network_error)?;
            if !response.status().is_success() {
                tracing::debug!("Reverse geocode returned status {}", response.status());
                return Err(GeocodeError::Status(response.status().as_u16()));
            }

            let body: NominatimReverse = response
                .json()
                .await
                .map_err(|e| GeocodeError::Parse(e.to_string()))?;

            let label = reverse_label(body).ok_or(GeocodeError::NoLabel)?;
            tracing::info!("Reverse geocoded to: {}", label);
            Ok(label)
        }
    }
}

impl ForwardGeocoder for NominatimClient {
    fn search(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Option<Place>, GeocodeError>> + Send {
        let query = query.trim().to_string();
        let request = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("q", query.as_str()),
                ("format", "json"),
                ("limit", "1"),
            ]);

        async move {
            let response = request
                .send()
                .await
                .map_err(ReqwestErrorExt::into_network_error)?;
            if !response.status().is_success() {
                tracing::debug!("Place search returned status {}", response.status());
                return Err(GeocodeError::Status(response.status().as_u16()));
            }

            let places: Vec<NominatimPlace> = response
                .json()
                .await
                .map_err(|e| GeocodeError::Parse(e.to_string()))?;

            let Some(first) = places.into_iter().next() else {
                tracing::debug!("No place matched '{}'", query);
                return Ok(None);
            };

            let latitude: f64 = first
                .lat
                .parse()
                .map_err(|_| GeocodeError::Parse(format!("bad latitude '{}'", first.lat)))?;
            let longitude: f64 = first
                .lon
                .parse()
                .map_err(|_| GeocodeError::Parse(format!("bad longitude '{}'", first.lon)))?;
            let label = first
                .display_name
                .as_deref()
                .and_then(first_segment)
                .unwrap_or(query);

            Ok(Some(Place {
                latitude,
                longitude,
                label,
            }))
        }
    }
}
