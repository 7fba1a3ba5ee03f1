//! Place-name search that sets the shared location.

use pulse_core::LocationError;

use crate::consumer::LocationContext;
use crate::geocode::{ForwardGeocoder, ReverseGeocoder};
use crate::platform::GeoPlatform;
use crate::types::Location;

/// Forward-geocoding search bound to a geocoder.
///
/// Failures stay with the caller (the search box); they never change the
/// shared location or the gate.
#[derive(Debug, Clone)]
pub struct LocationSearch<F> {
    geocoder: F,
}

impl<F: ForwardGeocoder> LocationSearch<F> {
    pub fn new(geocoder: F) -> Self {
        Self { geocoder }
    }

    /// Look up `query` and, on a match, make it the shared location.
    ///
    /// Returns `Ok(None)` for a blank query.
    ///
    /// # Errors
    ///
    /// `SearchNotFound` when nothing matched, `SearchFailed` when the
    /// geocoder could not be reached, or the write error from
    /// [`LocationContext::set_location`].
    pub async fn search_and_set<P, G>(
        &self,
        context: &LocationContext<P, G>,
        query: &str,
    ) -> Result<Option<Location>, LocationError>
    where
        P: GeoPlatform,
        G: ReverseGeocoder,
    {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }

        let place = match self.geocoder.search(query).await {
            Ok(Some(place)) => place,
            Ok(None) => {
                tracing::info!("No place matched '{}'", query);
                return Err(LocationError::SearchNotFound(query.to_string()));
            }
            Err(e) => {
                tracing::warn!("Place search for '{}' failed: {}", query, e);
                return Err(LocationError::SearchFailed(e.to_string()));
            }
        };

        let location = context.set_location(place.latitude, place.longitude, &place.label)?;
        tracing::info!(
            "Location set from search: {} ({}, {})",
            location.label,
            location.latitude,
            location.longitude
        );
        Ok(Some(location))
    }
}
