use std::fmt;
use std::time::Duration;

use pulse_core::{LocationConfig, LocationError};

/// Mean Earth radius used for great-circle distances
const EARTH_RADIUS_KM: f64 = 6371.0;

/// The shared application location.
///
/// `(0, 0, "")` is the unset sentinel; see [`Location::is_valid`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub label: String,
}

impl Location {
    /// The "no location yet" value.
    pub const UNSET: Location = Location {
        latitude: 0.0,
        longitude: 0.0,
        label: String::new(),
    };

    /// Build a location, rejecting non-finite or out-of-range coordinates.
    pub fn new(
        latitude: f64,
        longitude: f64,
        label: impl Into<String>,
    ) -> Result<Self, LocationError> {
        validate_coordinates(latitude, longitude)?;
        Ok(Self {
            latitude,
            longitude,
            label: label.into(),
        })
    }

    /// True unless both coordinates are exactly zero.
    pub fn is_valid(&self) -> bool {
        self.latitude != 0.0 || self.longitude != 0.0
    }

    /// Label for display, falling back to rounded coordinates.
    pub fn display_label(&self) -> String {
        if self.label.trim().is_empty() {
            format!("{:.4}, {:.4}", self.latitude, self.longitude)
        } else {
            self.label.clone()
        }
    }

    /// Query parameters for consumers that pass the location to their own fetch.
    pub fn query_params(&self) -> [(&'static str, String); 2] {
        [
            ("lat", self.latitude.to_string()),
            ("lon", self.longitude.to_string()),
        ]
    }

    /// Haversine distance to `other` in kilometres.
    pub fn distance_km(&self, other: &Location) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}

/// Reject coordinates outside [-90, 90] x [-180, 180] (NaN included).
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), LocationError> {
    if (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude) {
        Ok(())
    } else {
        Err(LocationError::InvalidCoordinates {
            latitude,
            longitude,
        })
    }
}

/// Acquisition controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquisitionState {
    #[default]
    Idle,
    Requesting,
    Enriching,
    Resolved,
    Denied,
    Unsupported,
}

impl AcquisitionState {
    /// True while a platform request or its enrichment is outstanding.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Requesting | Self::Enriching)
    }

    /// Whether `self -> next` is a legal edge.
    ///
    /// Requesting/Enriching -> Requesting is a superseding forced request.
    /// Any non-Resolved -> Resolved is a direct consumer write.
    pub fn can_transition_to(self, next: Self) -> bool {
        use AcquisitionState::*;
        matches!(
            (self, next),
            (Idle, Requesting)
                | (Idle, Resolved)
                | (Requesting, Enriching)
                | (Requesting, Denied)
                | (Requesting, Unsupported)
                | (Requesting, Requesting)
                | (Requesting, Resolved)
                | (Enriching, Resolved)
                | (Enriching, Requesting)
                | (Denied, Requesting)
                | (Denied, Resolved)
                | (Unsupported, Resolved)
                | (Resolved, Requesting)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::Enriching => "enriching",
            Self::Resolved => "resolved",
            Self::Denied => "denied",
            Self::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fix reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Options passed to every platform position request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(10),
            maximum_age: Duration::ZERO,
        }
    }
}

impl From<&LocationConfig> for PositionOptions {
    fn from(config: &LocationConfig) -> Self {
        Self {
            high_accuracy: config.high_accuracy,
            timeout: Duration::from_secs(config.timeout_secs),
            maximum_age: Duration::from_secs(config.maximum_age_secs),
        }
    }
}

/// Typed platform failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Position unavailable")]
    PositionUnavailable,
    #[error("Location request timed out")]
    Timeout,
}

impl From<PositionError> for LocationError {
    fn from(e: PositionError) -> Self {
        match e {
            PositionError::PermissionDenied => LocationError::PermissionDenied,
            PositionError::PositionUnavailable => LocationError::PositionUnavailable,
            PositionError::Timeout => LocationError::Timeout,
        }
    }
}
