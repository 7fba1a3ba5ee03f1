//! Error types shared across the CityPulse crates.
//!
//! Every enum pairs a detailed `Display` (for logs) with a short
//! `user_message()` for the screen.

use thiserror::Error;

/// Top-level application error type.
///
/// Use `user_message()` to get a UI-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display in the UI.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Location(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => {
                "Unable to connect. Check your internet connection."
            }
            NetworkError::Timeout => "The request timed out. Please try again.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The server is experiencing issues. Please try again later."
            }
            NetworkError::ServerError { .. } => "The request failed. Please try again.",
            NetworkError::InvalidResponse(_) => {
                "Received an unexpected response. Please try again."
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Configuration not found. Using defaults.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}

/// Location subsystem errors.
///
/// Acquisition-path variants are rendered by the location gate and never
/// reach page components; search variants stay with the search consumer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Position unavailable")]
    PositionUnavailable,

    #[error("Location request timed out")]
    Timeout,

    #[error("Geolocation is not supported on this platform")]
    CapabilityUnsupported,

    #[error("Reverse geocoding failed: {0}")]
    EnrichmentFailure(String),

    #[error("Persisted location is corrupt: {0}")]
    StorageCorruption(String),

    #[error("Location storage error: {0}")]
    Storage(String),

    #[error("Coordinates out of range: ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("No place matched '{0}'")]
    SearchNotFound(String),

    #[error("Place search failed: {0}")]
    SearchFailed(String),
}

impl LocationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            LocationError::PermissionDenied => {
                "Location access is required to use CityPulse services. Please enable location permissions and try again."
            }
            LocationError::PositionUnavailable => {
                "Your position could not be determined. Check that location services are enabled and try again."
            }
            LocationError::Timeout => {
                "Locating your device took too long. Check that location services are enabled and try again."
            }
            LocationError::CapabilityUnsupported => {
                "Geolocation is not supported by your browser. Please use a modern browser with location services to access CityPulse."
            }
            LocationError::EnrichmentFailure(_) => {
                "Your place name could not be looked up. Your location is still being used."
            }
            LocationError::StorageCorruption(_) => {
                "Your saved location could not be read. Locating you again."
            }
            LocationError::Storage(_) => {
                "Your location could not be saved. It will be used for this session only."
            }
            LocationError::InvalidCoordinates { .. } => {
                "Latitude must be between -90 and 90 and longitude between -180 and 180."
            }
            LocationError::SearchNotFound(_) => "Location not found. Please try a different search.",
            LocationError::SearchFailed(_) => "Failed to search location. Please try again later.",
        }
    }

    /// Whether the gate should offer a retry action for this error.
    pub fn offers_retry(&self) -> bool {
        matches!(
            self,
            LocationError::PermissionDenied
                | LocationError::PositionUnavailable
                | LocationError::Timeout
        )
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_connect() {
            NetworkError::ConnectionFailed(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}
