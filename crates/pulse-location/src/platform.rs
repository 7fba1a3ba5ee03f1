//! Platform geolocation capability.

use std::future::Future;

use crate::types::{Position, PositionError, PositionOptions};

/// Source of device position fixes.
///
/// A single call settles exactly once. Calls are not cancellable; the
/// acquisition controller discards results it no longer wants.
pub trait GeoPlatform: Send + Sync {
    /// Whether the platform can provide positions at all.
    fn is_supported(&self) -> bool;

    /// Request the current position.
    fn current_position(
        &self,
        options: &PositionOptions,
    ) -> impl Future<Output = Result<Position, PositionError>> + Send;
}

/// A platform that reports a fixed, configured position, or no capability
/// when none is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPlatform {
    position: Option<Position>,
}

impl StaticPlatform {
    pub fn new(position: Option<Position>) -> Self {
        Self { position }
    }

    /// Build from a `[lat, lon]` pair as found in configuration.
    pub fn from_config(device_position: Option<[f64; 2]>) -> Self {
        Self::new(device_position.map(|[lat, lon]| Position::new(lat, lon)))
    }

    pub fn unsupported() -> Self {
        Self::default()
    }
}

impl GeoPlatform for StaticPlatform {
    fn is_supported(&self) -> bool {
        self.position.is_some()
    }

    fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> impl Future<Output = Result<Position, PositionError>> + Send {
        let position = self.position;
        async move { position.ok_or(PositionError::PositionUnavailable) }
    }
}
