//! Read/write handle for views and services that depend on the location.
//!
//! Consumers hold a [`LocationContext`] rather than a copy of the location
//! and re-read it after every change notification.

use std::future::Future;
use std::sync::Arc;

use pulse_core::LocationError;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::acquisition::{AcquireOutcome, AcquisitionController};
use crate::gate::GateView;
use crate::geocode::ReverseGeocoder;
use crate::platform::GeoPlatform;
use crate::types::{AcquisitionState, Location};

pub const DEFAULT_ALERT_RADIUS_KM: f64 = 5.0;
pub const MIN_ALERT_RADIUS_KM: f64 = 1.0;
pub const MAX_ALERT_RADIUS_KM: f64 = 50.0;

/// Shared handle to the location controller. Cheap to clone.
pub struct LocationContext<P, G> {
    controller: Arc<AcquisitionController<P, G>>,
}

impl<P, G> Clone for LocationContext<P, G> {
    fn clone(&self) -> Self {
        Self {
            controller: Arc::clone(&self.controller),
        }
    }
}

impl<P, G> LocationContext<P, G>
where
    P: GeoPlatform,
    G: ReverseGeocoder,
{
    pub fn new(controller: AcquisitionController<P, G>) -> Self {
        Self {
            controller: Arc::new(controller),
        }
    }

    pub fn controller(&self) -> &AcquisitionController<P, G> {
        &self.controller
    }

    /// Current location, read at render time.
    pub fn location(&self) -> Location {
        self.controller.store().get()
    }

    /// The durable record as it would be read on the next start.
    pub fn saved_location(&self) -> Option<Location> {
        self.controller.store().load()
    }

    pub fn has_valid_location(&self) -> bool {
        self.controller.store().is_valid()
    }

    /// Change notifications for the shared location.
    pub fn subscribe(&self) -> watch::Receiver<Location> {
        self.controller.store().subscribe()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<AcquisitionState> {
        self.controller.subscribe_state()
    }

    pub fn gate(&self) -> GateView {
        self.controller.gate()
    }

    /// Invalidate the current location and acquire a new one.
    pub fn force_location_request(&self) -> impl Future<Output = AcquireOutcome> + Send + '_ {
        self.controller.force_location_request()
    }

    /// Write coordinates obtained independently (e.g. from place search).
    ///
    /// # Errors
    ///
    /// See [`AcquisitionController::set_location`].
    pub fn set_location(
        &self,
        latitude: f64,
        longitude: f64,
        label: &str,
    ) -> Result<Location, LocationError> {
        self.controller.set_location(latitude, longitude, label)
    }

    /// Alert filter centred on the current location, `None` until one exists.
    pub fn alert_area(&self, radius_km: f64) -> Option<AlertArea> {
        let location = self.location();
        location
            .is_valid()
            .then(|| AlertArea::new(location, radius_km))
    }
}

impl<P, G> LocationContext<P, G>
where
    P: GeoPlatform + 'static,
    G: ReverseGeocoder + 'static,
{
    /// Boot the gate on the runtime without waiting for it.
    pub fn spawn_boot(&self) -> JoinHandle<AcquireOutcome> {
        let controller = Arc::clone(&self.controller);
        tokio::spawn(async move { controller.boot().await })
    }

    /// Fire-and-forget forced request for UI event handlers.
    ///
    /// The store is cleared and the gate re-armed before this returns.
    pub fn spawn_force_location_request(&self) -> JoinHandle<AcquireOutcome> {
        let controller = Arc::clone(&self.controller);
        let start = controller.begin_force();
        tokio::spawn(async move { controller.drive(start).await })
    }
}

/// A circular alert filter around a center point.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertArea {
    center: Location,
    radius_km: f64,
}

impl AlertArea {
    /// Radius is clamped to the supported 1-50 km range.
    pub fn new(center: Location, radius_km: f64) -> Self {
        let radius_km = if radius_km.is_finite() {
            radius_km.clamp(MIN_ALERT_RADIUS_KM, MAX_ALERT_RADIUS_KM)
        } else {
            DEFAULT_ALERT_RADIUS_KM
        };
        Self { center, radius_km }
    }

    pub fn center(&self) -> &Location {
        &self.center
    }

    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }

    /// Whether an alert at `(latitude, longitude)` falls within the area.
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        let point = Location {
            latitude,
            longitude,
            label: String::new(),
        };
        self.center.distance_km(&point) <= self.radius_km
    }
}
