//! Location acquisition controller.
//!
//! Drives the platform request and reverse-geocoding enrichment, writes the
//! result to the [`LocationStore`] and exposes the gate state. Transitions are
//! serialized under one lock that is never held across an await. Each
//! acquisition carries a request token; results arriving for a token that is
//! no longer current are discarded.

use std::future::Future;

use parking_lot::Mutex;
use pulse_core::{LocationConfig, LocationError};
use tokio::sync::watch;

use crate::gate::GateView;
use crate::geocode::ReverseGeocoder;
use crate::platform::GeoPlatform;
use crate::store::LocationStore;
use crate::types::{validate_coordinates, AcquisitionState, Location, PositionError, PositionOptions};

/// Label used when enrichment fails.
pub const DEFAULT_FALLBACK_LABEL: &str = "Your Location";

/// Result of an acquisition call. Controller operations never fail; every
/// outcome is a value.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquireOutcome {
    /// A location is now authoritative.
    Resolved(Location),
    /// The platform refused, failed or timed out.
    Denied(LocationError),
    /// The platform has no geolocation capability.
    Unsupported,
    /// Another acquisition is already running; nothing was started.
    InFlight,
    /// A newer acquisition or a direct write replaced this one.
    Superseded,
    /// The call does not apply in the current state.
    Unchanged(AcquisitionState),
}

pub(crate) enum Start {
    Run(u64),
    Done(AcquireOutcome),
}

#[derive(Debug, Default)]
struct ControlInner {
    token: u64,
    last_error: Option<LocationError>,
}

/// Gate controller for device location.
pub struct AcquisitionController<P, G> {
    store: LocationStore,
    platform: P,
    geocoder: G,
    options: PositionOptions,
    fallback_label: String,
    state: watch::Sender<AcquisitionState>,
    inner: Mutex<ControlInner>,
}

impl<P, G> AcquisitionController<P, G>
where
    P: GeoPlatform,
    G: ReverseGeocoder,
{
    pub fn new(store: LocationStore, platform: P, geocoder: G) -> Self {
        let (state, _) = watch::channel(AcquisitionState::Idle);
        Self {
            store,
            platform,
            geocoder,
            options: PositionOptions::default(),
            fallback_label: DEFAULT_FALLBACK_LABEL.to_string(),
            state,
            inner: Mutex::new(ControlInner::default()),
        }
    }

    /// Apply position options and fallback label from configuration.
    pub fn with_config(self, config: &LocationConfig) -> Self {
        self.with_options(PositionOptions::from(config))
            .with_fallback_label(config.fallback_label.clone())
    }

    pub fn with_options(mut self, options: PositionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_fallback_label(mut self, label: impl Into<String>) -> Self {
        self.fallback_label = label.into();
        self
    }

    pub(crate) fn store(&self) -> &LocationStore {
        &self.store
    }

    pub fn state(&self) -> AcquisitionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<AcquisitionState> {
        self.state.subscribe()
    }

    /// Explanation for the current Denied/Unsupported state.
    pub fn last_error(&self) -> Option<LocationError> {
        self.inner.lock().last_error.clone()
    }

    /// What the gate should show right now.
    pub fn gate(&self) -> GateView {
        let inner = self.inner.lock();
        GateView::for_state(self.state(), inner.last_error.as_ref())
    }

    /// Resolve from storage if possible, otherwise start acquiring.
    ///
    /// Only acts in `Idle`; a persisted valid location opens the gate
    /// without touching the platform or the network.
    pub fn boot(&self) -> impl Future<Output = AcquireOutcome> + Send + '_ {
        let start = {
            let mut inner = self.inner.lock();
            let state = self.state();
            if state != AcquisitionState::Idle {
                Start::Done(AcquireOutcome::Unchanged(state))
            } else if self.store.restore() || self.store.is_valid() {
                self.transition(AcquisitionState::Resolved);
                Start::Done(AcquireOutcome::Resolved(self.store.get()))
            } else {
                tracing::info!("No saved location, requesting device position");
                Start::Run(self.begin(&mut inner))
            }
        };
        self.drive(start)
    }

    /// Start an acquisition from `Idle` or `Denied`.
    ///
    /// While one is already in flight this is a no-op returning
    /// [`AcquireOutcome::InFlight`]; no second platform prompt is issued.
    pub fn request(&self) -> impl Future<Output = AcquireOutcome> + Send + '_ {
        let start = self.begin_request();
        self.drive(start)
    }

    /// Explicit user retry from the Denied gate.
    ///
    /// Only acts when the denial reason offers a retry.
    pub fn retry(&self) -> impl Future<Output = AcquireOutcome> + Send + '_ {
        let retryable = self.state() == AcquisitionState::Denied
            && self
                .inner
                .lock()
                .last_error
                .as_ref()
                .map_or(true, LocationError::offers_retry);
        let start = if retryable {
            self.begin_request()
        } else {
            Start::Done(AcquireOutcome::Unchanged(self.state()))
        };
        self.drive(start)
    }

    /// Clear the stored location, re-arm the gate and acquire again.
    ///
    /// The reset happens before this returns; the returned future performs
    /// the acquisition. Any acquisition already in flight is superseded.
    pub fn force_location_request(&self) -> impl Future<Output = AcquireOutcome> + Send + '_ {
        let start = self.begin_force();
        self.drive(start)
    }

    /// Write a location obtained outside the platform path (place search).
    ///
    /// Resolves the gate and supersedes any in-flight acquisition.
    ///
    /// # Errors
    ///
    /// `InvalidCoordinates` for out-of-range input or the unset sentinel,
    /// `Storage` if the durable write fails. State is unchanged on error.
    pub fn set_location(
        &self,
        latitude: f64,
        longitude: f64,
        label: &str,
    ) -> Result<Location, LocationError> {
        if latitude == 0.0 && longitude == 0.0 {
            return Err(LocationError::InvalidCoordinates {
                latitude,
                longitude,
            });
        }

        let mut inner = self.inner.lock();
        let location = self.store.set(latitude, longitude, label)?;
        inner.token += 1;
        inner.last_error = None;
        self.transition(AcquisitionState::Resolved);
        Ok(location)
    }

    fn begin_request(&self) -> Start {
        let mut inner = self.inner.lock();
        match self.state() {
            state if state.is_in_flight() => {
                tracing::debug!("Location request already in flight");
                Start::Done(AcquireOutcome::InFlight)
            }
            AcquisitionState::Idle | AcquisitionState::Denied => Start::Run(self.begin(&mut inner)),
            state => Start::Done(AcquireOutcome::Unchanged(state)),
        }
    }

    pub(crate) fn begin_force(&self) -> Start {
        let mut inner = self.inner.lock();
        if self.state() == AcquisitionState::Unsupported {
            return Start::Done(AcquireOutcome::Unchanged(AcquisitionState::Unsupported));
        }

        if let Err(e) = self.store.clear() {
            tracing::warn!("Failed to clear saved location: {}", e);
        }
        tracing::info!("Forced location request");
        Start::Run(self.begin(&mut inner))
    }

    fn begin(&self, inner: &mut ControlInner) -> u64 {
        inner.token += 1;
        inner.last_error = None;
        self.transition(AcquisitionState::Requesting);
        inner.token
    }

    pub(crate) async fn drive(&self, start: Start) -> AcquireOutcome {
        match start {
            Start::Run(token) => self.acquire(token).await,
            Start::Done(outcome) => outcome,
        }
    }

    async fn acquire(&self, token: u64) -> AcquireOutcome {
        if !self.platform.is_supported() {
            return self.fail(
                token,
                LocationError::CapabilityUnsupported,
                AcquisitionState::Unsupported,
            );
        }

        let fix = match tokio::time::timeout(
            self.options.timeout,
            self.platform.current_position(&self.options),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(PositionError::Timeout),
        };

        let position = match fix {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("Device position request failed: {}", e);
                return self.fail(token, e.into(), AcquisitionState::Denied);
            }
        };

        let usable = validate_coordinates(position.latitude, position.longitude).is_ok()
            && (position.latitude != 0.0 || position.longitude != 0.0);
        if !usable {
            tracing::warn!(
                "Platform reported unusable position ({}, {})",
                position.latitude,
                position.longitude
            );
            return self.fail(
                token,
                LocationError::PositionUnavailable,
                AcquisitionState::Denied,
            );
        }

        {
            let inner = self.inner.lock();
            if inner.token != token {
                tracing::debug!("Discarding superseded position fix");
                return AcquireOutcome::Superseded;
            }
            self.transition(AcquisitionState::Enriching);
        }

        let label = match self
            .geocoder
            .reverse(position.latitude, position.longitude)
            .await
        {
            Ok(label) if !label.trim().is_empty() => label,
            Ok(_) => {
                tracing::warn!("Reverse geocoder returned an empty label");
                self.fallback_label.clone()
            }
            Err(e) => {
                let err = LocationError::EnrichmentFailure(e.to_string());
                tracing::warn!("{}; using '{}'", err, self.fallback_label);
                self.fallback_label.clone()
            }
        };

        let inner = self.inner.lock();
        if inner.token != token {
            tracing::debug!("Discarding superseded location '{}'", label);
            return AcquireOutcome::Superseded;
        }

        let location = match self
            .store
            .set(position.latitude, position.longitude, &label)
        {
            Ok(location) => location,
            Err(e) => {
                tracing::warn!("{}; keeping location for this session", e);
                let location = Location {
                    latitude: position.latitude,
                    longitude: position.longitude,
                    label,
                };
                self.store.set_session_only(location.clone());
                location
            }
        };

        self.transition(AcquisitionState::Resolved);
        tracing::info!(
            "Location resolved: {} ({}, {})",
            location.label,
            location.latitude,
            location.longitude
        );
        drop(inner);
        AcquireOutcome::Resolved(location)
    }

    fn fail(&self, token: u64, error: LocationError, next: AcquisitionState) -> AcquireOutcome {
        let mut inner = self.inner.lock();
        if inner.token != token {
            tracing::debug!("Discarding superseded failure: {}", error);
            return AcquireOutcome::Superseded;
        }

        inner.last_error = Some(error.clone());
        self.transition(next);
        match next {
            AcquisitionState::Unsupported => AcquireOutcome::Unsupported,
            _ => AcquireOutcome::Denied(error),
        }
    }

    /// Move to `next` if the edge is legal. Callers hold the inner lock.
    fn transition(&self, next: AcquisitionState) -> bool {
        let current = self.state();
        if current == next && next != AcquisitionState::Requesting {
            return true;
        }
        if !current.can_transition_to(next) {
            tracing::warn!("Ignoring illegal location state change {} -> {}", current, next);
            return false;
        }

        self.state.send_replace(next);
        tracing::info!("Location state {} -> {}", current, next);
        true
    }
}
