use anyhow::{Context as _, Result};
use std::sync::Arc;

use pulse_core::{Config, LocationError};
use pulse_location::{
    AcquireOutcome, AcquisitionController, FileStorage, GateView, Location, LocationContext,
    LocationSearch, LocationStore, NominatimClient, StaticPlatform,
};

/// Location context as wired for the command-line application
pub type AppContext = LocationContext<StaticPlatform, NominatimClient>;

/// Application state: configuration plus the shared location subsystem
pub struct App {
    config: Arc<Config>,
    context: AppContext,
    search: LocationSearch<NominatimClient>,
}

impl App {
    /// Wire storage, geocoder and platform from configuration
    pub fn new(config: Config) -> Result<Self> {
        let config = Arc::new(config);

        let geocoder = NominatimClient::new(&config.geocoding)
            .context("Failed to create geocoding client")?;
        let storage = FileStorage::new(config.storage_dir());
        tracing::debug!("Location storage at {}", storage.dir().display());

        let store = LocationStore::new(Arc::new(storage));
        let platform = StaticPlatform::from_config(config.location.device_position);
        let controller = AcquisitionController::new(store, platform, geocoder.clone())
            .with_config(&config.location);

        Ok(Self {
            config,
            context: LocationContext::new(controller),
            search: LocationSearch::new(geocoder),
        })
    }

    /// Open the location gate: restore the saved location or acquire one
    pub async fn boot(&self) -> AcquireOutcome {
        let outcome = self.context.controller().boot().await;
        tracing::info!("Gate boot finished: {:?}", outcome);
        outcome
    }

    /// Forget the saved location and acquire a fresh one
    pub async fn reset(&self) -> AcquireOutcome {
        self.context.force_location_request().await
    }

    /// Set the location from a place-name search
    pub async fn search(&self, query: &str) -> Result<Option<Location>, LocationError> {
        self.search.search_and_set(&self.context, query).await
    }

    pub fn gate(&self) -> GateView {
        self.context.gate()
    }

    pub fn location(&self) -> Location {
        self.context.location()
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Get reference to application config
    pub fn config(&self) -> &Config {
        &self.config
    }
}
