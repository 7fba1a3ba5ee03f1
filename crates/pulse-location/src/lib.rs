//! Location subsystem for CityPulse
//!
//! Acquires the device location behind a gate, enriches it with a place
//! name, persists it and shares it with every consumer.

pub mod acquisition;
pub mod consumer;
pub mod gate;
pub mod geocode;
pub mod platform;
pub mod search;
pub mod storage;
pub mod store;
pub mod types;

pub use acquisition::{AcquireOutcome, AcquisitionController, DEFAULT_FALLBACK_LABEL};
pub use consumer::{AlertArea, LocationContext, DEFAULT_ALERT_RADIUS_KM};
pub use gate::GateView;
pub use geocode::{ForwardGeocoder, GeocodeError, NominatimClient, Place, ReverseGeocoder};
pub use platform::{GeoPlatform, StaticPlatform};
pub use search::LocationSearch;
pub use storage::{FileStorage, LocationStorage, MemoryStorage, StorageError};
pub use store::{LocationStore, STORAGE_KEY};
pub use types::*;
