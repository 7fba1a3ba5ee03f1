//! The single authoritative location, mirrored to durable storage.
//!
//! Every successful write lands in storage before the in-memory value and
//! its subscribers see it, so there is no observable point where the two
//! disagree after a call returns.

use std::sync::Arc;

use parking_lot::Mutex;
use pulse_core::LocationError;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::storage::{LocationStorage, MemoryStorage};
use crate::types::{validate_coordinates, Location};

/// Key under which the location record is persisted.
pub const STORAGE_KEY: &str = "citypulse_user_location";

/// On-disk shape: `{"center": [lat, lon], "cityName": "..."}`.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedRecord {
    center: [f64; 2],
    #[serde(rename = "cityName")]
    city_name: String,
}

/// Encode a location as a persisted record.
fn encode_record(location: &Location) -> Result<String, LocationError> {
    let record = PersistedRecord {
        center: [location.latitude, location.longitude],
        city_name: location.label.clone(),
    };
    serde_json::to_string(&record).map_err(|e| LocationError::Storage(e.to_string()))
}

/// Strictly decode a persisted record.
///
/// Shape mismatches, out-of-range coordinates and the unset sentinel are all
/// reported as corruption.
fn decode_record(raw: &str) -> Result<Location, LocationError> {
    let record: PersistedRecord =
        serde_json::from_str(raw).map_err(|e| LocationError::StorageCorruption(e.to_string()))?;

    let [latitude, longitude] = record.center;
    let location = Location::new(latitude, longitude, record.city_name)
        .map_err(|e| LocationError::StorageCorruption(e.to_string()))?;

    if !location.is_valid() {
        return Err(LocationError::StorageCorruption(
            "persisted sentinel location".to_string(),
        ));
    }
    Ok(location)
}

struct StoreInner {
    storage: Arc<dyn LocationStorage>,
    current: watch::Sender<Location>,
    // Serializes writers so storage and memory are updated as one step
    write_lock: Mutex<()>,
}

/// Observable location store. Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct LocationStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for LocationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationStore")
            .field("current", &*self.inner.current.borrow())
            .finish()
    }
}

impl LocationStore {
    /// Create a store over `storage`. The in-memory value starts unset;
    /// call [`LocationStore::restore`] to adopt a persisted record.
    pub fn new(storage: Arc<dyn LocationStorage>) -> Self {
        let (current, _) = watch::channel(Location::UNSET);
        Self {
            inner: Arc::new(StoreInner {
                storage,
                current,
                write_lock: Mutex::new(()),
            }),
        }
    }

    /// Store backed by [`MemoryStorage`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Read and strictly decode the persisted record.
    ///
    /// Absent, unreadable or malformed records all yield `None`.
    pub fn load(&self) -> Option<Location> {
        let raw = match self.inner.storage.read(STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to read persisted location: {}", e);
                return None;
            }
        };

        match decode_record(&raw) {
            Ok(location) => Some(location),
            Err(e) => {
                tracing::warn!("Ignoring persisted location: {}", e);
                None
            }
        }
    }

    /// Adopt the persisted record into memory. Returns whether one was found.
    pub fn restore(&self) -> bool {
        match self.load() {
            Some(location) => {
                tracing::info!(
                    "Restored location {} ({}, {})",
                    location.display_label(),
                    location.latitude,
                    location.longitude
                );
                self.publish(location);
                true
            }
            None => false,
        }
    }

    /// Current in-memory location (the sentinel until set or restored).
    pub fn get(&self) -> Location {
        self.inner.current.borrow().clone()
    }

    pub fn is_valid(&self) -> bool {
        self.inner.current.borrow().is_valid()
    }

    /// Validate and write a location to storage, then memory.
    ///
    /// # Errors
    ///
    /// `InvalidCoordinates` for out-of-range input and `Storage` when the
    /// durable write fails. Neither mutates state.
    pub fn set(&self, latitude: f64, longitude: f64, label: &str) -> Result<Location, LocationError> {
        validate_coordinates(latitude, longitude)?;
        let location = Location {
            latitude,
            longitude,
            label: label.to_string(),
        };
        let encoded = encode_record(&location)?;

        let _guard = self.inner.write_lock.lock();
        self.inner
            .storage
            .write(STORAGE_KEY, &encoded)
            .map_err(|e| LocationError::Storage(e.to_string()))?;
        self.publish(location.clone());

        tracing::debug!("Location set to {} ({}, {})", label, latitude, longitude);
        Ok(location)
    }

    /// Update memory only. Used when durable storage is failing so the
    /// session can continue; the next boot will re-acquire.
    pub(crate) fn set_session_only(&self, location: Location) {
        let _guard = self.inner.write_lock.lock();
        self.publish(location);
    }

    /// Remove the persisted record and reset memory to the sentinel.
    ///
    /// # Errors
    ///
    /// `Storage` when the durable record could not be removed. Memory is
    /// reset regardless.
    pub fn clear(&self) -> Result<(), LocationError> {
        let _guard = self.inner.write_lock.lock();
        let removed = self
            .inner
            .storage
            .remove(STORAGE_KEY)
            .map_err(|e| LocationError::Storage(e.to_string()));
        self.publish(Location::UNSET);
        removed
    }

    /// Receive a notification on every change of the current location.
    pub fn subscribe(&self) -> watch::Receiver<Location> {
        self.inner.current.subscribe()
    }

    fn publish(&self, location: Location) {
        self.inner.current.send_if_modified(|current| {
            if *current == location {
                false
            } else {
                *current = location;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStorage, StorageError};

    struct FailingStorage;

    impl LocationStorage for FailingStorage {
        fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(std::io::Error::other("disk gone").into())
        }
        fn write(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(std::io::Error::other("disk gone").into())
        }
        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(std::io::Error::other("disk gone").into())
        }
    }

    fn store_with_record(raw: &str) -> LocationStore {
        LocationStore::new(Arc::new(MemoryStorage::with_record(STORAGE_KEY, raw)))
    }

    #[test]
    fn test_defaults_to_sentinel() {
        let store = LocationStore::in_memory();
        assert_eq!(store.get(), Location::UNSET);
        assert!(!store.is_valid());
        assert!(store.load().is_none());
    }

    #[test]
    fn test_set_then_reload_returns_same_triple() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FileStorage::new(dir.path()));

        let store = LocationStore::new(storage.clone());
        store.set(51.5074, -0.1278, "London").unwrap();
        assert!(store.is_valid());

        // A fresh store over the same directory simulates a reload
        let reloaded = LocationStore::new(storage);
        let loc = reloaded.load().unwrap();
        assert_eq!(loc.latitude, 51.5074);
        assert_eq!(loc.longitude, -0.1278);
        assert_eq!(loc.label, "London");

        assert!(reloaded.restore());
        assert_eq!(reloaded.get(), store.get());
    }

    #[test]
    fn test_reload_preserves_full_precision_coordinates() {
        let storage: Arc<dyn LocationStorage> = Arc::new(MemoryStorage::new());
        let store = LocationStore::new(storage.clone());
        let reloaded = LocationStore::new(storage);

        let fixed = [
            (41.356146060000015, -108.41131800000001),
            (-33.868819999999996, 151.20929000000001),
            (89.99999999999999, -179.99999999999997),
        ];
        // xorshift64 so the sweep is reproducible
        let mut seed: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut next = || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            (seed >> 11) as f64 / (1u64 << 53) as f64
        };
        let sweep = (0..20_000).map(|_| (next() * 180.0 - 90.0, next() * 360.0 - 180.0));

        for (lat, lon) in fixed.into_iter().chain(sweep) {
            if lat == 0.0 && lon == 0.0 {
                continue;
            }
            store.set(lat, lon, "X").unwrap();
            let loc = reloaded.load().unwrap();
            assert_eq!(
                (loc.latitude.to_bits(), loc.longitude.to_bits()),
                (lat.to_bits(), lon.to_bits()),
                "({}, {}) came back as ({}, {})",
                lat,
                lon,
                loc.latitude,
                loc.longitude
            );
        }
    }

    #[test]
    fn test_set_rejects_out_of_range_without_mutation() {
        let store = LocationStore::in_memory();
        store.set(10.0, 20.0, "Somewhere").unwrap();

        let err = store.set(91.0, 0.0, "Nowhere").unwrap_err();
        assert!(matches!(err, LocationError::InvalidCoordinates { .. }));
        assert_eq!(store.get().label, "Somewhere");
        assert_eq!(store.load().unwrap().label, "Somewhere");
    }

    #[test]
    fn test_set_is_idempotent_and_notifies_once() {
        let store = LocationStore::in_memory();
        let mut rx = store.subscribe();

        store.set(1.0, 2.0, "A").unwrap();
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        store.set(1.0, 2.0, "A").unwrap();
        assert!(!rx.has_changed().unwrap());
        assert_eq!(store.get(), Location::new(1.0, 2.0, "A").unwrap());
    }

    #[test]
    fn test_clear_resets_memory_and_storage() {
        let store = LocationStore::in_memory();
        store.set(48.8566, 2.3522, "Paris").unwrap();

        store.clear().unwrap();
        assert!(!store.is_valid());
        assert_eq!(store.get(), Location::UNSET);
        assert!(store.load().is_none());
    }

    #[test]
    fn test_storage_write_failure_leaves_state_untouched() {
        let store = LocationStore::new(Arc::new(FailingStorage));
        let err = store.set(1.0, 1.0, "x").unwrap_err();
        assert!(matches!(err, LocationError::Storage(_)));
        assert!(!store.is_valid());
    }

    #[test]
    fn test_clear_resets_memory_even_if_storage_fails() {
        let store = LocationStore::new(Arc::new(FailingStorage));
        store.set_session_only(Location::new(1.0, 1.0, "x").unwrap());

        assert!(store.clear().is_err());
        assert!(!store.is_valid());
    }

    #[test]
    fn test_unreadable_storage_loads_none() {
        let store = LocationStore::new(Arc::new(FailingStorage));
        assert!(store.load().is_none());
        assert!(!store.restore());
    }

    #[test]
    fn test_accepts_legacy_record_shape() {
        let store = store_with_record(r#"{"center":[40.712,-74.006],"cityName":"New York"}"#);
        let loc = store.load().unwrap();
        assert_eq!(loc, Location::new(40.712, -74.006, "New York").unwrap());
    }

    #[test]
    fn test_corrupt_records_load_as_none() {
        let corrupt = [
            "not json",
            "{}",
            r#"{"center":[1.0],"cityName":"x"}"#,
            r#"{"center":[1.0,2.0,3.0],"cityName":"x"}"#,
            r#"{"center":["1","2"],"cityName":"x"}"#,
            r#"{"center":[1.0,2.0]}"#,
            r#"{"center":[1.0,2.0],"cityName":7}"#,
            r#"{"center":[120.0,2.0],"cityName":"x"}"#,
            r#"{"center":[0.0,0.0],"cityName":""}"#,
            r#"[51.5,-0.1]"#,
        ];
        for raw in corrupt {
            let store = store_with_record(raw);
            assert!(store.load().is_none(), "accepted corrupt record {}", raw);
            assert!(!store.restore());
        }
    }

    #[test]
    fn test_clones_share_state() {
        let store = LocationStore::in_memory();
        let handle = store.clone();
        store.set(3.0, 4.0, "Shared").unwrap();
        assert_eq!(handle.get().label, "Shared");
    }
}
