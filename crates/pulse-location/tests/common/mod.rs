//! Scriptable platform and geocoder doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pulse_location::{
    GeoPlatform, GeocodeError, LocationStorage, Position, PositionError, PositionOptions,
    ReverseGeocoder, StorageError,
};
use tokio::sync::oneshot;

type FixResult = Result<Position, PositionError>;

enum Reply<T> {
    Ready(T),
    Deferred(oneshot::Receiver<T>),
    Never,
}

/// Platform whose answers are queued by the test. Clones share state.
#[derive(Clone)]
pub struct MockPlatform {
    supported: bool,
    calls: Arc<AtomicUsize>,
    replies: Arc<Mutex<VecDeque<Reply<FixResult>>>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            supported: true,
            calls: Arc::new(AtomicUsize::new(0)),
            replies: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    pub fn grant(&self, latitude: f64, longitude: f64) -> &Self {
        self.replies
            .lock()
            .push_back(Reply::Ready(Ok(Position::new(latitude, longitude))));
        self
    }

    pub fn fail(&self, error: PositionError) -> &Self {
        self.replies.lock().push_back(Reply::Ready(Err(error)));
        self
    }

    /// Queue a reply the test settles later through the returned sender.
    pub fn deferred(&self) -> oneshot::Sender<FixResult> {
        let (tx, rx) = oneshot::channel();
        self.replies.lock().push_back(Reply::Deferred(rx));
        tx
    }

    /// Queue a reply that never settles.
    pub fn hang(&self) -> &Self {
        self.replies.lock().push_back(Reply::Never);
        self
    }

    /// Number of platform prompts issued so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn wait_for_calls(&self, n: usize) {
        wait_until(|| self.calls() >= n).await;
    }
}

impl GeoPlatform for MockPlatform {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> impl Future<Output = FixResult> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().pop_front().unwrap_or(Reply::Never);
        async move {
            match reply {
                Reply::Ready(result) => result,
                Reply::Deferred(rx) => rx.await.unwrap_or(Err(PositionError::PositionUnavailable)),
                Reply::Never => std::future::pending().await,
            }
        }
    }
}

/// Reverse geocoder whose answers are queued by the test. Clones share state.
#[derive(Clone)]
pub struct MockGeocoder {
    calls: Arc<AtomicUsize>,
    replies: Arc<Mutex<VecDeque<Reply<Result<String, u16>>>>>,
}

impl MockGeocoder {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            replies: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn label(&self, label: &str) -> &Self {
        self.replies
            .lock()
            .push_back(Reply::Ready(Ok(label.to_string())));
        self
    }

    /// Queue a failure reported as the given HTTP status.
    pub fn fail(&self, status: u16) -> &Self {
        self.replies.lock().push_back(Reply::Ready(Err(status)));
        self
    }

    pub fn deferred(&self) -> oneshot::Sender<Result<String, u16>> {
        let (tx, rx) = oneshot::channel();
        self.replies.lock().push_back(Reply::Deferred(rx));
        tx
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn wait_for_calls(&self, n: usize) {
        wait_until(|| self.calls() >= n).await;
    }
}

impl ReverseGeocoder for MockGeocoder {
    fn reverse(
        &self,
        _latitude: f64,
        _longitude: f64,
    ) -> impl Future<Output = Result<String, GeocodeError>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().pop_front();
        async move {
            let result = match reply {
                Some(Reply::Ready(result)) => result,
                Some(Reply::Deferred(rx)) => rx.await.unwrap_or(Err(503)),
                Some(Reply::Never) => std::future::pending().await,
                None => Err(503),
            };
            result.map_err(GeocodeError::Status)
        }
    }
}

/// Storage that fails every operation.
pub struct BrokenStorage;

impl LocationStorage for BrokenStorage {
    fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(std::io::Error::other("read-only filesystem").into())
    }

    fn write(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(std::io::Error::other("read-only filesystem").into())
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(std::io::Error::other("read-only filesystem").into())
    }
}

/// Yield to the runtime until `condition` holds, failing after a second.
pub async fn wait_until(condition: impl Fn() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not reached in time");
}
