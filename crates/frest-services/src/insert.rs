//! Blocking content insertion.
//!
//! [`InsertCoordinator::submit`] hands a block to the network client and
//! returns immediately with an [`InsertOperation`]. The client reports back
//! through an [`InsertCallback`] on its own thread; the callback feeds a
//! completion cell that the operation blocks on.
//!
//! ```text
//! submit ──▶ client.insert(block, cb) ──▶ InsertOperation
//!                    │                         │ wait()
//!                    ▼                         ▼
//!          cb.on_success / on_failure ──▶ Completer ──▶ Outcome
//!                                              ▲
//!              InsertCanceller::cancel ────────┘
//! ```
//!
//! Whichever of success, failure or cancellation reaches the cell first
//! wins. The staged payload is released inside that winning transition, so
//! it is released exactly once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use frest_network::{
    ClientMetadata, InsertBlock, NetworkClient, NetworkError, NetworkUri, Priority, PutCallback,
    PutHandle,
};
use frest_sync::{channel, Completer, OperationHandle, Outcome, TerminalState};
use thiserror::Error;
use tracing::{debug, info, warn};

// =============================================================================
// Request
// =============================================================================

/// Query values that switch the realtime queue on.
const REALTIME_TRUTHY: [&str; 3] = ["1", "true", "yes"];

/// Parse the `realtime` query parameter. Absent or unknown values are false.
pub fn parse_realtime(param: Option<&str>) -> bool {
    param
        .map(str::trim)
        .is_some_and(|value| REALTIME_TRUTHY.iter().any(|t| value.eq_ignore_ascii_case(t)))
}

/// One content insertion as requested by a client.
#[derive(Clone, Debug)]
pub struct InsertRequest {
    /// Key part of the target, e.g. `KSK@test` or an SSK insert key
    pub key: String,
    /// Document name under the key, may be empty
    pub filename: String,
    /// MIME type to attach
    pub content_type: Option<String>,
    /// Content
    pub data: Bytes,
    /// Scheduling class
    pub priority: Priority,
    /// Use the low latency queue
    pub realtime: bool,
}

impl InsertRequest {
    /// Request with default priority and no realtime flag.
    pub fn new(key: impl Into<String>, filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            filename: filename.into(),
            content_type: None,
            data: data.into(),
            priority: Priority::default(),
            realtime: false,
        }
    }

    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// `key/filename`, the URI the content is inserted under.
    pub fn target_uri(&self) -> String {
        format!("{}/{}", self.key.trim_end_matches('/'), self.filename)
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Why an insert did not produce a URI.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InsertError {
    /// Target key could not be parsed
    #[error("invalid insert target: {0}")]
    InvalidTarget(NetworkError),

    /// Client refused to schedule the put
    #[error("Insert failed {0}")]
    Submit(NetworkError),

    /// Network reported a failure
    #[error("Insert failed {0}")]
    Failed(NetworkError),

    /// Operation was cancelled before it completed
    #[error("Insert was cancelled")]
    Cancelled,

    /// No outcome within the configured bound; the put was cancelled
    #[error("Insert timed out after {0:?}")]
    TimedOut(Duration),
}

// =============================================================================
// Staged payload
// =============================================================================

/// The coordinator's reference to the content of an in-flight insert.
pub struct StagedPayload {
    data: Mutex<Option<Bytes>>,
    size: usize,
    releases: AtomicUsize,
}

impl StagedPayload {
    fn new(data: Bytes) -> Self {
        Self {
            size: data.len(),
            data: Mutex::new(Some(data)),
            releases: AtomicUsize::new(0),
        }
    }

    /// Size in bytes of the staged content.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the content has been released.
    pub fn is_released(&self) -> bool {
        self.data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// How many times release was requested. One after any terminal outcome.
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        let released = self
            .data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if released.is_none() {
            warn!(size = self.size, "staged payload released twice");
        }
    }
}

impl core::fmt::Debug for StagedPayload {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StagedPayload")
            .field("size", &self.size)
            .field("released", &self.is_released())
            .finish()
    }
}

// =============================================================================
// Callback
// =============================================================================

/// Adapts client callbacks onto the operation's completion cell.
pub struct InsertCallback {
    completer: Completer<NetworkUri, NetworkError>,
    payload: Arc<StagedPayload>,
    target: NetworkUri,
    realtime: bool,
}

impl InsertCallback {
    fn finish(&self, outcome: Outcome<NetworkUri, NetworkError>) {
        let state = outcome.state();
        let payload = &self.payload;
        if !self.completer.complete_with(outcome, || payload.release()) {
            debug!(
                target_uri = %self.target,
                state = %state,
                current = %self.completer.state(),
                "late insert callback ignored"
            );
        }
    }
}

impl PutCallback for InsertCallback {
    fn on_generated_uri(&self, uri: &NetworkUri) {
        debug!(target_uri = %self.target, uri = %uri, "generated URI");
    }

    fn on_success(&self, uri: NetworkUri) {
        self.finish(Outcome::Succeeded(uri));
    }

    fn on_failure(&self, error: NetworkError) {
        self.finish(Outcome::Failed(error));
    }

    fn persistent(&self) -> bool {
        false
    }

    fn realtime(&self) -> bool {
        self.realtime
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// Submits inserts to a network client.
#[derive(Clone)]
pub struct InsertCoordinator {
    client: Arc<dyn NetworkClient>,
}

impl InsertCoordinator {
    pub fn new(client: Arc<dyn NetworkClient>) -> Self {
        Self { client }
    }

    /// Start an insert. Never blocks on the network.
    pub fn submit(&self, request: InsertRequest) -> Result<InsertOperation, InsertError> {
        let target =
            NetworkUri::parse(&request.target_uri()).map_err(InsertError::InvalidTarget)?;
        let payload = Arc::new(StagedPayload::new(request.data.clone()));
        let (completer, handle) = channel();

        let callback = Arc::new(InsertCallback {
            completer: completer.clone(),
            payload: Arc::clone(&payload),
            target: target.clone(),
            realtime: request.realtime,
        });
        let block = InsertBlock::new(
            request.data,
            ClientMetadata::new(request.content_type.as_deref()),
            target.clone(),
        );

        info!(
            target_uri = %target,
            priority = %request.priority,
            realtime = request.realtime,
            size = payload.size(),
            "insert submitted"
        );

        let put = match self.client.insert(block, request.priority, callback) {
            Ok(put) => put,
            Err(error) => {
                warn!(target_uri = %target, error = %error, "insert not scheduled");
                payload.release();
                return Err(InsertError::Submit(error));
            }
        };

        Ok(InsertOperation {
            handle,
            canceller: InsertCanceller {
                completer,
                put,
                payload,
            },
            target,
        })
    }
}

impl core::fmt::Debug for InsertCoordinator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InsertCoordinator").finish_non_exhaustive()
    }
}

/// Cancels an in-flight insert. Cloneable so another thread can hold it.
#[derive(Clone)]
pub struct InsertCanceller {
    completer: Completer<NetworkUri, NetworkError>,
    put: Arc<dyn PutHandle>,
    payload: Arc<StagedPayload>,
}

impl InsertCanceller {
    /// Cancel the put if it has not reached a terminal state.
    ///
    /// The client is told to stop and the payload is released before the
    /// operation is marked cancelled. Returns whether this call won.
    pub fn cancel(&self) -> bool {
        let put = &self.put;
        let payload = &self.payload;
        self.completer.complete_with(Outcome::Cancelled, || {
            put.cancel();
            payload.release();
        })
    }
}

/// An insert in flight.
pub struct InsertOperation {
    handle: OperationHandle<NetworkUri, NetworkError>,
    canceller: InsertCanceller,
    target: NetworkUri,
}

impl InsertOperation {
    /// URI the content was submitted under.
    pub fn target(&self) -> &NetworkUri {
        &self.target
    }

    pub fn state(&self) -> TerminalState {
        self.handle.state()
    }

    /// The staged content of this insert.
    pub fn payload(&self) -> Arc<StagedPayload> {
        Arc::clone(&self.canceller.payload)
    }

    pub fn canceller(&self) -> InsertCanceller {
        self.canceller.clone()
    }

    /// See [`InsertCanceller::cancel`].
    pub fn cancel(&self) -> bool {
        self.canceller.cancel()
    }

    /// Block until the insert reaches a terminal state.
    ///
    /// With `Some(timeout)` the insert is cancelled once the bound passes
    /// and [`InsertError::TimedOut`] is returned. If the insert completes
    /// while being cancelled, its real outcome is returned instead.
    pub fn wait(self, timeout: Option<Duration>) -> Result<NetworkUri, InsertError> {
        let outcome = match timeout {
            None => self.handle.wait(),
            Some(timeout) => match self.handle.wait_timeout(timeout) {
                Ok(outcome) => outcome,
                Err(handle) => {
                    if self.canceller.cancel() {
                        warn!(target_uri = %self.target, ?timeout, "insert timed out");
                        return Err(InsertError::TimedOut(timeout));
                    }
                    handle.wait()
                }
            },
        };

        match outcome {
            Outcome::Succeeded(uri) => {
                info!(target_uri = %self.target, uri = %uri, "insert succeeded");
                Ok(uri)
            }
            Outcome::Failed(error) => {
                if error.is_transient() {
                    info!(target_uri = %self.target, error = %error, "insert failed");
                } else {
                    warn!(target_uri = %self.target, error = %error, "insert failed");
                }
                Err(InsertError::Failed(error))
            }
            Outcome::Cancelled => {
                info!(target_uri = %self.target, "insert cancelled");
                Err(InsertError::Cancelled)
            }
        }
    }
}

impl core::fmt::Debug for InsertOperation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InsertOperation")
            .field("target", &self.target)
            .field("state", &self.state())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use frest_network::LocalNetwork;
    use std::sync::Barrier;
    use std::thread;

    /// Client that parks callbacks so tests decide when they fire.
    #[derive(Default)]
    struct ManualClient {
        callbacks: Mutex<Vec<Arc<dyn PutCallback>>>,
        cancels: Arc<AtomicUsize>,
        reject: Option<NetworkError>,
    }

    impl ManualClient {
        fn last_callback(&self) -> Arc<dyn PutCallback> {
            self.callbacks.lock().unwrap().last().cloned().unwrap()
        }
    }

    struct CountingPut(Arc<AtomicUsize>);

    impl PutHandle for CountingPut {
        fn cancel(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl NetworkClient for ManualClient {
        fn insert(
            &self,
            _block: InsertBlock,
            _priority: Priority,
            callback: Arc<dyn PutCallback>,
        ) -> Result<Arc<dyn PutHandle>, NetworkError> {
            if let Some(error) = &self.reject {
                return Err(error.clone());
            }
            self.callbacks.lock().unwrap().push(callback);
            Ok(Arc::new(CountingPut(Arc::clone(&self.cancels))))
        }
    }

    fn ksk_request() -> InsertRequest {
        InsertRequest::new("KSK@test", "a.txt", &b"hi"[..])
            .with_content_type(Some("text/plain".to_string()))
    }

    #[test]
    fn test_parse_realtime() {
        assert!(parse_realtime(Some("1")));
        assert!(parse_realtime(Some("TRUE")));
        assert!(parse_realtime(Some("Yes")));
        assert!(!parse_realtime(Some("")));
        assert!(!parse_realtime(Some("0")));
        assert!(!parse_realtime(Some("on")));
        assert!(!parse_realtime(None));
    }

    #[test]
    fn test_target_uri_joins_key_and_filename() {
        assert_eq!(ksk_request().target_uri(), "KSK@test/a.txt");
        assert_eq!(
            InsertRequest::new("CHK@", "a.txt", Bytes::new()).target_uri(),
            "CHK@/a.txt"
        );
        assert_eq!(
            InsertRequest::new("KSK@test/", "", Bytes::new()).target_uri(),
            "KSK@test/"
        );
    }

    #[test]
    fn test_request_defaults() {
        let request = InsertRequest::new("KSK@a", "", Bytes::new());
        assert_eq!(request.priority, Priority::INTERACTIVE);
        assert!(!request.realtime);
        assert!(request.content_type.is_none());
    }

    #[test]
    fn test_insert_succeeds_on_local_network() {
        let network = Arc::new(LocalNetwork::new());
        let coordinator = InsertCoordinator::new(network.clone());

        let operation = coordinator
            .submit(ksk_request().with_realtime(true))
            .unwrap();
        let payload = operation.payload();
        let uri = operation.wait(None).unwrap();

        assert_eq!(uri.to_string(), "KSK@test/a.txt");
        assert_eq!(payload.release_count(), 1);
        assert!(payload.is_released());

        let stored = network.fetch("KSK@test/a.txt").unwrap();
        assert_eq!(stored.content_type, "text/plain");
        assert!(stored.realtime);
        assert_eq!(stored.priority, Priority::INTERACTIVE);
    }

    #[test]
    fn test_insert_failure_is_surfaced_verbatim() {
        let network = Arc::new(LocalNetwork::new());
        network.fail_next_insert(NetworkError::RouteNotFound);
        let coordinator = InsertCoordinator::new(network);

        let operation = coordinator.submit(ksk_request()).unwrap();
        let payload = operation.payload();
        let error = operation.wait(None).unwrap_err();

        assert_eq!(error, InsertError::Failed(NetworkError::RouteNotFound));
        assert_eq!(error.to_string(), "Insert failed route not found");
        assert_eq!(payload.release_count(), 1);
    }

    #[test]
    fn test_invalid_target() {
        let coordinator = InsertCoordinator::new(Arc::new(LocalNetwork::new()));
        let error = coordinator
            .submit(InsertRequest::new("nokey", "a", Bytes::new()))
            .unwrap_err();
        assert!(matches!(error, InsertError::InvalidTarget(_)));
    }

    #[test]
    fn test_rejected_submission_releases_payload() {
        let client = Arc::new(ManualClient {
            reject: Some(NetworkError::RejectedOverload),
            ..Default::default()
        });
        let coordinator = InsertCoordinator::new(client.clone());
        let error = coordinator.submit(ksk_request()).unwrap_err();
        assert_eq!(error, InsertError::Submit(NetworkError::RejectedOverload));
        assert!(client.callbacks.lock().unwrap().is_empty());
    }

    #[test]
    fn test_success_then_failure_keeps_success() {
        let client = Arc::new(ManualClient::default());
        let coordinator = InsertCoordinator::new(client.clone());
        let operation = coordinator.submit(ksk_request()).unwrap();
        let payload = operation.payload();

        let callback = client.last_callback();
        let uri = NetworkUri::parse("KSK@test/a.txt").unwrap();
        callback.on_success(uri.clone());
        callback.on_failure(NetworkError::RouteNotFound);

        assert_eq!(operation.state(), TerminalState::Succeeded);
        assert_eq!(operation.wait(None).unwrap(), uri);
        assert_eq!(payload.release_count(), 1);
    }

    #[test]
    fn test_callback_before_wait_is_not_lost() {
        let client = Arc::new(ManualClient::default());
        let coordinator = InsertCoordinator::new(client.clone());
        let operation = coordinator.submit(ksk_request()).unwrap();

        client
            .last_callback()
            .on_failure(NetworkError::Collision("KSK@test/a.txt".into()));
        thread::sleep(Duration::from_millis(10));

        assert!(matches!(
            operation.wait(None),
            Err(InsertError::Failed(NetworkError::Collision(_)))
        ));
    }

    #[test]
    fn test_callback_exposes_flags() {
        let client = Arc::new(ManualClient::default());
        let coordinator = InsertCoordinator::new(client.clone());
        let _operation = coordinator.submit(ksk_request().with_realtime(true)).unwrap();

        let callback = client.last_callback();
        assert!(callback.realtime());
        assert!(!callback.persistent());
    }

    #[test]
    fn test_cancel_stops_put_and_releases() {
        let client = Arc::new(ManualClient::default());
        let coordinator = InsertCoordinator::new(client.clone());
        let operation = coordinator.submit(ksk_request()).unwrap();
        let payload = operation.payload();

        assert!(operation.cancel());
        assert!(!operation.cancel());
        assert_eq!(client.cancels.load(Ordering::SeqCst), 1);

        // Client still reports the put as failed afterwards.
        client.last_callback().on_failure(NetworkError::Cancelled);

        assert_eq!(operation.wait(None), Err(InsertError::Cancelled));
        assert_eq!(payload.release_count(), 1);
    }

    #[test]
    fn test_cancel_from_other_thread_wakes_waiter() {
        let network = Arc::new(LocalNetwork::with_delay(Duration::from_secs(30)));
        let coordinator = InsertCoordinator::new(network.clone());
        let operation = coordinator.submit(ksk_request()).unwrap();
        let canceller = operation.canceller();

        let cancel_thread = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            canceller.cancel()
        });

        assert_eq!(operation.wait(None), Err(InsertError::Cancelled));
        assert!(cancel_thread.join().unwrap());
        assert!(network.fetch("KSK@test/a.txt").is_none());
    }

    #[test]
    fn test_wait_timeout_cancels_insert() {
        let client = Arc::new(ManualClient::default());
        let coordinator = InsertCoordinator::new(client.clone());
        let operation = coordinator.submit(ksk_request()).unwrap();
        let payload = operation.payload();

        let timeout = Duration::from_millis(20);
        assert_eq!(
            operation.wait(Some(timeout)),
            Err(InsertError::TimedOut(timeout))
        );
        assert_eq!(client.cancels.load(Ordering::SeqCst), 1);
        assert_eq!(payload.release_count(), 1);
    }

    #[test]
    fn test_wait_timeout_returns_completed_outcome() {
        let coordinator = InsertCoordinator::new(Arc::new(LocalNetwork::new()));
        let operation = coordinator.submit(ksk_request()).unwrap();
        let uri = operation.wait(Some(Duration::from_secs(5))).unwrap();
        assert_eq!(uri.to_string(), "KSK@test/a.txt");
    }

    #[test]
    fn test_cancel_races_success() {
        for _ in 0..500 {
            let client = Arc::new(ManualClient::default());
            let coordinator = InsertCoordinator::new(client.clone());
            let operation = coordinator.submit(ksk_request()).unwrap();
            let payload = operation.payload();
            let canceller = operation.canceller();
            let callback = client.last_callback();
            let barrier = Arc::new(Barrier::new(2));

            let success_barrier = Arc::clone(&barrier);
            let success = thread::spawn(move || {
                success_barrier.wait();
                callback.on_success(NetworkUri::parse("KSK@test/a.txt").unwrap());
            });

            barrier.wait();
            let cancelled = canceller.cancel();
            success.join().unwrap();

            match operation.wait(None) {
                Ok(_) => assert!(!cancelled),
                Err(InsertError::Cancelled) => {
                    assert!(cancelled);
                    assert_eq!(client.cancels.load(Ordering::SeqCst), 1);
                }
                Err(other) => panic!("unexpected outcome: {other}"),
            }
            assert_eq!(payload.release_count(), 1);
        }
    }
}
