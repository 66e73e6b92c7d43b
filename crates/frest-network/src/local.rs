//! In-memory storage network.
//!
//! Stands in for a real node: each put runs on its own worker thread, waits
//! for an optional simulated latency, stores the block in a map keyed by its
//! request URI and reports through the callback like the real client would.
//!
//! Request URIs are computed the way the network does:
//!
//! - **SSK/USK**: the insert URI's signing key is turned into the routing key
//! - **KSK**: the URI is its own request URI
//! - **CHK**: the key is the hash of the content

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use base64::Engine;
use bytes::Bytes;
use frest_keys::{request_uri_for, NETWORK_BASE64};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::client::{NetworkClient, PutCallback, PutHandle};
use crate::error::NetworkError;
use crate::types::{InsertBlock, NetworkUri, Priority, UriKeyType};

/// A block held by [`LocalNetwork`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredBlock {
    /// Content
    pub data: Bytes,
    /// MIME type from the insert metadata
    pub content_type: String,
    /// Priority the insert ran at
    pub priority: Priority,
    /// Whether the insert used the realtime queue
    pub realtime: bool,
}

#[derive(Default)]
struct Shared {
    store: Mutex<HashMap<String, StoredBlock>>,
    next_failure: Mutex<Option<NetworkError>>,
    completed: AtomicU64,
}

impl Shared {
    fn store_block(
        &self,
        block: InsertBlock,
        priority: Priority,
        realtime: bool,
    ) -> Result<NetworkUri, NetworkError> {
        if let Some(error) = self
            .next_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            return Err(error);
        }

        let resolved = resolve_request_uri(&block)?;
        let key = resolved.to_string();

        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = store.get(&key) {
            if existing.data != block.data {
                return Err(NetworkError::Collision(key));
            }
        }
        store.insert(
            key,
            StoredBlock {
                data: block.data,
                content_type: block.metadata.content_type,
                priority,
                realtime,
            },
        );
        self.completed.fetch_add(1, Ordering::Relaxed);
        Ok(resolved)
    }
}

/// Compute the request URI a block will be reachable under.
fn resolve_request_uri(block: &InsertBlock) -> Result<NetworkUri, NetworkError> {
    match block.target.key_type() {
        UriKeyType::Ssk | UriKeyType::Usk => {
            let request = request_uri_for(&block.target.to_string())
                .map_err(|e| NetworkError::InvalidUri(e.to_string()))?;
            NetworkUri::parse(&request)
        }
        UriKeyType::Ksk => Ok(block.target.clone()),
        UriKeyType::Chk => {
            let hash = NETWORK_BASE64.encode(Sha256::digest(&block.data[..]));
            let doc_name = block.target.doc_name();
            if doc_name.is_empty() {
                NetworkUri::parse(&format!("CHK@{}", hash))
            } else {
                NetworkUri::parse(&format!("CHK@{}/{}", hash, doc_name))
            }
        }
    }
}

#[derive(Default)]
struct LocalPut {
    cancelled: Mutex<bool>,
    signal: Condvar,
}

impl LocalPut {
    /// Sleep for `delay` unless cancelled first. Returns whether cancelled.
    fn wait_cancelled(&self, delay: Duration) -> bool {
        let cancelled = self.cancelled.lock().unwrap_or_else(PoisonError::into_inner);
        let (cancelled, _) = self
            .signal
            .wait_timeout_while(cancelled, delay, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled
    }
}

impl PutHandle for LocalPut {
    fn cancel(&self) {
        *self.cancelled.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.signal.notify_all();
    }
}

/// In-memory [`NetworkClient`].
#[derive(Clone, Default)]
pub struct LocalNetwork {
    shared: Arc<Shared>,
    delay: Duration,
}

impl LocalNetwork {
    /// Network that completes puts as soon as their worker runs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Network that holds every put for `delay` before completing it.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            shared: Arc::default(),
            delay,
        }
    }

    /// Make the next put that reaches the store fail with `error`.
    pub fn fail_next_insert(&self, error: NetworkError) {
        *self
            .shared
            .next_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    /// Look up a block by request URI.
    pub fn fetch(&self, request_uri: &str) -> Option<StoredBlock> {
        self.shared
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(request_uri)
            .cloned()
    }

    /// Number of puts that completed successfully.
    pub fn completed_inserts(&self) -> u64 {
        self.shared.completed.load(Ordering::Relaxed)
    }
}

impl core::fmt::Debug for LocalNetwork {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LocalNetwork")
            .field("delay", &self.delay)
            .field("completed_inserts", &self.completed_inserts())
            .finish()
    }
}

impl NetworkClient for LocalNetwork {
    fn insert(
        &self,
        block: InsertBlock,
        priority: Priority,
        callback: Arc<dyn PutCallback>,
    ) -> Result<Arc<dyn PutHandle>, NetworkError> {
        if callback.persistent() {
            return Err(NetworkError::NotSupported(
                "persistent inserts".to_string(),
            ));
        }

        let put = Arc::new(LocalPut::default());
        let worker_put = Arc::clone(&put);
        let shared = Arc::clone(&self.shared);
        let delay = self.delay;

        thread::Builder::new()
            .name("local-insert".to_string())
            .spawn(move || {
                if worker_put.wait_cancelled(delay) {
                    debug!(target_uri = %block.target, "local insert cancelled");
                    callback.on_failure(NetworkError::Cancelled);
                    return;
                }
                let realtime = callback.realtime();
                match shared.store_block(block, priority, realtime) {
                    Ok(uri) => {
                        callback.on_generated_uri(&uri);
                        callback.on_success(uri);
                    }
                    Err(error) => callback.on_failure(error),
                }
            })
            .map_err(|e| NetworkError::internal(format!("spawn insert worker: {}", e)))?;

        Ok(put)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClientMetadata;
    use frest_keys::{derive_ssk, InsertableSsk};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::mpsc;

    #[derive(Debug, PartialEq)]
    enum Event {
        Generated(NetworkUri),
        Success(NetworkUri),
        Failure(NetworkError),
    }

    struct Recorder {
        tx: Mutex<mpsc::Sender<Event>>,
        realtime: bool,
        persistent: bool,
    }

    impl Recorder {
        fn new(realtime: bool) -> (Arc<Self>, mpsc::Receiver<Event>) {
            let (tx, rx) = mpsc::channel();
            let recorder = Arc::new(Self {
                tx: Mutex::new(tx),
                realtime,
                persistent: false,
            });
            (recorder, rx)
        }

        fn send(&self, event: Event) {
            let _ = self.tx.lock().unwrap().send(event);
        }
    }

    impl PutCallback for Recorder {
        fn on_generated_uri(&self, uri: &NetworkUri) {
            self.send(Event::Generated(uri.clone()));
        }
        fn on_success(&self, uri: NetworkUri) {
            self.send(Event::Success(uri));
        }
        fn on_failure(&self, error: NetworkError) {
            self.send(Event::Failure(error));
        }
        fn persistent(&self) -> bool {
            self.persistent
        }
        fn realtime(&self) -> bool {
            self.realtime
        }
    }

    fn block(target: &str, data: &'static [u8]) -> InsertBlock {
        InsertBlock::new(
            Bytes::from_static(data),
            ClientMetadata::new(Some("text/plain")),
            NetworkUri::parse(target).unwrap(),
        )
    }

    fn recv(rx: &mpsc::Receiver<Event>) -> Event {
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_ksk_insert_is_its_own_request_uri() {
        let network = LocalNetwork::new();
        let (recorder, rx) = Recorder::new(true);
        network
            .insert(block("KSK@test/a.txt", b"hi"), Priority::INTERACTIVE, recorder)
            .unwrap();

        let expected = NetworkUri::parse("KSK@test/a.txt").unwrap();
        assert_eq!(recv(&rx), Event::Generated(expected.clone()));
        assert_eq!(recv(&rx), Event::Success(expected));

        let stored = network.fetch("KSK@test/a.txt").unwrap();
        assert_eq!(&stored.data[..], b"hi");
        assert_eq!(stored.content_type, "text/plain");
        assert!(stored.realtime);
        assert_eq!(network.completed_inserts(), 1);
    }

    #[test]
    fn test_ssk_insert_reports_request_uri() {
        let mut rng = StdRng::seed_from_u64(4);
        let key = InsertableSsk::create_random(&mut rng, "page.html");

        let network = LocalNetwork::new();
        let (recorder, rx) = Recorder::new(false);
        network
            .insert(block(&key.insert_uri(), b"<html/>"), Priority::UPDATE, recorder)
            .unwrap();

        let expected = NetworkUri::parse(&key.request_uri()).unwrap();
        assert_eq!(recv(&rx), Event::Generated(expected.clone()));
        assert_eq!(recv(&rx), Event::Success(expected));
        assert_eq!(
            network.fetch(&key.request_uri()).unwrap().priority,
            Priority::UPDATE
        );
    }

    #[test]
    fn test_chk_uri_depends_on_content() {
        let network = LocalNetwork::new();
        let (recorder, rx) = Recorder::new(false);
        network
            .insert(block("CHK@/a.txt", b"one"), Priority::default(), recorder)
            .unwrap();
        recv(&rx);
        let Event::Success(first) = recv(&rx) else {
            panic!("expected success")
        };
        assert_eq!(first.key_type(), UriKeyType::Chk);
        assert_eq!(first.doc_name(), "a.txt");

        let (recorder, rx) = Recorder::new(false);
        network
            .insert(block("CHK@/a.txt", b"two"), Priority::default(), recorder)
            .unwrap();
        recv(&rx);
        let Event::Success(second) = recv(&rx) else {
            panic!("expected success")
        };
        assert_ne!(first, second);
    }

    #[test]
    fn test_collision_on_different_content() {
        let network = LocalNetwork::new();
        let (recorder, rx) = Recorder::new(false);
        network
            .insert(block("KSK@name", b"first"), Priority::default(), recorder)
            .unwrap();
        recv(&rx);
        recv(&rx);

        // Same content again is fine.
        let (recorder, rx) = Recorder::new(false);
        network
            .insert(block("KSK@name", b"first"), Priority::default(), recorder)
            .unwrap();
        recv(&rx);
        assert!(matches!(recv(&rx), Event::Success(_)));

        let (recorder, rx) = Recorder::new(false);
        network
            .insert(block("KSK@name", b"second"), Priority::default(), recorder)
            .unwrap();
        assert_eq!(
            recv(&rx),
            Event::Failure(NetworkError::Collision("KSK@name".into()))
        );
    }

    #[test]
    fn test_injected_failure_applies_once() {
        let network = LocalNetwork::new();
        network.fail_next_insert(NetworkError::RouteNotFound);

        let (recorder, rx) = Recorder::new(false);
        network
            .insert(block("KSK@a", b"x"), Priority::default(), recorder)
            .unwrap();
        assert_eq!(recv(&rx), Event::Failure(NetworkError::RouteNotFound));

        let (recorder, rx) = Recorder::new(false);
        network
            .insert(block("KSK@a", b"x"), Priority::default(), recorder)
            .unwrap();
        recv(&rx);
        assert!(matches!(recv(&rx), Event::Success(_)));
    }

    #[test]
    fn test_invalid_ssk_fails_asynchronously() {
        let network = LocalNetwork::new();
        let (recorder, rx) = Recorder::new(false);
        network
            .insert(block("SSK@nope/doc", b"x"), Priority::default(), recorder)
            .unwrap();
        assert!(matches!(recv(&rx), Event::Failure(NetworkError::InvalidUri(_))));
    }

    #[test]
    fn test_cancel_interrupts_delay() {
        let network = LocalNetwork::with_delay(Duration::from_secs(30));
        let (recorder, rx) = Recorder::new(false);
        let put = network
            .insert(block("KSK@slow", b"x"), Priority::default(), recorder)
            .unwrap();
        put.cancel();

        assert_eq!(recv(&rx), Event::Failure(NetworkError::Cancelled));
        assert!(network.fetch("KSK@slow").is_none());
    }

    #[test]
    fn test_persistent_callback_rejected() {
        let network = LocalNetwork::new();
        let (tx, _rx) = mpsc::channel();
        let recorder = Arc::new(Recorder {
            tx: Mutex::new(tx),
            realtime: false,
            persistent: true,
        });
        let result = network.insert(block("KSK@p", b"x"), Priority::default(), recorder);
        assert!(matches!(result, Err(NetworkError::NotSupported(_))));
    }

    #[test]
    fn test_derived_pair_round_trips_through_store() {
        let mut rng = StdRng::seed_from_u64(8);
        let pair = derive_ssk(&mut rng, "doc", Some(1));

        let network = LocalNetwork::new();
        let (recorder, rx) = Recorder::new(false);
        network
            .insert(block(&pair.insert_uri, b"v1"), Priority::default(), recorder)
            .unwrap();
        recv(&rx);
        assert_eq!(
            recv(&rx),
            Event::Success(NetworkUri::parse(&pair.request_uri).unwrap())
        );
    }
}
