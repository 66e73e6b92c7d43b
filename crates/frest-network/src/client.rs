//! Storage network client interface.
//!
//! The client is callback driven: [`NetworkClient::insert`] returns as soon
//! as the put is scheduled, and the outcome arrives later on a thread owned
//! by the client through the [`PutCallback`] supplied with the request.
//!
//! ```text
//! caller                        client thread
//! ──────                        ─────────────
//! insert(block, cb) ──────────▶ schedule put
//!   ◀── Arc<dyn PutHandle>        ...
//!                               cb.on_generated_uri(uri)   (optional)
//!                               cb.on_success(uri) | cb.on_failure(err)
//! ```

use std::sync::Arc;

use crate::error::NetworkError;
use crate::types::{InsertBlock, NetworkUri, Priority};

/// Receives the outcome of one put.
///
/// Exactly one of [`on_success`](Self::on_success) or
/// [`on_failure`](Self::on_failure) is invoked per put. A put cancelled
/// through its [`PutHandle`] may still report a failure afterwards.
pub trait PutCallback: Send + Sync {
    /// The final URI is known. Informational only.
    fn on_generated_uri(&self, _uri: &NetworkUri) {}

    /// The put completed; `uri` is the request URI of the inserted content.
    fn on_success(&self, uri: NetworkUri);

    /// The put failed.
    fn on_failure(&self, error: NetworkError);

    /// Whether the put should survive client restarts.
    fn persistent(&self) -> bool {
        false
    }

    /// Whether the put should use the realtime (low latency) queue.
    fn realtime(&self) -> bool {
        false
    }
}

/// Control handle for a scheduled put.
pub trait PutHandle: Send + Sync {
    /// Ask the client to stop the put.
    ///
    /// Must not invoke the put's callback synchronously: callers may hold
    /// locks that the callback also takes.
    fn cancel(&self);
}

/// Asynchronous storage network client.
pub trait NetworkClient: Send + Sync {
    /// Schedule `block` for insertion at `priority`.
    ///
    /// Errors returned here mean the put was never scheduled and the
    /// callback will not fire.
    fn insert(
        &self,
        block: InsertBlock,
        priority: Priority,
        callback: Arc<dyn PutCallback>,
    ) -> Result<Arc<dyn PutHandle>, NetworkError>;
}
