//! Storage network access for the frest gateway.
//!
//! This crate defines the client side of the anonymous storage network as
//! the gateway sees it: URIs, priorities, insert blocks and a callback
//! driven [`NetworkClient`]. [`LocalNetwork`] implements the client in
//! memory so the gateway can run without a node.
//!
//! ```text
//! ┌──────────────┐  insert(block, priority, cb)  ┌───────────────┐
//! │   gateway    │ ────────────────────────────▶ │ NetworkClient │
//! │  (services)  │ ◀──── Arc<dyn PutHandle> ──── │               │
//! └──────────────┘                               └───────┬───────┘
//!         ▲                                              │ worker thread
//!         │      cb.on_success(uri) / cb.on_failure(e)   │
//!         └──────────────────────────────────────────────┘
//! ```

pub mod client;
pub mod error;
pub mod local;
pub mod types;

pub use client::{NetworkClient, PutCallback, PutHandle};
pub use error::NetworkError;
pub use local::{LocalNetwork, StoredBlock};
pub use types::{
    ClientMetadata, InsertBlock, NetworkUri, Priority, UriKeyType, DEFAULT_CONTENT_TYPE,
};
