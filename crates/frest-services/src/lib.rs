//! Gateway services that turn callback-driven operations into blocking calls.
//!
//! - [`insert`]: content insertion through a [`frest_network::NetworkClient`]
//! - [`resolve`]: name resolution through a [`frest_ipc::PluginTransport`]
//!
//! Both block the calling thread until the operation reaches a terminal
//! state. Call them from a blocking context, never from an async task.

pub mod insert;
pub mod resolve;

pub use insert::{
    parse_realtime, InsertCallback, InsertCanceller, InsertCoordinator, InsertError,
    InsertOperation, InsertRequest, StagedPayload,
};
pub use resolve::{ResolutionBridge, ResolveError};
