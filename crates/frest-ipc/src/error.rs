//! Errors from the plugin transport.

use thiserror::Error;

/// Transport level failures. Remote errors arrive as replies, not here.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum IpcError {
    /// No plugin is registered under the name
    #[error("plugin not found: {0}")]
    PluginNotFound(String),

    /// Message was rejected before sending
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Message could not be delivered
    #[error("send failed: {0}")]
    SendFailed(String),
}
