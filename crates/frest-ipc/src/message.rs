//! Plugin messages and the transport traits that carry them.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IpcError;
use crate::protocol::PARAM_ACTION;

/// One message between the gateway and a plugin.
///
/// Requests have `success == None`. Replies reuse the request's identifier
/// and set `success`; failed replies carry `error_code`/`error_message`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMessage {
    /// Correlates a reply with its request
    pub identifier: Uuid,
    /// Key/value parameters
    pub params: BTreeMap<String, String>,
    /// Outcome flag, replies only
    pub success: Option<bool>,
    /// Machine-readable error code, failed replies only
    pub error_code: Option<String>,
    /// Human-readable error text, failed replies only
    pub error_message: Option<String>,
}

impl PluginMessage {
    /// New request for `action` with the given extra parameters.
    pub fn request(action: &str, params: &[(&str, &str)]) -> Self {
        let mut all = BTreeMap::new();
        all.insert(PARAM_ACTION.to_string(), action.to_string());
        for (key, value) in params {
            all.insert((*key).to_string(), (*value).to_string());
        }
        Self {
            identifier: Uuid::new_v4(),
            params: all,
            success: None,
            error_code: None,
            error_message: None,
        }
    }

    /// Successful reply to this message.
    pub fn reply_success(&self, params: BTreeMap<String, String>) -> Self {
        Self {
            identifier: self.identifier,
            params,
            success: Some(true),
            error_code: None,
            error_message: None,
        }
    }

    /// Failed reply to this message.
    pub fn reply_error(&self, code: &str, message: impl Into<String>) -> Self {
        Self {
            identifier: self.identifier,
            params: BTreeMap::new(),
            success: Some(false),
            error_code: Some(code.to_string()),
            error_message: Some(message.into()),
        }
    }

    /// Whether this is a reply rather than a request.
    pub fn is_reply(&self) -> bool {
        self.success.is_some()
    }

    /// Whether this is a successful reply.
    pub fn is_success(&self) -> bool {
        self.success == Some(true)
    }

    /// Parameter by key.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The `action` parameter.
    pub fn action(&self) -> Option<&str> {
        self.param(PARAM_ACTION)
    }
}

/// Receives messages a plugin sends back over a connection.
///
/// Called on a transport-owned thread.
pub trait MessageHandler: Send + Sync {
    fn handle_message(&self, message: PluginMessage);
}

/// An open connection to one plugin.
pub trait PluginConnection: Send + Sync {
    /// Unique id of this connection.
    fn id(&self) -> Uuid;

    /// Send a request. Replies go to the handler given at connect time.
    fn send(&self, message: PluginMessage) -> Result<(), IpcError>;
}

/// Opens connections to plugins by name.
pub trait PluginTransport: Send + Sync {
    fn connect(
        &self,
        plugin: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Box<dyn PluginConnection>, IpcError>;
}

/// Plugin side of an exchange: turns a request into a reply.
pub trait PluginServer: Send + Sync {
    fn handle_request(&self, request: &PluginMessage) -> PluginMessage;
}
