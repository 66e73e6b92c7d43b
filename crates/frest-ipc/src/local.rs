//! In-process plugin transport.
//!
//! Plugins register a [`PluginServer`] under a name. Each request sent over
//! a connection is handled on a fresh thread and the reply is delivered to
//! the connection's [`MessageHandler`] from that thread, so the sender never
//! sees its reply synchronously.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::thread;

use tracing::debug;
use uuid::Uuid;

use crate::error::IpcError;
use crate::message::{MessageHandler, PluginConnection, PluginMessage, PluginServer, PluginTransport};

/// Registry of in-process plugins.
#[derive(Clone, Default)]
pub struct LocalTransport {
    plugins: Arc<RwLock<HashMap<String, Arc<dyn PluginServer>>>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `server` under `name`, replacing any previous registration.
    pub fn register(&self, name: impl Into<String>, server: Arc<dyn PluginServer>) {
        let name = name.into();
        debug!(plugin = %name, "plugin registered");
        self.plugins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, server);
    }

    /// Remove a plugin. Returns whether it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        self.plugins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    /// Whether a plugin is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}

impl core::fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let plugins = self.plugins.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("LocalTransport")
            .field("plugins", &plugins.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PluginTransport for LocalTransport {
    fn connect(
        &self,
        plugin: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Box<dyn PluginConnection>, IpcError> {
        let server = self
            .plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(plugin)
            .cloned()
            .ok_or_else(|| IpcError::PluginNotFound(plugin.to_string()))?;

        Ok(Box::new(LocalConnection {
            id: Uuid::new_v4(),
            plugin: plugin.to_string(),
            server,
            handler,
        }))
    }
}

struct LocalConnection {
    id: Uuid,
    plugin: String,
    server: Arc<dyn PluginServer>,
    handler: Arc<dyn MessageHandler>,
}

impl PluginConnection for LocalConnection {
    fn id(&self) -> Uuid {
        self.id
    }

    fn send(&self, message: PluginMessage) -> Result<(), IpcError> {
        if message.is_reply() {
            return Err(IpcError::InvalidMessage(
                "replies cannot be sent to a plugin".to_string(),
            ));
        }

        let server = Arc::clone(&self.server);
        let handler = Arc::clone(&self.handler);
        debug!(
            plugin = %self.plugin,
            connection = %self.id,
            identifier = %message.identifier,
            "plugin request"
        );

        thread::Builder::new()
            .name("plugin-reply".to_string())
            .spawn(move || {
                let reply = server.handle_request(&message);
                handler.handle_message(reply);
            })
            .map(|_| ())
            .map_err(|e| IpcError::SendFailed(e.to_string()))
    }
}
