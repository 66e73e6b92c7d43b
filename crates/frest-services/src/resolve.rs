//! Blocking name resolution over the plugin transport.
//!
//! Each call opens its own connection to the resolver plugin, sends one
//! request and blocks until the first matching reply arrives. Further
//! replies on the connection are dropped.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use frest_ipc::protocol::{
    ACTION_REGISTER, ACTION_RESOLVE, PARAM_JSON, PARAM_NAME, PARAM_REQUEST_KEY,
    PARAM_RESOLVE_URI,
};
use frest_ipc::{IpcError, MessageHandler, PluginMessage, PluginTransport};
use frest_sync::{channel, Completer, Outcome};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Why a resolution exchange did not produce a value.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Plugin could not be reached
    #[error("resolver unavailable: {0}")]
    Connect(IpcError),

    /// Plugin answered with an error
    #[error("Error: {code} {message}")]
    Remote { code: String, message: String },

    /// Successful reply without the expected parameter
    #[error("resolver reply is missing {0}")]
    MissingField(&'static str),

    /// No reply within the configured bound
    #[error("resolver did not reply within {0:?}")]
    TimedOut(Duration),
}

/// Routes the reply to a single request into its completion cell.
struct ReplyHandler {
    identifier: Uuid,
    completer: Completer<PluginMessage, Infallible>,
}

impl MessageHandler for ReplyHandler {
    fn handle_message(&self, message: PluginMessage) {
        if message.identifier != self.identifier {
            warn!(
                expected = %self.identifier,
                received = %message.identifier,
                "reply for unknown request dropped"
            );
            return;
        }
        if !self.completer.succeed(message) {
            debug!(identifier = %self.identifier, "duplicate reply dropped");
        }
    }
}

/// Talks to the resolver plugin on behalf of request handlers.
#[derive(Clone)]
pub struct ResolutionBridge {
    transport: Arc<dyn PluginTransport>,
    plugin: String,
    timeout: Option<Duration>,
}

impl ResolutionBridge {
    /// Bridge to `plugin` with no reply timeout.
    pub fn new(transport: Arc<dyn PluginTransport>, plugin: impl Into<String>) -> Self {
        Self {
            transport,
            plugin: plugin.into(),
            timeout: None,
        }
    }

    /// Bound the wait for a reply.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Name of the resolver plugin.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Resolve `name` (case-insensitive) to the plugin's JSON payload.
    pub fn resolve(&self, name: &str) -> Result<String, ResolveError> {
        let name = name.to_lowercase();
        let request = PluginMessage::request(ACTION_RESOLVE, &[(PARAM_NAME, name.as_str())]);
        let json = take_param(self.exchange(request)?, PARAM_JSON)?;
        info!(name = %name, "name resolved");
        Ok(json)
    }

    /// Bind `name` to `request_key`, returning the resolvable URI.
    pub fn register(&self, name: &str, request_key: &str) -> Result<String, ResolveError> {
        let request = PluginMessage::request(
            ACTION_REGISTER,
            &[(PARAM_NAME, name), (PARAM_REQUEST_KEY, request_key)],
        );
        let resolve_uri = take_param(self.exchange(request)?, PARAM_RESOLVE_URI)?;
        info!(name = %name, resolve_uri = %resolve_uri, "name registered");
        Ok(resolve_uri)
    }

    fn exchange(&self, request: PluginMessage) -> Result<PluginMessage, ResolveError> {
        let (completer, handle) = channel();
        let handler = Arc::new(ReplyHandler {
            identifier: request.identifier,
            completer: completer.clone(),
        });

        let connection = self
            .transport
            .connect(&self.plugin, handler)
            .map_err(ResolveError::Connect)?;
        debug!(
            plugin = %self.plugin,
            connection = %connection.id(),
            action = request.action().unwrap_or_default(),
            "sending resolver request"
        );
        connection.send(request).map_err(ResolveError::Connect)?;

        let outcome = match self.timeout {
            None => handle.wait(),
            Some(timeout) => match handle.wait_timeout(timeout) {
                Ok(outcome) => outcome,
                Err(handle) => {
                    if completer.cancelled() {
                        warn!(plugin = %self.plugin, ?timeout, "resolver timed out");
                        return Err(ResolveError::TimedOut(timeout));
                    }
                    handle.wait()
                }
            },
        };

        match outcome {
            Outcome::Succeeded(reply) => check_reply(reply),
            Outcome::Failed(never) => match never {},
            Outcome::Cancelled => Err(ResolveError::TimedOut(self.timeout.unwrap_or_default())),
        }
    }
}

impl core::fmt::Debug for ResolutionBridge {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResolutionBridge")
            .field("plugin", &self.plugin)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn check_reply(reply: PluginMessage) -> Result<PluginMessage, ResolveError> {
    if reply.is_success() {
        return Ok(reply);
    }
    let error = ResolveError::Remote {
        code: reply.error_code.unwrap_or_default(),
        message: reply.error_message.unwrap_or_default(),
    };
    warn!(error = %error, "resolver returned an error");
    Err(error)
}

fn take_param(mut reply: PluginMessage, key: &'static str) -> Result<String, ResolveError> {
    reply
        .params
        .remove(key)
        .ok_or(ResolveError::MissingField(key))
}
