//! Inter-plugin messaging for the frest gateway.
//!
//! Name resolution is not done by the gateway itself: it opens a connection
//! to a resolver plugin, sends one [`PluginMessage`] and receives the reply
//! through a [`MessageHandler`] on a thread owned by the transport.
//!
//! ```text
//! ┌─────────┐ connect(plugin, handler) ┌─────────────────┐
//! │ gateway │ ───────────────────────▶ │ PluginTransport │
//! │         │ ── conn.send(request) ─▶ │                 │──▶ PluginServer
//! │         │ ◀─ handler(reply) ────── │                 │◀── reply
//! └─────────┘                          └─────────────────┘
//! ```
//!
//! # Protocol
//!
//! | Action              | Request params          | Reply params  |
//! |---------------------|-------------------------|---------------|
//! | `resolver.resolve`  | `name`                  | `json`        |
//! | `resolver.register` | `name`, `requestKey`    | `resolveURI`  |
//!
//! Failed replies carry `success = false` with an error code and message
//! instead of params.

pub mod error;
pub mod local;
pub mod message;
pub mod resolver;

pub use error::IpcError;
pub use local::LocalTransport;
pub use message::{
    MessageHandler, PluginConnection, PluginMessage, PluginServer, PluginTransport,
};
pub use resolver::LocalResolver;

// =============================================================================
// Protocol constants
// =============================================================================

/// Resolver plugin protocol.
pub mod protocol {
    /// Plugin name the gateway talks to unless configured otherwise.
    pub const DEFAULT_RESOLVER_PLUGIN: &str = "plugins.Indynet.Indynet";

    /// Parameter carrying the requested action.
    pub const PARAM_ACTION: &str = "action";
    /// Name to resolve or register.
    pub const PARAM_NAME: &str = "name";
    /// Request URI a name should point at.
    pub const PARAM_REQUEST_KEY: &str = "requestKey";
    /// Resolution payload (JSON text) in resolve replies.
    pub const PARAM_JSON: &str = "json";
    /// Resolvable URI in register replies.
    pub const PARAM_RESOLVE_URI: &str = "resolveURI";

    /// Look a name up.
    pub const ACTION_RESOLVE: &str = "resolver.resolve";
    /// Bind a name to a request key.
    pub const ACTION_REGISTER: &str = "resolver.register";

    /// Error codes used by [`LocalResolver`](crate::LocalResolver).
    pub mod codes {
        /// Request is missing a parameter or carries an invalid one
        pub const BAD_REQUEST: &str = "400";
        /// Name is not registered
        pub const NOT_FOUND: &str = "404";
        /// Action is not known to the plugin
        pub const UNKNOWN_ACTION: &str = "405";
        /// Name is already bound to a different key
        pub const ALREADY_REGISTERED: &str = "409";
    }
}
