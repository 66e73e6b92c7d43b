//! frest REST gateway
//!
//! Exposes key generation, content insertion and name resolution over
//! HTTP. Handlers are thin: they parse the request, call into the blocking
//! services on the blocking pool, and render the result.
//!
//! ```text
//! ┌────────┐   ┌────────────┐   ┌──────────────────┐   ┌───────────────┐
//! │ client │──▶│   router   │──▶│ frest-services   │──▶│ NetworkClient │
//! └────────┘   │ (axum)     │   │ (blocking waits) │   │ PluginTransport│
//!              └────────────┘   └──────────────────┘   └───────────────┘
//! ```

pub mod config;
pub mod error;
pub mod router;
pub mod state;

pub use config::{Args, GatewayConfig};
pub use error::GatewayError;
pub use router::build_router;
pub use state::{AppState, LocalBackends};
