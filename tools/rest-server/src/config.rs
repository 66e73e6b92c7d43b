//! Gateway configuration.
//!
//! Every option is a command-line flag with an environment fallback. `PORT`
//! keeps the name the development server always used.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use frest_ipc::protocol::DEFAULT_RESOLVER_PLUGIN;
use serde::Serialize;

/// Port the gateway listens on by default.
pub const DEFAULT_PORT: u16 = 8888;

/// Path prefix of every gateway route.
pub const DEFAULT_BASE_PATH: &str = "/rest/";

/// Largest accepted insert body.
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "frest-server", version, about = "REST gateway for the storage network")]
pub struct Args {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "FREST_BIND", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub bind: IpAddr,

    /// Path prefix of the REST routes
    #[arg(long, env = "FREST_BASE_PATH", default_value = DEFAULT_BASE_PATH)]
    pub base_path: String,

    /// Plugin that answers name resolution requests
    #[arg(long, env = "FREST_RESOLVER_PLUGIN", default_value = DEFAULT_RESOLVER_PLUGIN)]
    pub resolver_plugin: String,

    /// Give up on an insert after this many seconds (cancelling it)
    #[arg(long, env = "FREST_INSERT_TIMEOUT_SECS")]
    pub insert_timeout_secs: Option<u64>,

    /// Give up on a resolver reply after this many seconds
    #[arg(long, env = "FREST_RESOLVE_TIMEOUT_SECS")]
    pub resolve_timeout_secs: Option<u64>,

    /// Simulated latency of the in-memory network
    #[arg(long, env = "FREST_INSERT_DELAY_MS", default_value_t = 0)]
    pub insert_delay_ms: u64,

    /// Largest accepted request body in bytes
    #[arg(long, env = "FREST_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Seed key generation for reproducible keys (testing only)
    #[arg(long, env = "FREST_KEY_SEED")]
    pub key_seed: Option<u64>,
}

/// Resolved gateway settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GatewayConfig {
    pub listen: SocketAddr,
    /// Always starts and ends with `/`
    pub base_path: String,
    pub resolver_plugin: String,
    /// `None` waits for inserts indefinitely
    pub insert_timeout: Option<Duration>,
    /// `None` waits for resolver replies indefinitely
    pub resolve_timeout: Option<Duration>,
    pub insert_delay: Duration,
    pub max_body_bytes: usize,
    pub key_seed: Option<u64>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            base_path: DEFAULT_BASE_PATH.to_string(),
            resolver_plugin: DEFAULT_RESOLVER_PLUGIN.to_string(),
            insert_timeout: None,
            resolve_timeout: None,
            insert_delay: Duration::ZERO,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            key_seed: None,
        }
    }
}

impl From<Args> for GatewayConfig {
    fn from(args: Args) -> Self {
        Self {
            listen: SocketAddr::new(args.bind, args.port),
            base_path: normalize_base_path(&args.base_path),
            resolver_plugin: args.resolver_plugin,
            insert_timeout: args.insert_timeout_secs.map(Duration::from_secs),
            resolve_timeout: args.resolve_timeout_secs.map(Duration::from_secs),
            insert_delay: Duration::from_millis(args.insert_delay_ms),
            max_body_bytes: args.max_body_bytes,
            key_seed: args.key_seed,
        }
    }
}

/// Force a leading and trailing `/`.
pub fn normalize_base_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}
