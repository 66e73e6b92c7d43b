//! Shared handler state.

use std::sync::Arc;

use frest_ipc::{LocalResolver, LocalTransport, PluginTransport};
use frest_keys::KeyDeriver;
use frest_network::{LocalNetwork, NetworkClient};
use frest_services::{InsertCoordinator, ResolutionBridge};

use crate::config::GatewayConfig;

/// Everything a request handler needs. Cheap to clone.
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub keys: Arc<KeyDeriver>,
    pub inserts: InsertCoordinator,
    pub resolver: ResolutionBridge,
}

impl AppState {
    /// State over the given network client and plugin transport.
    pub fn new(
        config: GatewayConfig,
        network: Arc<dyn NetworkClient>,
        transport: Arc<dyn PluginTransport>,
    ) -> Self {
        let keys = match config.key_seed {
            Some(seed) => KeyDeriver::seeded(seed),
            None => KeyDeriver::from_entropy(),
        };
        let resolver = ResolutionBridge::new(transport, config.resolver_plugin.clone())
            .with_timeout(config.resolve_timeout);

        Self {
            keys: Arc::new(keys),
            inserts: InsertCoordinator::new(network),
            resolver,
            config: Arc::new(config),
        }
    }
}

/// In-process stand-ins for the storage network and the resolver plugin.
#[derive(Clone, Debug)]
pub struct LocalBackends {
    pub network: LocalNetwork,
    pub transport: LocalTransport,
    pub resolver: Arc<LocalResolver>,
}

impl LocalBackends {
    /// Backends configured from `config`, with the resolver registered
    /// under the configured plugin name.
    pub fn new(config: &GatewayConfig) -> Self {
        let network = LocalNetwork::with_delay(config.insert_delay);
        let transport = LocalTransport::new();
        let resolver = Arc::new(LocalResolver::new());
        transport.register(config.resolver_plugin.clone(), resolver.clone());
        Self {
            network,
            transport,
            resolver,
        }
    }

    /// Handler state wired to these backends.
    pub fn app_state(&self, config: GatewayConfig) -> AppState {
        AppState::new(
            config,
            Arc::new(self.network.clone()),
            Arc::new(self.transport.clone()),
        )
    }
}
