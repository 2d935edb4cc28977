use std::sync::Arc;

use makerspace_core::config::PortalConfig;
use makerspace_core::{Calendar, PresenceGateway, SharedStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    store: SharedStore,
    config: Arc<PortalConfig>,
}

impl AppState {
    pub fn new(store: SharedStore, config: PortalConfig) -> Self {
        AppState {
            store,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn calendar(&self) -> Calendar {
        Calendar::new(self.store.clone(), self.config.recurrence)
    }

    pub fn presence(&self) -> PresenceGateway {
        PresenceGateway::new(self.store.clone())
    }
}
