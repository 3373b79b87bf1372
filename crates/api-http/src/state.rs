use std::sync::Arc;

use inkwell_core::application::GenerationService;

use crate::config::GatewayConfig;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GenerationService>,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    pub fn new(service: Arc<GenerationService>, config: GatewayConfig) -> Self {
        Self {
            service,
            config: Arc::new(config),
        }
    }
}
