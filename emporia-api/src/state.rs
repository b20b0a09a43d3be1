use emporia_core::payment::PaymentGateway;
use emporia_order::CheckoutOrchestrator;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

/// Handles shared by every request handler. Everything behind an Arc is
/// injected at startup; handlers never construct collaborators.
#[derive(Clone)]
pub struct AppState {
    pub checkout: Arc<CheckoutOrchestrator>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub auth: AuthConfig,
}
