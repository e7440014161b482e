use std::sync::Arc;

use flowboard::gateway::GatewayClient;
use flowboard::tasks::TaskStore;

use crate::auth::AuthVerifier;

/// Shared handles for the relay. Stateless between requests; everything here
/// is either a connection pool or plain configuration.
#[derive(Clone)]
pub struct AppState {
    /// `None` when the gateway API key is not configured. The chat route
    /// surfaces that as a per-request server error rather than refusing to
    /// boot, so the rest of the app stays reachable.
    pub gateway: Option<Arc<GatewayClient>>,
    pub store: Arc<dyn TaskStore>,
    pub verifier: Arc<AuthVerifier>,
}

impl AppState {
    pub fn new(
        gateway: Option<GatewayClient>,
        store: Arc<dyn TaskStore>,
        verifier: AuthVerifier,
    ) -> Arc<Self> {
        Arc::new(Self {
            gateway: gateway.map(Arc::new),
            store,
            verifier: Arc::new(verifier),
        })
    }
}
