use std::sync::Arc;

use beacon_service::SubscriptionRegistry;

/// Shared by every worker; the registry is the only mutable piece
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SubscriptionRegistry>,
}

impl AppState {
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self { registry }
    }
}
