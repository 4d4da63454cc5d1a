pub mod health;
pub mod metrics_handler;
pub mod pricing;
pub mod refresh;

use crate::pricing::{PricingQuery, RefreshScheduler};
use std::sync::Arc;

/// Shared state for the pricing API routes
#[derive(Clone)]
pub struct AppState {
    pub query: PricingQuery,
    pub scheduler: Arc<RefreshScheduler>,
}

impl AppState {
    pub fn new(scheduler: Arc<RefreshScheduler>) -> Self {
        Self {
            query: PricingQuery::new(scheduler.store().clone()),
            scheduler,
        }
    }
}
