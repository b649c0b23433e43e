use price_feed::{hub::PriceHub, scheduler::PriceScheduler, store::PriceStore};
use std::sync::Arc;

/// Shared handler state: the process-wide scheduler (which owns the store, computer and hub)
/// plus the optional admin token.
#[derive(Debug, Clone)]
pub struct AppState {
    scheduler: Arc<PriceScheduler>,
    admin_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(scheduler: Arc<PriceScheduler>, admin_token: Option<String>) -> Self {
        Self {
            scheduler,
            admin_token: admin_token.map(Arc::from),
        }
    }

    pub fn scheduler(&self) -> &Arc<PriceScheduler> {
        &self.scheduler
    }

    pub fn store(&self) -> &PriceStore {
        self.scheduler.store()
    }

    pub fn hub(&self) -> &PriceHub {
        self.scheduler.hub()
    }

    pub fn admin_token(&self) -> Option<&str> {
        self.admin_token.as_deref()
    }
}
