use std::sync::Arc;

use pickup_domain::ports::{EventSource, EventStore, Notifier, RetryCounterStore};
use pickup_domain::{RuntimeConfig, SourceKey};

use crate::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub config: RuntimeConfig,
    pub event_store: Arc<dyn EventStore>,
    pub counter_store: Arc<dyn RetryCounterStore>,
    pub notifier: Arc<dyn Notifier>,
    pub sources: Vec<Arc<dyn EventSource>>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn source_keys(&self) -> Vec<SourceKey> {
        self.sources.iter().map(|source| source.key().clone()).collect()
    }
}
