use std::sync::Arc;

use anyhow::Result;

use pickup_application::{AppState, Metrics};
use pickup_domain::Notifier;
use pickup_infrastructure::{
    build_notifier, build_sources, AppConfig, JsonEventStore, JsonRetryCounterStore,
};

pub struct AppContext {
    pub state: AppState,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Result<Self> {
        let runtime_config = config.to_runtime_config();
        let notifier: Arc<dyn Notifier> =
            Arc::from(build_notifier(&config.notification, config.request_timeout_seconds)?);

        let state = AppState {
            event_store: Arc::new(JsonEventStore::new(&runtime_config.event_log_path)),
            counter_store: Arc::new(JsonRetryCounterStore::new(&runtime_config.retry_counter_path)),
            notifier,
            sources: build_sources(&config)?,
            metrics: Arc::new(Metrics::default()),
            config: runtime_config,
        };
        Ok(Self { state })
    }
}
