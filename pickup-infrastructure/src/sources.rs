pub mod big_city;
pub mod new_york_urban;
pub mod volo;
pub mod webdriver;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use pickup_domain::EventSource;

use crate::config::AppConfig;

pub use big_city::BigCitySource;
pub use new_york_urban::NewYorkUrbanSource;
pub use volo::VoloSource;
pub use webdriver::Pacing;

/// Instantiates every enabled source, in a stable order.
pub fn build_sources(config: &AppConfig) -> Result<Vec<Arc<dyn EventSource>>> {
    let timeout = config.request_timeout_seconds;
    let mut sources: Vec<Arc<dyn EventSource>> = Vec::new();
    if config.sources.big_city.enabled {
        sources.push(Arc::new(BigCitySource::new(config.sources.big_city.clone(), timeout)?));
    }
    if config.sources.new_york_urban.enabled {
        sources.push(Arc::new(NewYorkUrbanSource::new(
            config.sources.new_york_urban.clone(),
            timeout,
        )?));
    }
    if config.sources.volo.enabled {
        let pacing = Pacing {
            page_load_limit: Duration::from_secs(config.page_load_limit_seconds),
            poll_step: Duration::from_millis(config.poll_step_millis),
        };
        sources.push(Arc::new(VoloSource::new(config.sources.volo.clone(), timeout, pacing)?));
    }
    let keys: Vec<&str> = sources.iter().map(|source| source.key().as_str()).collect();
    info!("enabled sources: {:?}", keys);
    Ok(sources)
}
