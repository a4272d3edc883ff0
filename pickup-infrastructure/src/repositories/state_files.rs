use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{info, warn};

use pickup_domain::{EventRecord, EventStore, RetryCounter, RetryCounterStore, SourceKey};

/// Seen-events store kept as a pretty-printed JSON array.
pub struct JsonEventStore {
    path: PathBuf,
}

impl JsonEventStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl EventStore for JsonEventStore {
    async fn load_events(&self) -> anyhow::Result<Vec<EventRecord>> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "event log not found, starting empty");
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let events: Vec<EventRecord> = serde_json::from_str(&content)?;
        Ok(events)
    }

    async fn save_events(&self, events: &[EventRecord]) -> anyhow::Result<()> {
        ensure_parent(&self.path).await?;
        let content = serde_json::to_string_pretty(events)?;
        fs::write(&self.path, content).await?;
        Ok(())
    }
}

pub struct JsonRetryCounterStore {
    path: PathBuf,
}

impl JsonRetryCounterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_counters(&self) -> anyhow::Result<RetryCounter> {
        let content = fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[async_trait]
impl RetryCounterStore for JsonRetryCounterStore {
    async fn load_counters(&self, sources: &[SourceKey]) -> anyhow::Result<RetryCounter> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "retry counter file not found, using defaults");
            return Ok(RetryCounter::with_sources(sources));
        }
        let mut counters = match self.read_counters().await {
            Ok(counters) => counters,
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    "retry counter file unreadable, using defaults: {:#}",
                    err
                );
                RetryCounter::default()
            }
        };
        counters.ensure_sources(sources);
        Ok(counters)
    }

    async fn save_counters(&self, counters: &RetryCounter) -> anyhow::Result<()> {
        ensure_parent(&self.path).await?;
        let content = serde_json::to_string_pretty(counters)?;
        fs::write(&self.path, content).await?;
        Ok(())
    }
}

async fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}
