use async_trait::async_trait;

use crate::entities::{EventRecord, RetryCounter};
use crate::value_objects::SourceKey;

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn load_events(&self) -> anyhow::Result<Vec<EventRecord>>;
    async fn save_events(&self, events: &[EventRecord]) -> anyhow::Result<()>;
}

#[async_trait]
pub trait RetryCounterStore: Send + Sync {
    /// Returns the persisted counters with every `sources` entry present.
    async fn load_counters(&self, sources: &[SourceKey]) -> anyhow::Result<RetryCounter>;
    async fn save_counters(&self, counters: &RetryCounter) -> anyhow::Result<()>;
}
