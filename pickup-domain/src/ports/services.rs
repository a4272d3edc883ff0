use std::time::Duration;

use async_trait::async_trait;

use crate::entities::{EventRecord, Notification};
use crate::services::DedupPolicy;
use crate::value_objects::SourceKey;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// One polled marketplace. Cheap to share; per-cycle state lives in its session.
#[async_trait]
pub trait EventSource: Send + Sync {
    fn key(&self) -> &SourceKey;
    fn display_name(&self) -> &str;
    fn dedup_policy(&self) -> DedupPolicy;

    /// Whether new events from this source go through auto-registration.
    fn supports_registration(&self) -> bool {
        false
    }

    /// Acquires an exclusive automation session for one pipeline run.
    async fn open_session(&self) -> anyhow::Result<Box<dyn SourceSession>>;
}

#[async_trait]
pub trait SourceSession: Send {
    /// Logs in when the source needs an account. `Ok(false)` means anonymous.
    async fn authenticate(&mut self) -> anyhow::Result<bool> {
        Ok(false)
    }

    async fn fetch(&mut self) -> anyhow::Result<Vec<EventRecord>>;

    fn apply_domain_filters(&self, events: Vec<EventRecord>) -> Vec<EventRecord> {
        events
    }

    fn registration_page(&mut self) -> Option<&mut dyn RegistrationPage> {
        None
    }

    /// Releases the session. Called exactly once on every pipeline exit path.
    async fn close(self: Box<Self>) -> anyhow::Result<()>;
}

/// Page-level steps of the signup protocol, driven by the registration engine.
#[async_trait]
pub trait RegistrationPage: Send {
    async fn open_event(&mut self, event: &EventRecord) -> anyhow::Result<()>;
    async fn already_registered(&mut self) -> anyhow::Result<bool>;
    async fn order_total_cents(&mut self) -> anyhow::Result<Option<u64>>;
    /// Ticks every consent checkbox, returning how many were selected.
    async fn accept_consents(&mut self) -> anyhow::Result<usize>;
    async fn submit_registration(&mut self) -> anyhow::Result<()>;
    /// Polls for the success acknowledgment until `budget` runs out.
    async fn confirmation_visible(&mut self, budget: Duration) -> anyhow::Result<bool>;
}
