// In-memory doubles of the domain ports for application tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use pickup_domain::ports::{
    EventSource, EventStore, Notifier, RegistrationPage, RetryCounterStore, SourceSession,
};
use pickup_domain::{
    DedupPolicy, EventRecord, EventStatus, Notification, RetryCounter, RuntimeConfig, SourceKey,
};

use crate::{AppState, Metrics};

pub fn at(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2031, 3, 14)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .expect("valid time")
}

pub fn event(
    source: &str,
    id: &str,
    start: NaiveDateTime,
    status: Option<EventStatus>,
) -> EventRecord {
    let mut record = EventRecord::new(
        &SourceKey::from(source),
        id,
        "Community Gym",
        start,
        start + chrono::Duration::hours(2),
        format!("https://example.test/{source}/{id}"),
        at(0),
    );
    record.status = status;
    record
}

#[derive(Default)]
pub struct FakePage {
    pub total_cents: Option<u64>,
    pub confirms: bool,
    pub registered_events: Vec<String>,
    pub broken_events: Vec<String>,
    pub opened: Vec<String>,
    pub submitted: Vec<String>,
    pub consents_ticked: usize,
    current: Option<String>,
}

impl FakePage {
    pub fn free_and_confirming() -> Self {
        Self {
            total_cents: Some(0),
            confirms: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl RegistrationPage for FakePage {
    async fn open_event(&mut self, event: &EventRecord) -> anyhow::Result<()> {
        if self.broken_events.contains(&event.event_id) {
            anyhow::bail!("element not found for {}", event.event_id);
        }
        self.opened.push(event.event_id.clone());
        self.current = Some(event.event_id.clone());
        Ok(())
    }

    async fn already_registered(&mut self) -> anyhow::Result<bool> {
        Ok(self
            .current
            .as_ref()
            .map(|id| self.registered_events.contains(id))
            .unwrap_or(false))
    }

    async fn order_total_cents(&mut self) -> anyhow::Result<Option<u64>> {
        Ok(self.total_cents)
    }

    async fn accept_consents(&mut self) -> anyhow::Result<usize> {
        self.consents_ticked += 2;
        Ok(2)
    }

    async fn submit_registration(&mut self) -> anyhow::Result<()> {
        if let Some(id) = &self.current {
            self.submitted.push(id.clone());
        }
        Ok(())
    }

    async fn confirmation_visible(&mut self, _budget: Duration) -> anyhow::Result<bool> {
        Ok(self.confirms)
    }
}

#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    Fail,
    Hang,
    Panic,
}

pub struct FakeSource {
    key: SourceKey,
    policy: DedupPolicy,
    events: Vec<EventRecord>,
    behavior: Behavior,
    level_filter: Option<String>,
    registration: bool,
    open_delay: Option<Duration>,
    pub closed: Arc<AtomicUsize>,
}

impl FakeSource {
    pub fn new(key: &str, policy: DedupPolicy) -> Self {
        Self {
            key: SourceKey::from(key),
            policy,
            events: Vec::new(),
            behavior: Behavior::Succeed,
            level_filter: None,
            registration: false,
            open_delay: None,
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_events(mut self, events: Vec<EventRecord>) -> Self {
        self.events = events;
        self
    }

    pub fn with_level_filter(mut self, marker: &str) -> Self {
        self.level_filter = Some(marker.to_string());
        self
    }

    pub fn with_registration(mut self, enabled: bool) -> Self {
        self.registration = enabled;
        self
    }

    pub fn failing(mut self) -> Self {
        self.behavior = Behavior::Fail;
        self
    }

    pub fn hanging(mut self) -> Self {
        self.behavior = Behavior::Hang;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.behavior = Behavior::Panic;
        self
    }

    pub fn slow_to_open(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }
}

#[async_trait]
impl EventSource for FakeSource {
    fn key(&self) -> &SourceKey {
        &self.key
    }

    fn display_name(&self) -> &str {
        self.key.as_str()
    }

    fn dedup_policy(&self) -> DedupPolicy {
        self.policy
    }

    fn supports_registration(&self) -> bool {
        self.registration
    }

    async fn open_session(&self) -> anyhow::Result<Box<dyn SourceSession>> {
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Box::new(FakeSession {
            events: self.events.clone(),
            behavior: self.behavior,
            level_filter: self.level_filter.clone(),
            page: self.registration.then(FakePage::free_and_confirming),
            logged_in: self.registration,
            closed: self.closed.clone(),
        }))
    }
}

struct FakeSession {
    events: Vec<EventRecord>,
    behavior: Behavior,
    level_filter: Option<String>,
    page: Option<FakePage>,
    logged_in: bool,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl SourceSession for FakeSession {
    async fn authenticate(&mut self) -> anyhow::Result<bool> {
        Ok(self.logged_in)
    }

    async fn fetch(&mut self) -> anyhow::Result<Vec<EventRecord>> {
        match self.behavior {
            Behavior::Succeed => Ok(self.events.clone()),
            Behavior::Fail => anyhow::bail!("listing page did not load"),
            Behavior::Hang => std::future::pending().await,
            Behavior::Panic => panic!("scraper exploded"),
        }
    }

    fn apply_domain_filters(&self, events: Vec<EventRecord>) -> Vec<EventRecord> {
        match &self.level_filter {
            Some(marker) => events
                .into_iter()
                .filter(|e| !e.level.as_deref().unwrap_or("").contains(marker.as_str()))
                .collect(),
            None => events,
        }
    }

    fn registration_page(&mut self) -> Option<&mut dyn RegistrationPage> {
        self.page.as_mut().map(|page| page as &mut dyn RegistrationPage)
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryEventStore {
    events: Mutex<Vec<EventRecord>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryEventStore {
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.events.lock().expect("store lock").clone()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn load_events(&self) -> anyhow::Result<Vec<EventRecord>> {
        Ok(self.snapshot())
    }

    async fn save_events(&self, events: &[EventRecord]) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("disk full");
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        *self.events.lock().expect("store lock") = events.to_vec();
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCounterStore {
    counters: Mutex<RetryCounter>,
    saves: AtomicUsize,
}

impl MemoryCounterStore {
    pub fn snapshot(&self) -> RetryCounter {
        self.counters.lock().expect("counter lock").clone()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn preset(&self, source: &SourceKey, value: u32) {
        self.counters.lock().expect("counter lock").set(source, value);
    }
}

#[async_trait]
impl RetryCounterStore for MemoryCounterStore {
    async fn load_counters(&self, sources: &[SourceKey]) -> anyhow::Result<RetryCounter> {
        let mut counters = self.snapshot();
        counters.ensure_sources(sources);
        Ok(counters)
    }

    async fn save_counters(&self, counters: &RetryCounter) -> anyhow::Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.counters.lock().expect("counter lock") = counters.clone();
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("notifier lock").clone()
    }

    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("smtp unreachable");
        }
        self.sent
            .lock()
            .expect("notifier lock")
            .push(notification.clone());
        Ok(())
    }
}

pub struct Harness {
    pub state: AppState,
    pub store: Arc<MemoryEventStore>,
    pub counters: Arc<MemoryCounterStore>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn state_with(sources: Vec<FakeSource>, seen: Vec<EventRecord>) -> Harness {
    let store = Arc::new(MemoryEventStore::default());
    *store.events.lock().expect("store lock") = seen;
    let counters = Arc::new(MemoryCounterStore::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let config = RuntimeConfig {
        retry_limit: 3,
        fetch_timeout_seconds: 2,
        ..RuntimeConfig::default()
    };
    let state = AppState {
        config,
        event_store: store.clone(),
        counter_store: counters.clone(),
        notifier: notifier.clone(),
        sources: sources
            .into_iter()
            .map(|source| Arc::new(source) as Arc<dyn EventSource>)
            .collect(),
        metrics: Arc::new(Metrics::default()),
    };
    Harness {
        state,
        store,
        counters,
        notifier,
    }
}
