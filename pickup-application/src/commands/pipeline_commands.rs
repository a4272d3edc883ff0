use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use futures_util::FutureExt;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, info_span, warn, Instrument};

use pickup_domain::ports::{EventSource, SourceSession};
use pickup_domain::{classify, EventRecord, RuntimeConfig, SourceKey};

use crate::commands::registration_commands::RegistrationEngine;

const SESSION_CLOSE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub enum SourceOutcome {
    Succeeded(Vec<EventRecord>),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source: SourceKey,
    pub display_name: String,
    pub supports_registration: bool,
    pub outcome: SourceOutcome,
}

impl SourceReport {
    pub fn failed(source: &dyn EventSource, reason: impl Into<String>) -> Self {
        Self {
            source: source.key().clone(),
            display_name: source.display_name().to_string(),
            supports_registration: source.supports_registration(),
            outcome: SourceOutcome::Failed(reason.into()),
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Succeeded(_))
    }

    pub fn new_events(&self) -> &[EventRecord] {
        match &self.outcome {
            SourceOutcome::Succeeded(events) => events,
            SourceOutcome::Failed(_) => &[],
        }
    }
}

/// Runs one source end to end. Never fails: errors, panics and timeouts all
/// come back as `SourceOutcome::Failed`, and the session is closed on every path.
pub async fn run_source_pipeline(
    source: Arc<dyn EventSource>,
    seen: Vec<EventRecord>,
    config: RuntimeConfig,
    now: NaiveDateTime,
) -> SourceReport {
    let span = info_span!("source", source = %source.key());
    async move {
        info!("starting {} poll", source.display_name());
        let outcome = match poll_source(source.as_ref(), &seen, &config, now).await {
            Ok(events) => {
                info!(
                    "{} poll completed successfully, found {} new events",
                    source.display_name(),
                    events.len()
                );
                SourceOutcome::Succeeded(events)
            }
            Err(err) => {
                warn!("{} poll failed: {:#}", source.display_name(), err);
                SourceOutcome::Failed(format!("{:#}", err))
            }
        };
        SourceReport {
            source: source.key().clone(),
            display_name: source.display_name().to_string(),
            supports_registration: source.supports_registration(),
            outcome,
        }
    }
    .instrument(span)
    .await
}

async fn poll_source(
    source: &dyn EventSource,
    seen: &[EventRecord],
    config: &RuntimeConfig,
    now: NaiveDateTime,
) -> anyhow::Result<Vec<EventRecord>> {
    // One deadline covers session start and the drive together.
    let budget = Duration::from_secs(config.fetch_timeout_seconds);
    let deadline = Instant::now() + budget;
    let mut session = timeout_at(deadline, source.open_session())
        .await
        .map_err(|_| anyhow::anyhow!("session start timed out after {:?}", budget))??;

    let driven = timeout_at(
        deadline,
        AssertUnwindSafe(drive_session(session.as_mut(), source, seen, config, now)).catch_unwind(),
    )
    .await;

    match timeout(SESSION_CLOSE_TIMEOUT, session.close()).await {
        Ok(Ok(())) => debug!("session closed"),
        Ok(Err(err)) => warn!("session close failed: {:#}", err),
        Err(_) => warn!("session close timed out"),
    }

    match driven {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(anyhow::anyhow!("pipeline panicked")),
        Err(_) => Err(anyhow::anyhow!("fetch timed out after {:?}", budget)),
    }
}

async fn drive_session(
    session: &mut dyn SourceSession,
    source: &dyn EventSource,
    seen: &[EventRecord],
    config: &RuntimeConfig,
    now: NaiveDateTime,
) -> anyhow::Result<Vec<EventRecord>> {
    let authenticated = match session.authenticate().await {
        Ok(authenticated) => authenticated,
        Err(err) => {
            warn!("login to {} failed: {:#}", source.display_name(), err);
            false
        }
    };

    let fetched = session.fetch().await?;
    info!("retrieved {} events", fetched.len());

    let total = fetched.len();
    let filtered = session.apply_domain_filters(fetched);
    info!(
        "filters removed {} of {}, {} remaining",
        total.saturating_sub(filtered.len()),
        total,
        filtered.len()
    );

    let total = filtered.len();
    let fresh = classify(source.dedup_policy(), filtered, seen);
    info!(
        "removed {} of {} seen events, {} remaining",
        total.saturating_sub(fresh.len()),
        total,
        fresh.len()
    );

    let events = match (source.supports_registration(), session.registration_page()) {
        (true, Some(page)) => {
            RegistrationEngine::from_config(config)
                .process(page, fresh, authenticated, now)
                .await
        }
        _ => fresh,
    };
    for event in &events {
        info!("found new event id {}", event.event_id);
    }
    Ok(events)
}
