use chrono::NaiveDateTime;
use futures_util::future::join_all;
use tracing::{error, info, warn};

use pickup_domain::{
    merge_seen_events, records_for_source, EventRecord, FailureAccountant, RetryCounter,
    SourceKey,
};

use crate::commands::notification_commands::build_notification;
use crate::commands::pipeline_commands::{run_source_pipeline, SourceReport};
use crate::{AppError, AppState};

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub new_events: usize,
    pub failed_sources: Vec<SourceKey>,
    pub alerting_sources: Vec<SourceKey>,
    pub notified: bool,
    /// Store size after the merge; `None` when nothing new was written.
    pub stored_events: Option<usize>,
}

/// One polling cycle. Retry counters are written back on every path once
/// loaded, even when the store write fails.
pub async fn run_poll_cycle(state: &AppState, now: NaiveDateTime) -> Result<CycleReport, AppError> {
    info!("starting polling cycle over {} source(s)", state.sources.len());
    let store = state
        .event_store
        .load_events()
        .await
        .map_err(AppError::Persistence)?;
    info!("retrieved {} seen events", store.len());
    let counters = state
        .counter_store
        .load_counters(&state.source_keys())
        .await
        .map_err(AppError::Persistence)?;

    let (result, counters) = process_cycle(state, store, counters, now).await;

    if let Err(err) = state.counter_store.save_counters(&counters).await {
        error!("failed to write retry counters: {:#}", err);
        if result.is_ok() {
            state.metrics.record_cycle_error();
            return Err(AppError::Persistence(err));
        }
    }
    match &result {
        Ok(report) => {
            state
                .metrics
                .record_cycle(report.new_events, report.failed_sources.len());
            info!("polling cycle completed, found {} new events", report.new_events);
        }
        Err(err) => {
            state.metrics.record_cycle_error();
            error!("polling cycle failed: {}", err);
        }
    }
    result
}

async fn process_cycle(
    state: &AppState,
    store: Vec<EventRecord>,
    mut counters: RetryCounter,
    now: NaiveDateTime,
) -> (Result<CycleReport, AppError>, RetryCounter) {
    let handles: Vec<_> = state
        .sources
        .iter()
        .map(|source| {
            let seen = records_for_source(&store, source.key());
            tokio::spawn(run_source_pipeline(
                source.clone(),
                seen,
                state.config.clone(),
                now,
            ))
        })
        .collect();
    let reports: Vec<SourceReport> = join_all(handles)
        .await
        .into_iter()
        .zip(state.sources.iter())
        .map(|(joined, source)| match joined {
            Ok(report) => report,
            Err(err) => SourceReport::failed(
                source.as_ref(),
                format!("pipeline task aborted: {}", err),
            ),
        })
        .collect();

    let accountant = FailureAccountant::new(state.config.retry_limit);
    let mut report = CycleReport::default();
    for source in &reports {
        counters = accountant.record_outcome(counters, &source.source, source.succeeded());
        if !source.succeeded() {
            warn!(
                "{} failed, retry count: {}",
                source.source,
                counters.get(&source.source)
            );
            report.failed_sources.push(source.source.clone());
        }
    }
    let alerting: Vec<&SourceReport> = reports
        .iter()
        .filter(|source| accountant.should_alert(&counters, &source.source))
        .collect();
    report.alerting_sources = alerting.iter().map(|s| s.source.clone()).collect();

    let new_events: Vec<EventRecord> = reports
        .iter()
        .flat_map(|source| source.new_events().iter().cloned())
        .collect();
    report.new_events = new_events.len();

    if let Some(notification) = build_notification(&reports, &alerting, accountant.retry_limit()) {
        match state.notifier.send(&notification).await {
            Ok(()) => {
                info!("notification sent: {}", notification.subject);
                report.notified = true;
            }
            Err(err) => warn!("failed to send notification: {:#}", err),
        }
        state.metrics.record_notification(report.notified);
    }

    if !new_events.is_empty() {
        let merged = merge_seen_events(store, new_events, now);
        if let Err(err) = state.event_store.save_events(&merged).await {
            return (Err(AppError::Persistence(err)), counters);
        }
        info!("{} events written", merged.len());
        report.stored_events = Some(merged.len());
    }

    (Ok(report), counters)
}
