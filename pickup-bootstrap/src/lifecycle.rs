use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use tracing::{error, info, warn};

use pickup_application::commands::poll_commands::{run_poll_cycle, CycleReport};
use pickup_application::AppState;
use pickup_infrastructure::local_now;

/// Runs a single polling cycle. A persistence failure is returned to the caller.
pub async fn run_once(state: &AppState) -> Result<CycleReport> {
    let report = run_poll_cycle(state, local_now()).await?;
    log_report(&report);
    Ok(report)
}

/// Polls every `poll_interval_seconds` until ctrl-c or SIGTERM. Cycle errors
/// are logged and the loop keeps going.
pub async fn run_watch(state: AppState) -> Result<()> {
    let interval = Duration::from_secs(state.config.poll_interval_seconds.max(1));
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        if let Err(err) = run_once(&state).await {
            error!("cycle failed: {:#}", err);
        }
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
            _ = sleep(interval) => {}
        }
    }
    info!("{}", state.metrics.render_summary());
    Ok(())
}

fn log_report(report: &CycleReport) {
    info!(
        new_events = report.new_events,
        failed = report.failed_sources.len(),
        alerting = report.alerting_sources.len(),
        notified = report.notified,
        "cycle finished"
    );
    for source in &report.failed_sources {
        warn!(source = %source, "source failed this cycle");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("sigterm handler unavailable: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
