use std::env;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Installs the global subscriber: stdout plus a daily rolling file under
/// `log_dir`. File output is skipped on CI runners and when `log_dir` is
/// empty. The returned guard must live until exit to flush the file writer.
pub fn init_tracing(log_dir: &str, json: bool) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = if json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    };

    let (file_layer, guard) = if file_logging_enabled(log_dir) {
        let appender = tracing_appender::rolling::daily(log_dir, "pickup-watch.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_ansi(false).with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;
    Ok(guard)
}

fn file_logging_enabled(log_dir: &str) -> bool {
    !log_dir.trim().is_empty() && env::var_os("GITHUB_ACTIONS").is_none()
}
