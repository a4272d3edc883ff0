use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    cycles: AtomicU64,
    cycle_errors: AtomicU64,
    events_found: AtomicU64,
    source_failures: AtomicU64,
    notifications_sent: AtomicU64,
    notification_errors: AtomicU64,
}

impl Metrics {
    pub fn record_cycle(&self, events_found: usize, source_failures: usize) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.events_found
            .fetch_add(events_found as u64, Ordering::Relaxed);
        self.source_failures
            .fetch_add(source_failures as u64, Ordering::Relaxed);
    }

    pub fn record_cycle_error(&self) {
        self.cycle_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification(&self, delivered: bool) {
        if delivered {
            self.notifications_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.notification_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn render_summary(&self) -> String {
        format!(
            "cycles={} cycle_errors={} events_found={} source_failures={} notifications_sent={} notification_errors={}",
            self.cycles.load(Ordering::Relaxed),
            self.cycle_errors.load(Ordering::Relaxed),
            self.events_found.load(Ordering::Relaxed),
            self.source_failures.load(Ordering::Relaxed),
            self.notifications_sent.load(Ordering::Relaxed),
            self.notification_errors.load(Ordering::Relaxed),
        )
    }
}
