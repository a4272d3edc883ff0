use crate::entities::RetryCounter;
use crate::value_objects::SourceKey;

/// Consecutive-failure bookkeeping. Counter state is owned by the caller and
/// threaded through explicitly.
#[derive(Debug, Clone, Copy)]
pub struct FailureAccountant {
    retry_limit: u32,
}

impl FailureAccountant {
    pub fn new(retry_limit: u32) -> Self {
        Self { retry_limit }
    }

    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    pub fn record_outcome(
        &self,
        mut counters: RetryCounter,
        source: &SourceKey,
        succeeded: bool,
    ) -> RetryCounter {
        let next = if succeeded {
            0
        } else {
            counters.get(source).saturating_add(1)
        };
        counters.set(source, next);
        counters
    }

    /// Edge-triggered: true only on the cycle the counter lands exactly on the limit.
    pub fn should_alert(&self, counters: &RetryCounter, source: &SourceKey) -> bool {
        counters.get(source) == self.retry_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_resets_after_failures() {
        let accountant = FailureAccountant::new(3);
        let source = SourceKey::from("b");
        let mut counters = RetryCounter::with_sources([&source]);
        for _ in 0..7 {
            counters = accountant.record_outcome(counters, &source, false);
        }
        assert_eq!(counters.get(&source), 7);
        counters = accountant.record_outcome(counters, &source, true);
        assert_eq!(counters.get(&source), 0);
        assert!(!accountant.should_alert(&counters, &source));
    }

    #[test]
    fn alert_fires_once_at_limit() {
        let accountant = FailureAccountant::new(3);
        let source = SourceKey::from("b");
        let mut counters = RetryCounter::default();
        let mut alerts = Vec::new();
        for _ in 0..4 {
            counters = accountant.record_outcome(counters, &source, false);
            alerts.push(accountant.should_alert(&counters, &source));
        }
        assert_eq!(alerts, vec![false, false, true, false]);
    }

    #[test]
    fn sources_are_counted_independently() {
        let accountant = FailureAccountant::new(2);
        let a = SourceKey::from("a");
        let b = SourceKey::from("b");
        let mut counters = RetryCounter::with_sources([&a, &b]);
        counters = accountant.record_outcome(counters, &a, false);
        counters = accountant.record_outcome(counters, &b, false);
        counters = accountant.record_outcome(counters, &a, true);
        assert_eq!(counters.get(&a), 0);
        assert_eq!(counters.get(&b), 1);
    }
}
