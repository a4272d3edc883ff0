use chrono::{Duration, NaiveDateTime, Timelike};

use crate::entities::{EventRecord, ExclusionRule, IneligibleReason, RuntimeConfig};

/// Slots deliberately skipped by auto-registration: events starting at
/// `start_hour` that last no longer than `max_duration`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionWindow {
    pub start_hour: u32,
    pub max_duration: Duration,
}

impl ExclusionWindow {
    pub fn matches(&self, start_time: NaiveDateTime, end_time: NaiveDateTime) -> bool {
        start_time.hour() == self.start_hour && end_time - start_time <= self.max_duration
    }
}

impl From<&ExclusionRule> for ExclusionWindow {
    fn from(rule: &ExclusionRule) -> Self {
        Self {
            start_hour: rule.start_hour,
            max_duration: Duration::minutes(rule.max_duration_minutes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationPolicy {
    pub min_notice: Duration,
    pub exclusions: Vec<ExclusionWindow>,
}

impl RegistrationPolicy {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            min_notice: Duration::hours(config.min_notice_hours),
            exclusions: config.exclusions.iter().map(ExclusionWindow::from).collect(),
        }
    }

    /// Checks that need no page access: login state, notice window, exclusions.
    pub fn precheck(
        &self,
        event: &EventRecord,
        authenticated: bool,
        now: NaiveDateTime,
    ) -> Result<(), IneligibleReason> {
        if !authenticated {
            return Err(IneligibleReason::NotAuthenticated);
        }
        if event.start_time - now <= self.min_notice {
            return Err(IneligibleReason::InsufficientNotice);
        }
        if self
            .exclusions
            .iter()
            .any(|window| window.matches(event.start_time, event.end_time))
        {
            return Err(IneligibleReason::ExclusionWindow);
        }
        Ok(())
    }

    /// Only a verified zero total is free; an unreadable total is not.
    pub fn check_order_total(&self, total_cents: Option<u64>) -> Result<(), IneligibleReason> {
        match total_cents {
            Some(0) => Ok(()),
            _ => Err(IneligibleReason::NotFree),
        }
    }
}
