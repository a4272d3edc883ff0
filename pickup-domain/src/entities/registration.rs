// Registration attempt entity
// Ephemeral per-cycle decision trail for one auto-registration candidate

use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IneligibleReason {
    NotAuthenticated,
    InsufficientNotice,
    ExclusionWindow,
    NotFree,
}

impl IneligibleReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IneligibleReason::NotAuthenticated => "account not logged in",
            IneligibleReason::InsufficientNotice => "starts too soon",
            IneligibleReason::ExclusionWindow => "excluded time slot",
            IneligibleReason::NotFree => "order total is not zero",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationState {
    Discovered,
    Eligible,
    Ineligible(IneligibleReason),
    AlreadyRegistered,
    Attempting,
    Confirmed,
    Unconfirmed,
    Failed(String),
}

impl RegistrationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RegistrationState::Ineligible(_)
                | RegistrationState::AlreadyRegistered
                | RegistrationState::Confirmed
                | RegistrationState::Unconfirmed
                | RegistrationState::Failed(_)
        )
    }

    fn can_move_to(&self, next: &RegistrationState) -> bool {
        use RegistrationState::*;
        match (self, next) {
            (_, Failed(_)) => !self.is_terminal(),
            (Discovered, Eligible | Ineligible(_) | AlreadyRegistered) => true,
            (Eligible, Attempting) => true,
            (Attempting, Confirmed | Unconfirmed) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid registration transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: RegistrationState,
    pub to: RegistrationState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationAttempt {
    pub event_id: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub authenticated: bool,
    pub order_total_cents: Option<u64>,
    pub state: RegistrationState,
}

impl RegistrationAttempt {
    pub fn discovered(
        event_id: impl Into<String>,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
        authenticated: bool,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            start_time,
            end_time,
            authenticated,
            order_total_cents: None,
            state: RegistrationState::Discovered,
        }
    }

    pub fn advance(&mut self, next: RegistrationState) -> Result<(), TransitionError> {
        if !self.state.can_move_to(&next) {
            return Err(TransitionError {
                from: self.state.clone(),
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn attempted(&self) -> bool {
        matches!(
            self.state,
            RegistrationState::Attempting
                | RegistrationState::Confirmed
                | RegistrationState::Unconfirmed
        )
    }

    pub fn confirmed(&self) -> bool {
        self.state == RegistrationState::Confirmed
    }

    /// Persisted flag: only a confirmed attempt counts as registered.
    pub fn registered(&self) -> bool {
        self.confirmed()
    }

    pub fn summary(&self) -> String {
        match &self.state {
            RegistrationState::Confirmed => "yes".to_string(),
            RegistrationState::Unconfirmed => "unconfirmed, check manually".to_string(),
            RegistrationState::Ineligible(reason) => format!("no ({})", reason.as_str()),
            RegistrationState::AlreadyRegistered => "already registered".to_string(),
            RegistrationState::Failed(reason) => format!("no (attempt failed: {})", reason),
            RegistrationState::Discovered
            | RegistrationState::Eligible
            | RegistrationState::Attempting => "no".to_string(),
        }
    }
}
