use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use pickup_domain::ports::RegistrationPage;
use pickup_domain::{
    EventRecord, IneligibleReason, RegistrationAttempt, RegistrationPolicy, RegistrationState,
    RuntimeConfig,
};

/// Decides per new event whether to sign up automatically and drives the
/// signup protocol on the source's page. Events are handled one at a time
/// because every attempt mutates the shared page.
pub struct RegistrationEngine {
    policy: RegistrationPolicy,
    confirmation_budget: Duration,
}

impl RegistrationEngine {
    pub fn new(policy: RegistrationPolicy, confirmation_budget: Duration) -> Self {
        Self {
            policy,
            confirmation_budget,
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(
            RegistrationPolicy::from_config(config),
            Duration::from_secs(config.confirmation_timeout_seconds),
        )
    }

    /// Attaches an outcome to every event. Events the account already holds a
    /// spot for are not new and are dropped.
    pub async fn process(
        &self,
        page: &mut dyn RegistrationPage,
        events: Vec<EventRecord>,
        authenticated: bool,
        now: NaiveDateTime,
    ) -> Vec<EventRecord> {
        let mut out = Vec::with_capacity(events.len());
        for mut event in events {
            let attempt = self.evaluate(page, &event, authenticated, now).await;
            if attempt.state == RegistrationState::AlreadyRegistered {
                info!("found event id {} but already registered", event.event_id);
                continue;
            }
            info!(
                "event id {} registration: {}",
                event.event_id,
                attempt.summary()
            );
            event.record_registration(attempt);
            out.push(event);
        }
        out
    }

    /// Runs one event through the state machine. Errors end in `Failed`
    /// without touching other candidates.
    pub async fn evaluate(
        &self,
        page: &mut dyn RegistrationPage,
        event: &EventRecord,
        authenticated: bool,
        now: NaiveDateTime,
    ) -> RegistrationAttempt {
        let mut attempt = RegistrationAttempt::discovered(
            event.event_id.clone(),
            event.start_time,
            event.end_time,
            authenticated,
        );
        if let Err(err) = self.drive(page, event, &mut attempt, now).await {
            warn!(
                "registration for event id {} aborted: {:#}",
                event.event_id, err
            );
            if attempt.advance(RegistrationState::Failed(err.to_string())).is_err() {
                debug!("event id {} already settled as {:?}", event.event_id, attempt.state);
            }
        }
        attempt
    }

    async fn drive(
        &self,
        page: &mut dyn RegistrationPage,
        event: &EventRecord,
        attempt: &mut RegistrationAttempt,
        now: NaiveDateTime,
    ) -> anyhow::Result<()> {
        if !attempt.authenticated {
            attempt.advance(RegistrationState::Ineligible(
                IneligibleReason::NotAuthenticated,
            ))?;
            return Ok(());
        }

        page.open_event(event).await?;
        if page.already_registered().await? {
            attempt.advance(RegistrationState::AlreadyRegistered)?;
            return Ok(());
        }
        if let Err(reason) = self.policy.precheck(event, attempt.authenticated, now) {
            attempt.advance(RegistrationState::Ineligible(reason))?;
            return Ok(());
        }

        let total = page.order_total_cents().await?;
        attempt.order_total_cents = total;
        if let Err(reason) = self.policy.check_order_total(total) {
            attempt.advance(RegistrationState::Ineligible(reason))?;
            return Ok(());
        }

        attempt.advance(RegistrationState::Eligible)?;
        attempt.advance(RegistrationState::Attempting)?;
        let ticked = page.accept_consents().await?;
        debug!("selected {} consent checkbox(es)", ticked);
        page.submit_registration().await?;

        if page.confirmation_visible(self.confirmation_budget).await? {
            attempt.advance(RegistrationState::Confirmed)?;
        } else {
            warn!(
                "attempted to register for event id {} but could not identify confirmation",
                event.event_id
            );
            attempt.advance(RegistrationState::Unconfirmed)?;
        }
        Ok(())
    }
}
