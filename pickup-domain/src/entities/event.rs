// Event entity
// One observation of a pickup game listed by a source

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::entities::RegistrationAttempt;
use crate::value_objects::{EventStatus, SourceKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub organization: String,
    pub event_id: String,
    pub location: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    #[serde(default)]
    pub status: Option<EventStatus>,
    #[serde(default)]
    pub registered: Option<bool>,
    #[serde(default)]
    pub registration_date: Option<NaiveDateTime>,
    pub url: String,
    pub date_found: NaiveDateTime,
    /// Decision trail of the current cycle; never persisted.
    #[serde(skip)]
    pub registration: Option<RegistrationAttempt>,
}

impl EventRecord {
    pub fn new(
        source: &SourceKey,
        event_id: impl Into<String>,
        location: impl Into<String>,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
        url: impl Into<String>,
        date_found: NaiveDateTime,
    ) -> Self {
        Self {
            organization: source.0.clone(),
            event_id: event_id.into(),
            location: location.into(),
            level: None,
            price: None,
            start_time,
            end_time,
            status: None,
            registered: None,
            registration_date: None,
            url: url.into(),
            date_found,
            registration: None,
        }
    }

    pub fn belongs_to(&self, source: &SourceKey) -> bool {
        self.organization == source.0
    }

    pub fn slot_key(&self) -> SlotKey<'_> {
        SlotKey {
            start_time: self.start_time,
            location: &self.location,
            level: self.level.as_deref(),
        }
    }

    pub fn record_registration(&mut self, attempt: RegistrationAttempt) {
        self.registered = Some(attempt.registered());
        self.registration = Some(attempt);
    }
}

/// `(start_time, location, level)`: identity for sources whose ids are unstable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey<'a> {
    pub start_time: NaiveDateTime,
    pub location: &'a str,
    pub level: Option<&'a str>,
}
