// Event status value object

use serde::{Deserialize, Serialize};

/// Source-defined availability tag. The set is open: unknown tags are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventStatus {
    Available,
    Filled,
    Waitlist,
    Upcoming,
    MembersOnly,
    Other(String),
}

impl EventStatus {
    pub fn as_str(&self) -> &str {
        match self {
            EventStatus::Available => "Available",
            EventStatus::Filled => "Filled",
            EventStatus::Waitlist => "Waitlist",
            EventStatus::Upcoming => "Upcoming",
            EventStatus::MembersOnly => "Members Only",
            EventStatus::Other(raw) => raw,
        }
    }

    /// Statuses from which a move back to `Available` counts as a reopening.
    pub fn is_blocked(&self) -> bool {
        matches!(
            self,
            EventStatus::Filled | EventStatus::Waitlist | EventStatus::MembersOnly
        )
    }
}

impl From<&str> for EventStatus {
    fn from(s: &str) -> Self {
        let key: String = s
            .chars()
            .filter(|ch| !ch.is_whitespace() && *ch != '_' && *ch != '-')
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "available" => EventStatus::Available,
            "filled" => EventStatus::Filled,
            "waitlist" => EventStatus::Waitlist,
            "upcoming" => EventStatus::Upcoming,
            "membersonly" => EventStatus::MembersOnly,
            _ => EventStatus::Other(s.trim().to_string()),
        }
    }
}

impl From<String> for EventStatus {
    fn from(s: String) -> Self {
        EventStatus::from(s.as_str())
    }
}

impl From<EventStatus> for String {
    fn from(status: EventStatus) -> Self {
        status.as_str().to_string()
    }
}
