use std::collections::{HashMap, HashSet};

use crate::entities::{EventRecord, SlotKey};
use crate::value_objects::EventStatus;

/// How a source decides that a scraped record was already seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Seen iff a stored record shares the `event_id`.
    Identity,
    /// Like `Identity`, except a blocked -> `Available` move re-surfaces the event.
    StatusLifecycle,
    /// Seen iff a stored record shares `(start_time, location, level)`.
    SlotTuple,
}

/// Returns the records of `new_records` that are new relative to `existing`.
///
/// `existing` must already be narrowed to the source being reconciled. Domain
/// filters (level, open/closed) are the caller's job. Duplicates inside the
/// fresh batch collapse onto their first occurrence.
pub fn classify(
    policy: DedupPolicy,
    new_records: Vec<EventRecord>,
    existing: &[EventRecord],
) -> Vec<EventRecord> {
    match policy {
        DedupPolicy::Identity => {
            let seen: HashSet<&str> = existing.iter().map(|r| r.event_id.as_str()).collect();
            dedup_batch(new_records, |r| r.event_id.clone())
                .into_iter()
                .filter(|r| !seen.contains(r.event_id.as_str()))
                .collect()
        }
        DedupPolicy::StatusLifecycle => {
            // The latest stored observation wins when an id was written more than once.
            let mut latest: HashMap<&str, &EventRecord> = HashMap::new();
            for record in existing {
                latest.insert(record.event_id.as_str(), record);
            }
            dedup_batch(new_records, |r| r.event_id.clone())
                .into_iter()
                .filter(|r| match latest.get(r.event_id.as_str()) {
                    None => true,
                    Some(previous) => is_reopened(previous, r),
                })
                .collect()
        }
        DedupPolicy::SlotTuple => {
            let seen: HashSet<SlotKey<'_>> = existing.iter().map(EventRecord::slot_key).collect();
            dedup_batch(new_records, owned_slot)
                .into_iter()
                .filter(|r| !seen.contains(&r.slot_key()))
                .collect()
        }
    }
}

/// A blocked slot (filled, waitlisted, members only) that is open to everyone again.
pub fn is_reopened(previous: &EventRecord, current: &EventRecord) -> bool {
    let now_available = current.status == Some(EventStatus::Available);
    let was_blocked = previous
        .status
        .as_ref()
        .map(EventStatus::is_blocked)
        .unwrap_or(false);
    now_available && was_blocked
}

fn owned_slot(record: &EventRecord) -> (chrono::NaiveDateTime, String, Option<String>) {
    (
        record.start_time,
        record.location.clone(),
        record.level.clone(),
    )
}

fn dedup_batch<K, F>(records: Vec<EventRecord>, key: F) -> Vec<EventRecord>
where
    K: std::hash::Hash + Eq,
    F: Fn(&EventRecord) -> K,
{
    let mut keys = HashSet::new();
    records
        .into_iter()
        .filter(|record| keys.insert(key(record)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::SourceKey;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2031, 3, 14)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .expect("valid time")
    }

    fn record(id: &str, status: Option<EventStatus>, start: NaiveDateTime) -> EventRecord {
        let mut record = EventRecord::new(
            &SourceKey::from("org_a"),
            id,
            "Gym",
            start,
            start + Duration::hours(2),
            format!("https://example.test/{id}"),
            at(1),
        );
        record.status = status;
        record
    }

    fn ids(records: &[EventRecord]) -> Vec<&str> {
        records.iter().map(|r| r.event_id.as_str()).collect()
    }

    #[test]
    fn identity_drops_known_ids() {
        let existing = vec![record("id1", None, at(10))];
        let fresh = vec![record("id1", None, at(10)), record("id2", None, at(11))];
        let out = classify(DedupPolicy::Identity, fresh, &existing);
        assert_eq!(ids(&out), vec!["id2"]);
    }

    #[test]
    fn lifecycle_resurfaces_filled_to_available() {
        let existing = vec![record("id1", Some(EventStatus::Filled), at(10))];
        let fresh = vec![
            record("id1", Some(EventStatus::Available), at(10)),
            record("id2", Some(EventStatus::Available), at(11)),
        ];
        let out = classify(DedupPolicy::StatusLifecycle, fresh, &existing);
        assert_eq!(ids(&out), vec!["id1", "id2"]);
    }

    #[test]
    fn lifecycle_resurfaces_waitlist_and_members_only() {
        let existing = vec![
            record("w", Some(EventStatus::Waitlist), at(10)),
            record("m", Some(EventStatus::MembersOnly), at(11)),
        ];
        let fresh = vec![
            record("w", Some(EventStatus::Available), at(10)),
            record("m", Some(EventStatus::Available), at(11)),
        ];
        let out = classify(DedupPolicy::StatusLifecycle, fresh, &existing);
        assert_eq!(ids(&out), vec!["w", "m"]);
    }

    #[test]
    fn lifecycle_suppresses_less_open_or_unchanged() {
        let existing = vec![
            record("a", Some(EventStatus::Available), at(10)),
            record("b", Some(EventStatus::Filled), at(11)),
            record("c", Some(EventStatus::Upcoming), at(12)),
        ];
        let fresh = vec![
            record("a", Some(EventStatus::Filled), at(10)),
            record("b", Some(EventStatus::Filled), at(11)),
            record("c", Some(EventStatus::Filled), at(12)),
        ];
        assert!(classify(DedupPolicy::StatusLifecycle, fresh, &existing).is_empty());
    }

    #[test]
    fn lifecycle_upcoming_to_available_is_not_a_reopen() {
        let existing = vec![record("a", Some(EventStatus::Upcoming), at(10))];
        let fresh = vec![record("a", Some(EventStatus::Available), at(10))];
        assert!(classify(DedupPolicy::StatusLifecycle, fresh, &existing).is_empty());
    }

    #[test]
    fn lifecycle_uses_latest_stored_status() {
        let existing = vec![
            record("a", Some(EventStatus::Filled), at(10)),
            record("a", Some(EventStatus::Available), at(10)),
        ];
        let fresh = vec![record("a", Some(EventStatus::Available), at(10))];
        assert!(classify(DedupPolicy::StatusLifecycle, fresh, &existing).is_empty());
    }

    #[test]
    fn slot_tuple_ignores_unstable_ids() {
        let mut first = record("x1", None, at(18));
        first.level = Some("Int".to_string());
        let mut second = record("x2", None, at(18));
        second.level = Some("Int".to_string());

        let out = classify(DedupPolicy::SlotTuple, vec![first.clone(), second.clone()], &[]);
        assert_eq!(ids(&out), vec!["x1"]);

        let out = classify(DedupPolicy::SlotTuple, vec![second], &[first]);
        assert!(out.is_empty());
    }

    #[test]
    fn slot_tuple_distinguishes_levels() {
        let mut stored = record("x1", None, at(18));
        stored.level = Some("Int".to_string());
        let mut fresh = record("x9", None, at(18));
        fresh.level = Some("Adv".to_string());
        let out = classify(DedupPolicy::SlotTuple, vec![fresh], &[stored]);
        assert_eq!(ids(&out), vec!["x9"]);
    }
}
