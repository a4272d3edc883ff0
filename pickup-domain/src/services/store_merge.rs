use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::entities::EventRecord;
use crate::value_objects::SourceKey;

/// Appends `new_events` to the store, keeps the last row per `event_id`, and
/// drops events that already started. Surviving rows keep their relative order.
pub fn merge_seen_events(
    existing: Vec<EventRecord>,
    new_events: Vec<EventRecord>,
    now: NaiveDateTime,
) -> Vec<EventRecord> {
    let combined: Vec<EventRecord> = existing.into_iter().chain(new_events).collect();
    let mut last_index: HashMap<String, usize> = HashMap::new();
    for (index, record) in combined.iter().enumerate() {
        last_index.insert(record.event_id.clone(), index);
    }
    combined
        .into_iter()
        .enumerate()
        .filter(|(index, record)| last_index.get(&record.event_id) == Some(index))
        .map(|(_, record)| record)
        .filter(|record| record.start_time > now)
        .collect()
}

pub fn records_for_source(store: &[EventRecord], source: &SourceKey) -> Vec<EventRecord> {
    store
        .iter()
        .filter(|record| record.belongs_to(source))
        .cloned()
        .collect()
}
