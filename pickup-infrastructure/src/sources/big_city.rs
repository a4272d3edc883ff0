use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info};

use pickup_domain::{DedupPolicy, EventRecord, EventSource, EventStatus, SourceKey, SourceSession};

use crate::config::BigCityConfig;
use crate::utils::{http_client, local_now};

pub const BIG_CITY_KEY: &str = "big_city";

pub struct BigCitySource {
    key: SourceKey,
    config: Arc<BigCityConfig>,
    client: Client,
}

impl BigCitySource {
    pub fn new(config: BigCityConfig, request_timeout_seconds: u64) -> Result<Self> {
        Ok(Self {
            key: SourceKey::from(BIG_CITY_KEY),
            config: Arc::new(config),
            client: http_client(request_timeout_seconds)?,
        })
    }
}

#[async_trait]
impl EventSource for BigCitySource {
    fn key(&self) -> &SourceKey {
        &self.key
    }

    fn display_name(&self) -> &str {
        &self.config.display_name
    }

    fn dedup_policy(&self) -> DedupPolicy {
        DedupPolicy::StatusLifecycle
    }

    async fn open_session(&self) -> Result<Box<dyn SourceSession>> {
        Ok(Box::new(BigCitySession {
            key: self.key.clone(),
            config: self.config.clone(),
            client: self.client.clone(),
        }))
    }
}

struct BigCitySession {
    key: SourceKey,
    config: Arc<BigCityConfig>,
    client: Client,
}

#[async_trait]
impl SourceSession for BigCitySession {
    async fn fetch(&mut self) -> Result<Vec<EventRecord>> {
        info!(url = %self.config.api_url, "fetching events from api");
        let envelope: ApiEnvelope = self
            .client
            .get(&self.config.api_url)
            .query(&self.config.params)
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse_listing(&self.key, &self.config.base_url, envelope, Utc::now(), local_now())
    }

    fn apply_domain_filters(&self, events: Vec<EventRecord>) -> Vec<EventRecord> {
        let levels = &self.config.levels;
        events
            .into_iter()
            .filter(|event| {
                let keep = event
                    .level
                    .as_ref()
                    .is_some_and(|level| levels.iter().any(|wanted| wanted == level));
                if !keep {
                    debug!(event_id = %event.event_id, level = ?event.level, "level filtered out");
                }
                keep
            })
            .collect()
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    response: Option<i64>,
    message: Option<String>,
    result: Option<ApiResult>,
}

#[derive(Debug, Deserialize)]
struct ApiResult {
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    #[serde(rename = "aliasID")]
    alias_id: String,
    start: String,
    end: String,
    place: Option<ApiPlace>,
    data: Option<ApiEventData>,
    #[serde(default)]
    tickets_summary: Vec<ApiTicket>,
    max_attendees: Option<i64>,
    registered_attendees: Option<i64>,
    waitlist_user_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ApiPlace {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiEventData {
    level: Option<ApiLevel>,
}

#[derive(Debug, Deserialize)]
struct ApiLevel {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ApiTicket {
    #[serde(rename = "ruleID")]
    rule_id: Option<Value>,
    price: Option<Value>,
    #[serde(rename = "salesStart")]
    sales_start: Option<String>,
}

impl ApiTicket {
    fn is_public(&self) -> bool {
        matches!(self.rule_id, None | Some(Value::Null))
    }

    fn sales_start(&self) -> Option<DateTime<Utc>> {
        self.sales_start.as_deref().and_then(|raw| parse_utc(raw).ok())
    }

    /// Tickets without a sales start count as already on sale.
    fn on_sale(&self, now: DateTime<Utc>) -> bool {
        self.sales_start().map_or(true, |start| start <= now)
    }
}

fn parse_listing(
    key: &SourceKey,
    base_url: &str,
    envelope: ApiEnvelope,
    now: DateTime<Utc>,
    found_at: NaiveDateTime,
) -> Result<Vec<EventRecord>> {
    if envelope.response != Some(200) {
        bail!(
            "events api returned status {:?}: {}",
            envelope.response,
            envelope.message.unwrap_or_default()
        );
    }
    let raw_events = envelope.result.map(|result| result.data).unwrap_or_default();
    debug!("api returned {} events", raw_events.len());

    let mut events = Vec::with_capacity(raw_events.len());
    for raw in raw_events {
        let alias = raw
            .get("aliasID")
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_string();
        let parsed = serde_json::from_value::<ApiEvent>(raw)
            .map_err(anyhow::Error::from)
            .and_then(|event| parse_event(key, base_url, event, now, found_at));
        match parsed {
            Ok(event) => events.push(event),
            Err(err) => error!(alias = %alias, "failed to parse event: {:#}", err),
        }
    }
    info!("parsed {} events", events.len());
    Ok(events)
}

fn parse_event(
    key: &SourceKey,
    base_url: &str,
    event: ApiEvent,
    now: DateTime<Utc>,
    found_at: NaiveDateTime,
) -> Result<EventRecord> {
    let event_id = event
        .alias_id
        .trim_end_matches('-')
        .rsplit('-')
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| anyhow!("alias without id segment"))?
        .to_string();
    let url = format!("{}/posts/{}", base_url.trim_end_matches('/'), event.alias_id);
    let start = to_local(parse_utc(&event.start)?);
    let end = to_local(parse_utc(&event.end)?);
    let location = event
        .place
        .as_ref()
        .and_then(|place| place.title.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    let public: Vec<&ApiTicket> = event.tickets_summary.iter().filter(|t| t.is_public()).collect();
    let price = public
        .first()
        .and_then(|ticket| ticket.price.as_ref())
        .or_else(|| event.tickets_summary.first().and_then(|ticket| ticket.price.as_ref()))
        .and_then(price_text);
    let (status, registration_opens) = determine_status(&event, &public, now);

    let mut record = EventRecord::new(key, event_id, location, start, end, url, found_at);
    record.level = event.data.and_then(|data| data.level).map(|level| level.title);
    record.price = price;
    record.status = Some(status);
    record.registration_date = registration_opens.map(to_local);
    Ok(record)
}

/// Returns the status plus, for `Upcoming`, when public sales open.
fn determine_status(
    event: &ApiEvent,
    public: &[&ApiTicket],
    now: DateTime<Utc>,
) -> (EventStatus, Option<DateTime<Utc>>) {
    let capacity = event.max_attendees.unwrap_or(0);
    let registered = event.registered_attendees.unwrap_or(0);
    if capacity > 0 && registered >= capacity {
        return if event.waitlist_user_count.unwrap_or(0) > 0 {
            (EventStatus::Waitlist, None)
        } else {
            (EventStatus::Filled, None)
        };
    }

    let tickets = &event.tickets_summary;
    if !public.is_empty() {
        // An undated public ticket is on sale, so it alone keeps the event Available.
        if public.iter().all(|ticket| !ticket.on_sale(now)) {
            let members_on_sale = tickets
                .iter()
                .filter(|ticket| !ticket.is_public())
                .any(|ticket| ticket.sales_start().is_some_and(|start| start <= now));
            if members_on_sale {
                return (EventStatus::MembersOnly, None);
            }
            let opens = public.iter().filter_map(|ticket| ticket.sales_start()).min();
            return (EventStatus::Upcoming, opens);
        }
    } else if !tickets.is_empty() && tickets.iter().all(|ticket| !ticket.on_sale(now)) {
        let opens = tickets.iter().filter_map(ApiTicket::sales_start).min();
        return (EventStatus::Upcoming, opens);
    }
    (EventStatus::Available, None)
}

fn price_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn parse_utc(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(|err| anyhow!("invalid timestamp {:?}: {}", raw, err))?
        .with_timezone(&Utc))
}

fn to_local(value: DateTime<Utc>) -> NaiveDateTime {
    value.with_timezone(&Local).naive_local()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn now() -> DateTime<Utc> {
        parse_utc("2031-03-10T12:00:00Z").expect("valid")
    }

    fn found_at() -> NaiveDateTime {
        to_local(now())
    }

    fn api_event(alias: &str, tickets: Value) -> Value {
        json!({
            "aliasID": alias,
            "start": "2031-03-14T23:00:00Z",
            "end": "2031-03-15T01:00:00.000Z",
            "place": { "title": "Community Gym" },
            "data": { "level": { "title": "A" } },
            "ticketsSummary": tickets,
            "maxAttendees": 18,
            "registeredAttendees": 4,
            "waitlistUserCount": 0
        })
    }

    fn status_of(event: Value) -> (Option<EventStatus>, Option<NaiveDateTime>) {
        let envelope = ApiEnvelope {
            response: Some(200),
            message: None,
            result: Some(ApiResult { data: vec![event] }),
        };
        let records = parse_listing(&SourceKey::from(BIG_CITY_KEY), "https://bc.test", envelope, now(), found_at())
            .expect("listing");
        let record = records.into_iter().next().expect("one record");
        (record.status, record.registration_date)
    }

    #[test]
    fn parses_identity_and_fields() {
        let envelope: ApiEnvelope = serde_json::from_value(json!({
            "response": 200,
            "result": { "data": [
                api_event("friday-night-a-6-8pm-4521-", json!([
                    { "ruleID": "members", "price": 5, "salesStart": "2031-03-01T00:00:00Z" },
                    { "ruleID": null, "price": "15.00", "salesStart": "2031-03-01T00:00:00Z" }
                ])),
                { "aliasID": "broken" }
            ]}
        }))
        .expect("envelope");
        let records = parse_listing(&SourceKey::from(BIG_CITY_KEY), "https://bc.test/", envelope, now(), found_at())
            .expect("listing");

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.event_id, "4521");
        assert_eq!(record.organization, BIG_CITY_KEY);
        assert_eq!(record.url, "https://bc.test/posts/friday-night-a-6-8pm-4521-");
        assert_eq!(record.location, "Community Gym");
        assert_eq!(record.level.as_deref(), Some("A"));
        assert_eq!(record.price.as_deref(), Some("15.00"));
        assert_eq!(record.status, Some(EventStatus::Available));
        assert_eq!(record.start_time, to_local(parse_utc("2031-03-14T23:00:00Z").expect("valid")));
        assert_eq!(record.end_time - record.start_time, chrono::Duration::hours(2));
        assert!(record.registration_date.is_none());
    }

    #[test]
    fn non_200_response_fails_the_fetch() {
        let envelope: ApiEnvelope =
            serde_json::from_value(json!({ "response": 500, "message": "maintenance" })).expect("envelope");
        let err = parse_listing(&SourceKey::from(BIG_CITY_KEY), "https://bc.test", envelope, now(), found_at())
            .expect_err("must fail");
        assert!(err.to_string().contains("maintenance"));
    }

    #[test]
    fn full_events_are_filled_or_waitlisted() {
        let mut event = api_event("x-1", json!([]));
        event["registeredAttendees"] = json!(18);
        assert_eq!(status_of(event.clone()).0, Some(EventStatus::Filled));
        event["waitlistUserCount"] = json!(2);
        assert_eq!(status_of(event).0, Some(EventStatus::Waitlist));
    }

    #[test]
    fn future_public_sales_are_upcoming_or_members_only() {
        let upcoming = api_event("x-2", json!([
            { "ruleID": null, "price": 15, "salesStart": "2031-03-12T14:00:00Z" },
            { "ruleID": null, "price": 15, "salesStart": "2031-03-11T14:00:00Z" },
            { "ruleID": "m", "price": 5, "salesStart": "2031-03-11T00:00:00Z" }
        ]));
        let (status, opens) = status_of(upcoming);
        assert_eq!(status, Some(EventStatus::Upcoming));
        assert_eq!(opens, Some(to_local(parse_utc("2031-03-11T14:00:00Z").expect("valid"))));

        let members = api_event("x-3", json!([
            { "ruleID": null, "price": 15, "salesStart": "2031-03-12T14:00:00Z" },
            { "ruleID": "m", "price": 5, "salesStart": "2031-03-09T00:00:00Z" }
        ]));
        assert_eq!(status_of(members), (Some(EventStatus::MembersOnly), None));
    }

    #[test]
    fn undated_tickets_count_as_on_sale() {
        let undated = api_event("x-6", json!([
            { "ruleID": null, "price": 15 }
        ]));
        assert_eq!(status_of(undated), (Some(EventStatus::Available), None));

        let mixed = api_event("x-7", json!([
            { "ruleID": null, "price": 15, "salesStart": "2031-03-12T14:00:00Z" },
            { "ruleID": null, "price": 20, "salesStart": null }
        ]));
        assert_eq!(status_of(mixed).0, Some(EventStatus::Available));

        let members_undated = api_event("x-8", json!([
            { "ruleID": "m", "price": 5 }
        ]));
        assert_eq!(status_of(members_undated).0, Some(EventStatus::Available));
    }

    #[test]
    fn member_only_ticket_lists_follow_their_own_sales() {
        let future = api_event("x-4", json!([
            { "ruleID": "m", "price": 5, "salesStart": "2031-03-12T00:00:00Z" }
        ]));
        assert_eq!(status_of(future).0, Some(EventStatus::Upcoming));

        let open = api_event("x-5", json!([
            { "ruleID": "m", "price": 5, "salesStart": "2031-03-01T00:00:00Z" }
        ]));
        assert_eq!(status_of(open).0, Some(EventStatus::Available));
    }

    #[test]
    fn level_filter_keeps_configured_levels() {
        let session = BigCitySession {
            key: SourceKey::from(BIG_CITY_KEY),
            config: Arc::new(BigCityConfig::default()),
            client: Client::new(),
        };
        let mut keep = EventRecord::new(&session.key, "1", "Gym", found_at(), found_at(), "u", found_at());
        keep.level = Some("A".to_string());
        let mut drop = keep.clone();
        drop.event_id = "2".to_string();
        drop.level = Some("BB".to_string());
        let mut none = keep.clone();
        none.event_id = "3".to_string();
        none.level = None;

        let kept = session.apply_domain_filters(vec![keep, drop, none]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].event_id, "1");
    }
}
