use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, error, info};

use pickup_domain::{DedupPolicy, EventRecord, EventSource, EventStatus, SourceKey, SourceSession};

use crate::config::{NewYorkUrbanConfig, VenueConfig};
use crate::utils::{end_after, http_client, local_now, parse_time_range, upcoming_datetime};

pub const NEW_YORK_URBAN_KEY: &str = "new_york_urban";

const NO_OPEN_SESSION: &str = "NO OPEN SESSION";

pub struct NewYorkUrbanSource {
    key: SourceKey,
    config: Arc<NewYorkUrbanConfig>,
    client: Client,
}

impl NewYorkUrbanSource {
    pub fn new(config: NewYorkUrbanConfig, request_timeout_seconds: u64) -> Result<Self> {
        Ok(Self {
            key: SourceKey::from(NEW_YORK_URBAN_KEY),
            config: Arc::new(config),
            client: http_client(request_timeout_seconds)?,
        })
    }
}

#[async_trait]
impl EventSource for NewYorkUrbanSource {
    fn key(&self) -> &SourceKey {
        &self.key
    }

    fn display_name(&self) -> &str {
        &self.config.display_name
    }

    fn dedup_policy(&self) -> DedupPolicy {
        DedupPolicy::SlotTuple
    }

    async fn open_session(&self) -> Result<Box<dyn SourceSession>> {
        Ok(Box::new(NewYorkUrbanSession {
            key: self.key.clone(),
            config: self.config.clone(),
            client: self.client.clone(),
        }))
    }
}

struct NewYorkUrbanSession {
    key: SourceKey,
    config: Arc<NewYorkUrbanConfig>,
    client: Client,
}

impl NewYorkUrbanSession {
    async fn fetch_venue(&self, venue: &VenueConfig) -> Result<String> {
        let form = [
            ("action", self.config.ajax_action.clone()),
            ("gametypeid", self.config.gametype_id.to_string()),
            ("buttonid", venue.buttonid.to_string()),
            ("filterid", venue.filterid.to_string()),
        ];
        let body = self
            .client
            .post(&self.config.ajax_url)
            .header("X-Requested-With", "XMLHttpRequest")
            .header("Referer", &self.config.query_url)
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}

#[async_trait]
impl SourceSession for NewYorkUrbanSession {
    async fn fetch(&mut self) -> Result<Vec<EventRecord>> {
        let mut events = Vec::new();
        for venue in &self.config.venues {
            let body = self.fetch_venue(venue).await?;
            let venue_events = parse_schedule(&self.key, &self.config.query_url, &body, local_now())?;
            info!(venue = %venue.name, "retrieved {} events", venue_events.len());
            events.extend(venue_events);
        }
        info!("retrieved {} events across venues", events.len());
        Ok(events)
    }

    fn apply_domain_filters(&self, events: Vec<EventRecord>) -> Vec<EventRecord> {
        let marker = self.config.excluded_level_marker.as_str();
        let full = self.config.full_status.as_str();
        events
            .into_iter()
            .filter(|event| {
                let excluded_level = !marker.is_empty()
                    && event.level.as_deref().is_some_and(|level| level.contains(marker));
                let sold_out = event.status.as_ref().is_some_and(|status| status.as_str() == full);
                if excluded_level || sold_out {
                    debug!(event_id = %event.event_id, "filtered out");
                }
                !excluded_level && !sold_out
            })
            .collect()
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|err| anyhow!("invalid selector {:?}: {:?}", css, err))
}

/// Parses one venue response. Rows that do not parse are logged and skipped.
fn parse_schedule(
    key: &SourceKey,
    url: &str,
    body: &str,
    now: NaiveDateTime,
) -> Result<Vec<EventRecord>> {
    if body.contains(NO_OPEN_SESSION) {
        return Ok(Vec::new());
    }
    let document = Html::parse_fragment(body);
    let table_sel = selector("table")?;
    let header_sel = selector("th")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("td")?;
    let checkbox_sel = selector("input[type='checkbox']")?;

    let table = document.select(&table_sel).find(|table| {
        table
            .select(&header_sel)
            .any(|th| element_text(&th).contains("Date"))
    });
    let Some(table) = table else {
        return Err(anyhow!("schedule table not found in venue response"));
    };

    let mut events = Vec::new();
    for row in table.select(&row_sel) {
        let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
        if cells.is_empty() {
            continue;
        }
        match parse_row(key, url, &cells, &checkbox_sel, now) {
            Ok(event) => {
                debug!(event_id = %event.event_id, "retrieved event");
                events.push(event);
            }
            Err(err) => error!("failed to parse schedule row: {:#}", err),
        }
    }
    Ok(events)
}

fn parse_row(
    key: &SourceKey,
    url: &str,
    cells: &[ElementRef],
    checkbox_sel: &Selector,
    now: NaiveDateTime,
) -> Result<EventRecord> {
    if cells.len() < 7 {
        return Err(anyhow!("expected 7 cells, found {}", cells.len()));
    }
    let event_id = cells[0]
        .select(checkbox_sel)
        .next()
        .and_then(|input| input.value().attr("id"))
        .ok_or_else(|| anyhow!("row without checkbox id"))?
        .to_string();

    // "Fri 03/14"; the weekday is redundant once the year is inferred.
    let date_text = element_text(&cells[1]);
    let (month, day) = date_text
        .split_whitespace()
        .last()
        .and_then(|md| md.split_once('/'))
        .ok_or_else(|| anyhow!("invalid date {:?}", date_text))?;
    let month: u32 = month.parse()?;
    let day: u32 = day.parse()?;

    let (start_clock, end_clock) = parse_time_range(&element_text(&cells[4]))?;
    let start = upcoming_datetime(month, day, start_clock, now)?;
    let end = end_after(start, end_clock)?;

    let mut record = EventRecord::new(key, event_id, element_text(&cells[2]), start, end, url, now);
    record.level = Some(element_text(&cells[3]));
    record.price = Some(element_text(&cells[5]));
    record.status = Some(EventStatus::from(element_text(&cells[6])));
    Ok(record)
}

fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}
