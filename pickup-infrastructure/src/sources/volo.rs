use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use reqwest::Client;
use tracing::{debug, error, info, warn};

use pickup_domain::{
    DedupPolicy, EventRecord, EventSource, RegistrationPage, SourceKey, SourceSession,
};

use super::webdriver::{Locator, Pacing, WebDriverSession};
use crate::config::VoloConfig;
use crate::utils::{
    end_after, http_client, local_now, parse_order_total_cents, parse_time_range, upcoming_datetime,
};

pub const VOLO_KEY: &str = "volo";

const DETAIL_CONTAINER: &str = "[class^='styles_program-detail-item-container']";
const ALREADY_REGISTERED: &str = "You are already registered!";
const CONFIRMED: &str = "//*[contains(text(), 'Your spot has been confirmed!')]";
const REGISTER_BUTTON: &str = "//button[contains(text(), 'Register')]";
const DISMISS_OVERLAYS: &str = r#"
    for (const sel of ['.ab-iam-root', '.ab-in-app-message']) {
        const node = document.querySelector(sel);
        if (node) node.remove();
    }
"#;

pub struct VoloSource {
    key: SourceKey,
    config: Arc<VoloConfig>,
    client: Client,
    pacing: Pacing,
}

impl VoloSource {
    pub fn new(config: VoloConfig, request_timeout_seconds: u64, pacing: Pacing) -> Result<Self> {
        Ok(Self {
            key: SourceKey::from(VOLO_KEY),
            config: Arc::new(config),
            client: http_client(request_timeout_seconds.max(pacing.page_load_limit.as_secs()))?,
            pacing,
        })
    }
}

#[async_trait]
impl EventSource for VoloSource {
    fn key(&self) -> &SourceKey {
        &self.key
    }

    fn display_name(&self) -> &str {
        &self.config.display_name
    }

    fn dedup_policy(&self) -> DedupPolicy {
        DedupPolicy::Identity
    }

    fn supports_registration(&self) -> bool {
        true
    }

    async fn open_session(&self) -> Result<Box<dyn SourceSession>> {
        let driver = WebDriverSession::start(
            self.client.clone(),
            &self.config.webdriver_url,
            self.config.headless,
            self.pacing,
        )
        .await?;
        info!("browser session started");
        Ok(Box::new(VoloSession {
            key: self.key.clone(),
            config: self.config.clone(),
            driver,
            authenticated: false,
        }))
    }
}

struct VoloSession {
    key: SourceKey,
    config: Arc<VoloConfig>,
    driver: WebDriverSession,
    authenticated: bool,
}

impl VoloSession {
    async fn dismiss_popups(&self) -> Result<()> {
        let accept = self
            .driver
            .find_all(Locator::XPath("//button[contains(., 'Accept All')]"))
            .await?;
        if let Some(button) = accept.first() {
            self.driver.click(button).await?;
            self.driver.pause().await;
        }
        self.driver.execute(DISMISS_OVERLAYS).await?;
        Ok(())
    }

    async fn candidate_ids(&self) -> Result<Vec<String>> {
        let links = self.driver.find_all(Locator::Css("a[href*='/d/']")).await?;
        let mut ids: Vec<String> = Vec::new();
        for link in links {
            let Some(href) = self.driver.attribute(&link, "href").await? else {
                continue;
            };
            let Some(id) = event_id_from_href(&href) else {
                continue;
            };
            if ids.contains(&id) {
                continue;
            }
            // Capacity is only shown to signed-in users.
            if self.authenticated && is_full(&self.driver.text(&link).await?) {
                debug!(event_id = %id, "full event skipped");
                continue;
            }
            ids.push(id);
        }
        Ok(ids)
    }

    async fn read_event(&self, event_id: &str, now: NaiveDateTime) -> Result<EventRecord> {
        let url = format!("{}{}", self.config.event_base_url, event_id);
        self.driver.load(&url).await?;
        let container = self
            .driver
            .wait_for(Locator::Css(DETAIL_CONTAINER), self.driver.pacing().page_load_limit)
            .await?
            .ok_or_else(|| anyhow!("event details did not render"))?;
        let text = self.driver.text(&container).await?;
        parse_detail(&self.key, event_id, &url, &text, now)
    }
}

#[async_trait]
impl SourceSession for VoloSession {
    async fn authenticate(&mut self) -> Result<bool> {
        let Some((username, password)) = self.config.credentials() else {
            warn!("no account credentials configured, browsing anonymously");
            return Ok(false);
        };
        info!(username = %username, "logging in");
        let login_url = self.config.login_url.clone();
        self.driver.load(&login_url).await?;
        self.dismiss_popups().await?;

        let email = self.driver.find_all(Locator::Css("input[type='email']")).await?;
        let secret = self.driver.find_all(Locator::Css("input[type='password']")).await?;
        let (Some(email), Some(secret)) = (email.first(), secret.first()) else {
            bail!("login form fields not found");
        };
        self.driver.send_keys(email, username).await?;
        self.driver.send_keys(secret, password).await?;
        let submit = self
            .driver
            .find_all(Locator::XPath("//button[contains(., 'Log in with email')]"))
            .await?;
        let button = submit.first().ok_or_else(|| anyhow!("login button not found"))?;
        self.driver.click(button).await?;

        let started = Instant::now();
        let limit = self.driver.pacing().page_load_limit;
        while started.elapsed() < limit {
            self.driver.pause().await;
            if self.driver.current_url().await? != login_url {
                self.authenticated = true;
                info!("login successful");
                return Ok(true);
            }
        }
        error!("login unsuccessful, still on the login page");
        Ok(false)
    }

    async fn fetch(&mut self) -> Result<Vec<EventRecord>> {
        self.driver.load(&self.config.query_url).await?;
        self.driver.pause().await;
        if self.driver.page_source().await?.contains("No results") {
            info!("query returned no results");
            return Ok(Vec::new());
        }
        let ids = self.candidate_ids().await?;
        info!("found {} candidate events", ids.len());

        let now = local_now();
        let mut events = Vec::with_capacity(ids.len());
        for id in ids {
            match self.read_event(&id, now).await {
                Ok(mut event) => {
                    event.registered = Some(false);
                    events.push(event);
                }
                Err(err) => error!(event_id = %id, "failed to read event: {:#}", err),
            }
        }
        Ok(events)
    }

    fn registration_page(&mut self) -> Option<&mut dyn RegistrationPage> {
        Some(self)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.driver.quit().await?;
        info!("browser session closed");
        Ok(())
    }
}

#[async_trait]
impl RegistrationPage for VoloSession {
    async fn open_event(&mut self, event: &EventRecord) -> Result<()> {
        self.driver.load(&event.url).await?;
        self.driver.pause().await;
        Ok(())
    }

    async fn already_registered(&mut self) -> Result<bool> {
        Ok(self.driver.page_source().await?.contains(ALREADY_REGISTERED))
    }

    async fn order_total_cents(&mut self) -> Result<Option<u64>> {
        Ok(parse_order_total_cents(&self.driver.page_source().await?))
    }

    async fn accept_consents(&mut self) -> Result<usize> {
        let boxes = self.driver.find_all(Locator::Css("input[type='checkbox']")).await?;
        for checkbox in &boxes {
            self.driver.click(checkbox).await?;
        }
        Ok(boxes.len())
    }

    async fn submit_registration(&mut self) -> Result<()> {
        let buttons = self.driver.find_all(Locator::XPath(REGISTER_BUTTON)).await?;
        let button = buttons.first().ok_or_else(|| anyhow!("register button not found"))?;
        self.driver.click(button).await?;
        Ok(())
    }

    async fn confirmation_visible(&mut self, budget: Duration) -> Result<bool> {
        let found = self.driver.wait_for(Locator::XPath(CONFIRMED), budget).await?;
        if found.is_none() {
            warn!("registration submitted but no confirmation appeared");
        }
        Ok(found.is_some())
    }
}

fn event_id_from_href(href: &str) -> Option<String> {
    let (_, rest) = href.split_once("/d/")?;
    let id: String = rest
        .chars()
        .take_while(|c| !matches!(c, '/' | '?' | '#'))
        .collect();
    (!id.is_empty()).then_some(id)
}

/// True when a card carries an `n/n` capacity.
fn is_full(card_text: &str) -> bool {
    card_text.split_whitespace().any(|token| {
        token
            .split_once('/')
            .and_then(|(taken, total)| Some((taken.parse::<u32>().ok()?, total.parse::<u32>().ok()?)))
            .is_some_and(|(taken, total)| total > 0 && taken == total)
    })
}

/// Parses the detail container: date, venue, time range, address, optional level.
fn parse_detail(
    key: &SourceKey,
    event_id: &str,
    url: &str,
    text: &str,
    now: NaiveDateTime,
) -> Result<EventRecord> {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|line| !line.is_empty()).collect();
    if lines.len() < 4 {
        bail!("event details have {} lines, expected at least 4", lines.len());
    }
    // "Sat, March 14"
    let month_day = lines[0]
        .split_once(", ")
        .map(|(_, rest)| rest)
        .unwrap_or(lines[0]);
    let date = NaiveDate::parse_from_str(&format!("{} 2000", month_day), "%B %d %Y")
        .map_err(|err| anyhow!("invalid event date {:?}: {}", lines[0], err))?;
    let (start_clock, end_clock) = parse_time_range(lines[2])?;
    let start = upcoming_datetime(date.month(), date.day(), start_clock, now)?;
    let end = end_after(start, end_clock)?;
    let location = format!("{}, {}", lines[3], lines[1]);

    let mut record = EventRecord::new(key, event_id, location, start, end, url, now);
    record.level = lines.get(4).map(|level| level.to_string());
    Ok(record)
}
