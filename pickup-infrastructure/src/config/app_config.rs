use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tokio::fs;
use tracing::warn;

use pickup_domain::{ExclusionRule, RuntimeConfig};

use super::validation::{validate_http_url, validate_range};

const MAX_NOTICE_HOURS: i64 = 24 * 365;
const MAX_EXCLUSION_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub event_log_path: String,
    pub retry_counter_path: String,
    pub log_dir: String,
    pub retry_limit: u32,
    pub fetch_timeout_seconds: u64,
    pub poll_interval_seconds: u64,
    pub request_timeout_seconds: u64,
    pub page_load_limit_seconds: u64,
    pub poll_step_millis: u64,
    pub notification: NotificationConfig,
    pub registration: RegistrationConfig,
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct NotificationConfig {
    pub webhook_url: Option<String>,
    pub webhook_template: Option<String>,
    pub recipient: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RegistrationConfig {
    pub min_notice_hours: i64,
    pub confirmation_timeout_seconds: u64,
    pub exclusions: Vec<ExclusionRule>,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        let runtime = RuntimeConfig::default();
        Self {
            min_notice_hours: runtime.min_notice_hours,
            confirmation_timeout_seconds: runtime.confirmation_timeout_seconds,
            exclusions: runtime.exclusions,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SourcesConfig {
    pub big_city: BigCityConfig,
    pub new_york_urban: NewYorkUrbanConfig,
    pub volo: VoloConfig,
}

/// The Big City endpoint is deployment specific, so the source stays off
/// until `api_url` and `base_url` are configured.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BigCityConfig {
    pub enabled: bool,
    pub display_name: String,
    pub api_url: String,
    pub base_url: String,
    pub params: BTreeMap<String, String>,
    pub levels: Vec<String>,
}

impl Default for BigCityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            display_name: "Big City".to_string(),
            api_url: String::new(),
            base_url: String::new(),
            params: BTreeMap::new(),
            levels: vec!["A".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct VenueConfig {
    pub buttonid: u32,
    pub filterid: u32,
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NewYorkUrbanConfig {
    pub enabled: bool,
    pub display_name: String,
    pub query_url: String,
    pub ajax_url: String,
    pub ajax_action: String,
    pub gametype_id: u32,
    pub venues: Vec<VenueConfig>,
    pub excluded_level_marker: String,
    pub full_status: String,
}

impl Default for NewYorkUrbanConfig {
    fn default() -> Self {
        let venue = |buttonid, filterid, name: &str| VenueConfig {
            buttonid,
            filterid,
            name: name.to_string(),
        };
        Self {
            enabled: true,
            display_name: "New York Urban".to_string(),
            query_url: "https://www.nyurban.com/?page_id=400&filter_id=1&gametypeid=1".to_string(),
            ajax_url: "https://www.nyurban.com/wp-admin/admin-ajax.php".to_string(),
            ajax_action: "my_open_play_contentbb".to_string(),
            gametype_id: 1,
            venues: vec![
                venue(1, 35, "LaGuardia/Fri"),
                venue(2, 34, "Beacon/Fri"),
                venue(3, 6, "Brandeis/Fri"),
                venue(4, 18, "Brandeis/Sunday"),
                venue(5, 32, "Clinics"),
            ],
            excluded_level_marker: "Beg".to_string(),
            full_status: "Sold Out".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VoloConfig {
    pub enabled: bool,
    pub display_name: String,
    pub webdriver_url: String,
    pub headless: bool,
    pub query_url: String,
    pub login_url: String,
    pub event_base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for VoloConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            display_name: "Volo".to_string(),
            webdriver_url: "http://127.0.0.1:4444".to_string(),
            headless: true,
            query_url: "https://www.volosports.com/discover?cityName=New%20York%20Metro%20Area&view=SPORTS&subView=DAILY&programTypes%5B%5D=PICKUP&sportNames%5B%5D=Volleyball".to_string(),
            login_url: "https://www.volosports.com/login".to_string(),
            event_base_url: "https://www.volosports.com/d/".to_string(),
            username: None,
            password: None,
        }
    }
}

impl VoloConfig {
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let runtime = RuntimeConfig::default();
        Self {
            event_log_path: runtime.event_log_path,
            retry_counter_path: runtime.retry_counter_path,
            log_dir: "log".to_string(),
            retry_limit: runtime.retry_limit,
            fetch_timeout_seconds: runtime.fetch_timeout_seconds,
            poll_interval_seconds: runtime.poll_interval_seconds,
            request_timeout_seconds: 30,
            page_load_limit_seconds: 30,
            poll_step_millis: 1000,
            notification: NotificationConfig::default(),
            registration: RegistrationConfig::default(),
            sources: SourcesConfig::default(),
        }
    }
}

impl AppConfig {
    pub async fn load() -> Result<Self> {
        let path = env::var("PICKUP_CONFIG").unwrap_or_else(|_| "./config.toml".to_string());
        let file_path = Path::new(&path);
        let base_dir = file_path.parent();
        let mut config = if file_path.exists() {
            let content = fs::read_to_string(file_path).await?;
            Self::from_toml(&content)?
        } else {
            warn!(path = %path, "config file not found, using defaults");
            AppConfig::default()
        };
        config.apply_env_overrides();
        config.resolve_paths(base_dir);
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|err| anyhow!("invalid config: {}", err))
    }

    pub fn normalize(&mut self) {
        blank_to_none(&mut self.notification.webhook_url);
        blank_to_none(&mut self.notification.webhook_template);
        blank_to_none(&mut self.notification.recipient);
        blank_to_none(&mut self.sources.volo.username);
        blank_to_none(&mut self.sources.volo.password);
        self.log_dir = self.log_dir.trim().to_string();

        let big_city = &mut self.sources.big_city;
        big_city.levels = big_city
            .levels
            .drain(..)
            .map(|level| level.trim().to_string())
            .filter(|level| !level.is_empty())
            .collect();
        big_city.levels.dedup();
    }

    fn resolve_paths(&mut self, base_dir: Option<&Path>) {
        let Some(base) = base_dir else {
            return;
        };
        self.event_log_path = resolve_path(base, &self.event_log_path);
        self.retry_counter_path = resolve_path(base, &self.retry_counter_path);
        self.log_dir = resolve_path(base, &self.log_dir);
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry_limit == 0 {
            return Err(anyhow!("retry_limit must be greater than 0"));
        }
        if self.fetch_timeout_seconds == 0 {
            return Err(anyhow!("fetch_timeout_seconds must be greater than 0"));
        }
        if self.event_log_path.trim().is_empty() || self.retry_counter_path.trim().is_empty() {
            return Err(anyhow!("event_log_path and retry_counter_path must not be empty"));
        }
        validate_range(
            "registration.min_notice_hours",
            self.registration.min_notice_hours,
            MAX_NOTICE_HOURS,
        )?;
        for rule in &self.registration.exclusions {
            if rule.start_hour > 23 {
                return Err(anyhow!(
                    "registration.exclusions start_hour {} out of range",
                    rule.start_hour
                ));
            }
            validate_range(
                "registration.exclusions max_duration_minutes",
                rule.max_duration_minutes,
                MAX_EXCLUSION_MINUTES,
            )?;
        }
        if let Some(url) = &self.notification.webhook_url {
            validate_http_url("notification.webhook_url", url)?;
        }

        let sources = &self.sources;
        if sources.big_city.enabled {
            validate_http_url("sources.big_city.api_url", &sources.big_city.api_url)?;
            validate_http_url("sources.big_city.base_url", &sources.big_city.base_url)?;
        }
        if sources.new_york_urban.enabled {
            validate_http_url("sources.new_york_urban.ajax_url", &sources.new_york_urban.ajax_url)?;
            validate_http_url(
                "sources.new_york_urban.query_url",
                &sources.new_york_urban.query_url,
            )?;
        }
        if sources.volo.enabled {
            validate_http_url("sources.volo.webdriver_url", &sources.volo.webdriver_url)?;
            validate_http_url("sources.volo.query_url", &sources.volo.query_url)?;
            validate_http_url("sources.volo.login_url", &sources.volo.login_url)?;
        }
        Ok(())
    }

    pub fn to_runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            event_log_path: self.event_log_path.clone(),
            retry_counter_path: self.retry_counter_path.clone(),
            retry_limit: self.retry_limit,
            fetch_timeout_seconds: self.fetch_timeout_seconds,
            poll_interval_seconds: self.poll_interval_seconds,
            min_notice_hours: self.registration.min_notice_hours,
            confirmation_timeout_seconds: self.registration.confirmation_timeout_seconds,
            exclusions: self.registration.exclusions.clone(),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var("PICKUP_EVENT_LOG_PATH") {
            self.event_log_path = value;
        }
        if let Ok(value) = env::var("PICKUP_RETRY_COUNTER_PATH") {
            self.retry_counter_path = value;
        }
        if let Ok(value) = env::var("PICKUP_LOG_DIR") {
            self.log_dir = value;
        }
        if let Ok(value) = env::var("PICKUP_RETRY_LIMIT") {
            self.retry_limit = value.parse().unwrap_or(self.retry_limit);
        }
        if let Ok(value) = env::var("PICKUP_FETCH_TIMEOUT_SECONDS") {
            self.fetch_timeout_seconds = value.parse().unwrap_or(self.fetch_timeout_seconds);
        }
        if let Ok(value) = env::var("PICKUP_POLL_INTERVAL_SECONDS") {
            self.poll_interval_seconds = value.parse().unwrap_or(self.poll_interval_seconds);
        }
        if let Ok(value) = env::var("PICKUP_WEBHOOK_URL") {
            self.notification.webhook_url = Some(value);
        }
        if let Ok(value) = env::var("PICKUP_WEBHOOK_TEMPLATE") {
            self.notification.webhook_template = Some(value);
        }
        if let Ok(value) = env::var("PICKUP_NOTIFY_RECIPIENT") {
            self.notification.recipient = Some(value);
        }
        if let Ok(value) = env::var("PICKUP_WEBDRIVER_URL") {
            self.sources.volo.webdriver_url = value;
        }
        if let Ok(value) = env::var("PICKUP_VOLO_ENABLED") {
            self.sources.volo.enabled = value.parse().unwrap_or(self.sources.volo.enabled);
        }
        if let Ok(value) = env::var("PICKUP_VOLO_USERNAME") {
            self.sources.volo.username = Some(value);
        }
        if let Ok(value) = env::var("PICKUP_VOLO_PASSWORD") {
            self.sources.volo.password = Some(value);
        }
    }
}

fn blank_to_none(value: &mut Option<String>) {
    if value.as_deref().is_some_and(|item| item.trim().is_empty()) {
        *value = None;
    }
}

fn resolve_path(base: &Path, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return trimmed.to_string();
    }
    let path = Path::new(trimmed);
    if path.is_absolute() {
        trimmed.to_string()
    } else {
        base.join(path).to_string_lossy().to_string()
    }
}
