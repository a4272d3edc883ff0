// Runtime configuration consumed by the application layer

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRule {
    pub start_hour: u32,
    pub max_duration_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub event_log_path: String,
    pub retry_counter_path: String,
    pub retry_limit: u32,
    pub fetch_timeout_seconds: u64,
    pub poll_interval_seconds: u64,
    pub min_notice_hours: i64,
    pub confirmation_timeout_seconds: u64,
    pub exclusions: Vec<ExclusionRule>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_log_path: "data/event_log.json".to_string(),
            retry_counter_path: "data/retry_counter.json".to_string(),
            retry_limit: 5,
            fetch_timeout_seconds: 300,
            poll_interval_seconds: 600,
            min_notice_hours: 24,
            confirmation_timeout_seconds: 10,
            exclusions: vec![ExclusionRule {
                start_hour: 18,
                max_duration_minutes: 60,
            }],
        }
    }
}
