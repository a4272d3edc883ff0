use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use pickup_domain::{Notification, Notifier};

use crate::config::NotificationConfig;

const DEFAULT_TEMPLATE: &str = r#"{"to":"{recipient}","subject":"{subject}","text":"{body}"}"#;

/// Posts notifications to a webhook, rendering the JSON body from a template.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    template: String,
    recipient: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, config: &NotificationConfig, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds.max(3)))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            template: config
                .webhook_template
                .clone()
                .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()),
            recipient: config.recipient.clone().unwrap_or_default(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let payload = build_payload(&self.template, notification, &self.recipient);
        self.client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .body(payload)
            .send()
            .await?
            .error_for_status()?;
        info!(subject = %notification.subject, "notification delivered");
        Ok(())
    }
}

/// Fallback when no webhook is configured.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        info!(
            subject = %notification.subject,
            "notification (no webhook configured):\n{}",
            notification.body
        );
        Ok(())
    }
}

pub fn build_notifier(config: &NotificationConfig, timeout_seconds: u64) -> Result<Box<dyn Notifier>> {
    Ok(match &config.webhook_url {
        Some(url) => Box::new(WebhookNotifier::new(url.clone(), config, timeout_seconds)?),
        None => Box::new(LogNotifier),
    })
}

fn build_payload(template: &str, notification: &Notification, recipient: &str) -> String {
    template
        .replace("{recipient}", &json_escape(recipient))
        .replace("{subject}", &json_escape(&notification.subject))
        .replace("{body}", &json_escape(&notification.body))
}

/// Escapes `value` for placement inside an existing JSON string literal.
fn json_escape(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Notification {
        Notification {
            subject: "Pickup Watch: 1 new event(s)".to_string(),
            body: "1 new \"Volo\" event(s) found!\n    Link: https://example.test/d/1".to_string(),
        }
    }

    #[test]
    fn default_template_renders_valid_json() {
        let payload = build_payload(DEFAULT_TEMPLATE, &sample(), "me@example.test");
        let value: serde_json::Value = serde_json::from_str(&payload).expect("valid json");
        assert_eq!(value["to"], "me@example.test");
        assert_eq!(value["subject"], "Pickup Watch: 1 new event(s)");
        assert_eq!(value["text"], sample().body);
    }

    #[test]
    fn custom_template_placeholders_are_replaced() {
        let payload = build_payload(r#"{"msg":"{subject}: {body}"}"#, &sample(), "");
        let value: serde_json::Value = serde_json::from_str(&payload).expect("valid json");
        let msg = value["msg"].as_str().expect("string");
        assert!(msg.starts_with("Pickup Watch: 1 new event(s): 1 new \"Volo\""));
        assert!(msg.contains('\n'));
    }

    #[tokio::test]
    async fn missing_webhook_falls_back_to_log() {
        let notifier = build_notifier(&NotificationConfig::default(), 30).expect("notifier");
        notifier.send(&sample()).await.expect("logged");
    }
}
