// Minimal W3C WebDriver client over reqwest

use std::time::{Duration, Instant};

use reqwest::{Client, Method};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::time::sleep;

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

#[derive(Debug, Error)]
pub enum WebDriverError {
    #[error("webdriver transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("webdriver command failed ({error}): {message}")]
    Command { error: String, message: String },
    #[error("unexpected webdriver response: {0}")]
    Protocol(String),
    #[error("page did not finish loading within {0:?}")]
    LoadTimeout(Duration),
}

pub type WebDriverResult<T> = Result<T, WebDriverError>;

#[derive(Debug, Clone, Copy)]
pub enum Locator<'a> {
    Css(&'a str),
    XPath(&'a str),
}

impl Locator<'_> {
    fn to_json(self) -> Value {
        match self {
            Locator::Css(value) => json!({ "using": "css selector", "value": value }),
            Locator::XPath(value) => json!({ "using": "xpath", "value": value }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementId(String);

#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub page_load_limit: Duration,
    pub poll_step: Duration,
}

pub struct WebDriverSession {
    client: Client,
    endpoint: String,
    pacing: Pacing,
}

impl WebDriverSession {
    /// Starts a Chrome session on the WebDriver server at `base_url`.
    pub async fn start(
        client: Client,
        base_url: &str,
        headless: bool,
        pacing: Pacing,
    ) -> WebDriverResult<Self> {
        let mut args = vec!["--window-size=1920,1080"];
        if headless {
            args.push("--headless=new");
        }
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        });
        let base = base_url.trim_end_matches('/').to_string();
        let value = send(&client, Method::POST, &format!("{}/session", base), Some(capabilities)).await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| WebDriverError::Protocol("new session without sessionId".to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/session/{}", base, session_id),
            pacing,
        })
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> WebDriverResult<Value> {
        send(&self.client, method, &format!("{}{}", self.endpoint, path), body).await
    }

    pub async fn navigate(&self, url: &str) -> WebDriverResult<()> {
        self.command(Method::POST, "/url", Some(json!({ "url": url }))).await?;
        Ok(())
    }

    pub async fn current_url(&self) -> WebDriverResult<String> {
        let value = self.command(Method::GET, "/url", None).await?;
        as_string(value)
    }

    pub async fn page_source(&self) -> WebDriverResult<String> {
        let value = self.command(Method::GET, "/source", None).await?;
        as_string(value)
    }

    pub async fn execute(&self, script: &str) -> WebDriverResult<Value> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": [] })),
        )
        .await
    }

    /// Navigates and polls `document.readyState` until the page is complete.
    pub async fn load(&self, url: &str) -> WebDriverResult<()> {
        let started = Instant::now();
        self.navigate(url).await?;
        loop {
            let state = self.execute("return document.readyState").await?;
            if state.as_str() == Some("complete") {
                return Ok(());
            }
            if started.elapsed() >= self.pacing.page_load_limit {
                return Err(WebDriverError::LoadTimeout(self.pacing.page_load_limit));
            }
            sleep(self.pacing.poll_step).await;
        }
    }

    pub async fn find_all(&self, locator: Locator<'_>) -> WebDriverResult<Vec<ElementId>> {
        let value = self.command(Method::POST, "/elements", Some(locator.to_json())).await?;
        element_ids(value)
    }

    /// Polls until `locator` matches something or `budget` runs out.
    pub async fn wait_for(&self, locator: Locator<'_>, budget: Duration) -> WebDriverResult<Option<ElementId>> {
        let started = Instant::now();
        loop {
            if let Some(found) = self.find_all(locator).await?.into_iter().next() {
                return Ok(Some(found));
            }
            if started.elapsed() >= budget {
                return Ok(None);
            }
            sleep(self.pacing.poll_step).await;
        }
    }

    pub async fn click(&self, element: &ElementId) -> WebDriverResult<()> {
        let path = format!("/element/{}/click", element.0);
        self.command(Method::POST, &path, Some(json!({}))).await?;
        Ok(())
    }

    pub async fn send_keys(&self, element: &ElementId, text: &str) -> WebDriverResult<()> {
        let path = format!("/element/{}/value", element.0);
        self.command(Method::POST, &path, Some(json!({ "text": text }))).await?;
        Ok(())
    }

    pub async fn text(&self, element: &ElementId) -> WebDriverResult<String> {
        let value = self.command(Method::GET, &format!("/element/{}/text", element.0), None).await?;
        as_string(value)
    }

    pub async fn attribute(&self, element: &ElementId, name: &str) -> WebDriverResult<Option<String>> {
        let path = format!("/element/{}/attribute/{}", element.0, name);
        let value = self.command(Method::GET, &path, None).await?;
        Ok(value.as_str().map(ToString::to_string))
    }

    pub async fn pause(&self) {
        sleep(self.pacing.poll_step).await;
    }

    pub async fn quit(self) -> WebDriverResult<()> {
        send(&self.client, Method::DELETE, &self.endpoint, None).await?;
        Ok(())
    }
}

async fn send(client: &Client, method: Method, url: &str, body: Option<Value>) -> WebDriverResult<Value> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let payload: Value = request.send().await?.json().await?;
    unwrap_value(payload)
}

fn unwrap_value(mut payload: Value) -> WebDriverResult<Value> {
    let value = payload
        .get_mut("value")
        .map(Value::take)
        .ok_or_else(|| WebDriverError::Protocol("response without value".to_string()))?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(WebDriverError::Command {
            error: error.to_string(),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }
    Ok(value)
}

fn as_string(value: Value) -> WebDriverResult<String> {
    match value {
        Value::String(text) => Ok(text),
        other => Err(WebDriverError::Protocol(format!("expected string, got {}", other))),
    }
}

fn element_ids(value: Value) -> WebDriverResult<Vec<ElementId>> {
    let Value::Array(items) = value else {
        return Err(WebDriverError::Protocol("expected element list".to_string()));
    };
    items
        .iter()
        .map(|item| {
            item.get(ELEMENT_KEY)
                .and_then(Value::as_str)
                .map(|id| ElementId(id.to_string()))
                .ok_or_else(|| WebDriverError::Protocol("element reference without id".to_string()))
        })
        .collect()
}
