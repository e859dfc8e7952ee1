//! W3C WebDriver backend.
//!
//! Talks plain JSON over HTTP to a WebDriver endpoint (chromedriver, geckodriver, a
//! Selenium grid). A session is created on [`WebDriverBackend::connect`] and deleted
//! when the backend is dropped. Requests are blocking; the interpreter runs on a
//! dedicated thread.

use std::time::Duration;

use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{Value, json};
use tracing::{debug, info, trace, warn};

use super::{Backend, BackendError, ElementHandle};
use crate::config::{LocatorStrategy, WebDriverSettings};

/// Key under which W3C WebDriver returns element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

pub struct WebDriverBackend {
    client: Client,
    endpoint: String,
    session_id: String,
    strategy: LocatorStrategy,
}

impl WebDriverBackend {
    /// Start a browser session with the given settings.
    pub fn connect(settings: &WebDriverSettings) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| BackendError::Session(format!("failed to configure HTTP client: {e}")))?;
        let endpoint = settings.endpoint.trim_end_matches('/').to_string();

        let value = send(
            client
                .post(format!("{endpoint}/session"))
                .json(&session_capabilities(settings)),
        )?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| BackendError::Protocol(format!("new session reply has no sessionId: {value}")))?
            .to_string();

        let backend = Self {
            client,
            endpoint,
            session_id,
            strategy: settings.locator_strategy,
        };
        let implicit_ms = (settings.implicit_wait_secs * 1000.0).round() as u64;
        backend.command(
            Method::POST,
            "timeouts",
            Some(json!({ "implicit": implicit_ms })),
        )?;

        info!(
            target: "brokerscript::backend",
            endpoint = %backend.endpoint,
            session = %backend.session_id,
            headless = settings.headless,
            implicit_ms,
            "WebDriver session started"
        );
        Ok(backend)
    }

    fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, BackendError> {
        let url = if path.is_empty() {
            format!("{}/session/{}", self.endpoint, self.session_id)
        } else {
            format!("{}/session/{}/{}", self.endpoint, self.session_id, path)
        };
        trace!(target: "brokerscript::backend", %method, %url, "WebDriver command");
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        send(request)
    }

    fn locate(&self, locator: &str) -> Value {
        json!({ "using": self.strategy.as_str(), "value": locator })
    }

    /// First element matching `locator`.
    fn find_element(&self, locator: &str) -> Result<ElementHandle, BackendError> {
        let value = self
            .command(Method::POST, "element", Some(self.locate(locator)))
            .map_err(|e| lookup_error(locator, e))?;
        element_from(&value)
    }
}

impl Backend for WebDriverBackend {
    fn name(&self) -> &'static str {
        "webdriver"
    }

    fn navigate(&mut self, url: &str) -> Result<(), BackendError> {
        self.command(Method::POST, "url", Some(json!({ "url": url })))
            .map_err(|e| match e {
                BackendError::Protocol(msg) => BackendError::Navigation(format!("{url}: {msg}")),
                other => other,
            })?;
        debug!(target: "brokerscript::backend", %url, "Navigated");
        Ok(())
    }

    fn click(&mut self, locator: &str) -> Result<(), BackendError> {
        let element = self.find_element(locator)?;
        self.command(
            Method::POST,
            &format!("element/{}/click", element.id()),
            Some(json!({})),
        )?;
        Ok(())
    }

    fn clear(&mut self, locator: &str) -> Result<(), BackendError> {
        let element = self.find_element(locator)?;
        self.command(
            Method::POST,
            &format!("element/{}/clear", element.id()),
            Some(json!({})),
        )?;
        Ok(())
    }

    fn send_keys(&mut self, locator: &str, text: &str) -> Result<(), BackendError> {
        let element = self.find_element(locator)?;
        self.command(
            Method::POST,
            &format!("element/{}/value", element.id()),
            Some(json!({ "text": text })),
        )?;
        Ok(())
    }

    fn refresh(&mut self) -> Result<(), BackendError> {
        self.command(Method::POST, "refresh", Some(json!({})))?;
        Ok(())
    }

    fn find_all(&mut self, locator: &str) -> Result<Vec<ElementHandle>, BackendError> {
        let value = self.command(Method::POST, "elements", Some(self.locate(locator)))?;
        let items = value
            .as_array()
            .ok_or_else(|| BackendError::Protocol(format!("find elements reply is not a list: {value}")))?;
        items.iter().map(element_from).collect()
    }

    fn text_content_of(&mut self, element: &ElementHandle) -> Result<String, BackendError> {
        let value = self.command(Method::GET, &format!("element/{}/text", element.id()), None)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BackendError::Protocol(format!("element text reply is not a string: {value}")))
    }
}

impl Drop for WebDriverBackend {
    fn drop(&mut self) {
        match self.command(Method::DELETE, "", None) {
            Ok(_) => debug!(target: "brokerscript::backend", session = %self.session_id, "WebDriver session closed"),
            Err(e) => warn!(
                target: "brokerscript::backend",
                session = %self.session_id, error = %e,
                "Failed to close WebDriver session"
            ),
        }
    }
}

/// Build the new-session payload for a Chromium-family browser.
fn session_capabilities(settings: &WebDriverSettings) -> Value {
    let mut args = Vec::new();
    if settings.headless {
        args.push("--headless=new".to_string());
    }
    // A profile only makes sense together with the directory that holds it
    if let (Some(user_data), Some(profile)) = (
        settings.user_data_directory.as_deref().filter(|s| !s.is_empty()),
        settings.profile_directory.as_deref().filter(|s| !s.is_empty()),
    ) {
        args.push(format!("--user-data-dir={user_data}"));
        args.push(format!("--profile-directory={profile}"));
    }

    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": settings.browser_name,
                "goog:chromeOptions": { "args": args },
            }
        }
    })
}

fn element_from(value: &Value) -> Result<ElementHandle, BackendError> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(|id| ElementHandle(id.to_string()))
        .ok_or_else(|| BackendError::Protocol(format!("not an element reference: {value}")))
}

/// Send a request and unwrap the WebDriver `{"value": ...}` envelope.
fn send(request: RequestBuilder) -> Result<Value, BackendError> {
    let response = request.send().map_err(|e| {
        if e.is_timeout() {
            BackendError::Timeout(e.to_string())
        } else {
            BackendError::Session(format!("WebDriver endpoint unreachable: {e}"))
        }
    })?;
    let status = response.status();
    let body: Value = response
        .json()
        .map_err(|e| BackendError::Protocol(format!("invalid JSON reply ({status}): {e}")))?;
    unwrap_reply(status.is_success(), body)
}

/// Take the payload out of a `{"value": ...}` reply, or turn an error reply into a
/// [`BackendError`].
fn unwrap_reply(success: bool, body: Value) -> Result<Value, BackendError> {
    let value = match body {
        Value::Object(mut map) => map.remove("value").unwrap_or(Value::Null),
        _ => Value::Null,
    };
    if success {
        Ok(value)
    } else {
        Err(error_from_reply(&value))
    }
}

/// A single-element lookup that matched nothing is reported against the locator.
fn lookup_error(locator: &str, err: BackendError) -> BackendError {
    match err {
        BackendError::Protocol(msg) if msg.starts_with("no such element") => {
            BackendError::ElementNotFound(locator.to_string())
        }
        other => other,
    }
}

/// Map a W3C error reply (`{"error": "...", "message": "..."}`) to a [`BackendError`].
fn error_from_reply(value: &Value) -> BackendError {
    let code = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    let message = value.get("message").and_then(Value::as_str).unwrap_or("");
    let detail = if message.is_empty() {
        code.to_string()
    } else {
        format!("{code}: {message}")
    };

    match code {
        "timeout" | "script timeout" => BackendError::Timeout(detail),
        "invalid session id" | "session not created" => BackendError::Session(detail),
        "unknown command" | "unknown method" | "unsupported operation" => {
            BackendError::Unsupported(detail)
        }
        _ => BackendError::Protocol(detail),
    }
}
