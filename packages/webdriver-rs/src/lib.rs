// Minimal W3C WebDriver client: https://www.w3.org/TR/webdriver2/
//
// Only the commands the automation worker needs are implemented. Chrome's
// `goog/cdp/execute` vendor extension is exposed for emulation overrides.

pub mod models;

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

pub use crate::models::{ChromeCapabilities, ElementRef, Timeouts, ELEMENT_KEY};
use crate::models::{Envelope, ErrorValue, NewSessionValue, NewWindowValue};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("webdriver transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webdriver command failed ({status}): {code}: {message}")]
    Command {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("unexpected webdriver response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Error {
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Command { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    pub fn is_no_such_element(&self) -> bool {
        matches!(self.code(), Some("no such element") | Some("stale element reference"))
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout(),
            other => matches!(other.code(), Some("timeout") | Some("script timeout")),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Upper bound on a single command round trip. Must exceed the session's
/// page-load timeout so navigations fail with the driver's own error first.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct WebDriverClient {
    http: Client,
    base_url: String,
}

impl WebDriverClient {
    /// Create a client whose every command gives up after `command_timeout`.
    pub fn new(base_url: impl Into<String>, command_timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(command_timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Start a new browser session with the given capabilities.
    pub async fn new_session(&self, capabilities: &ChromeCapabilities) -> Result<Session> {
        let url = format!("{}/session", self.base_url);
        let response = self
            .http
            .post(url)
            .json(&capabilities.to_json())
            .send()
            .await?;
        let value: NewSessionValue = decode(response).await?;

        Ok(Session {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            id: value.session_id,
        })
    }
}

/// A live WebDriver session.
#[derive(Debug, Clone)]
pub struct Session {
    http: Client,
    base_url: String,
    id: String,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    async fn command<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T> {
        let url = format!("{}/session/{}{}", self.base_url, self.id, path);
        let mut request = self.http.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(&body);
        } else if method == Method::POST {
            request = request.json(&json!({}));
        }
        decode(request.send().await?).await
    }

    pub async fn set_timeouts(&self, timeouts: Timeouts) -> Result<()> {
        self.command::<Value>(Method::POST, "/timeouts", Some(serde_json::to_value(timeouts)?))
            .await
            .map(|_| ())
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.command::<Value>(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    pub async fn current_url(&self) -> Result<String> {
        self.command(Method::GET, "/url", None).await
    }

    /// Locate the first element matching a CSS selector.
    pub async fn find_element(&self, css: &str) -> Result<ElementRef> {
        self.command(
            Method::POST,
            "/element",
            Some(json!({ "using": "css selector", "value": css })),
        )
        .await
    }

    pub async fn click(&self, element: &ElementRef) -> Result<()> {
        let path = format!("/element/{}/click", element.id);
        self.command::<Value>(Method::POST, &path, None)
            .await
            .map(|_| ())
    }

    pub async fn clear(&self, element: &ElementRef) -> Result<()> {
        let path = format!("/element/{}/clear", element.id);
        self.command::<Value>(Method::POST, &path, None)
            .await
            .map(|_| ())
    }

    pub async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()> {
        let path = format!("/element/{}/value", element.id);
        self.command::<Value>(Method::POST, &path, Some(json!({ "text": text })))
            .await
            .map(|_| ())
    }

    pub async fn text(&self, element: &ElementRef) -> Result<String> {
        let path = format!("/element/{}/text", element.id);
        self.command(Method::GET, &path, None).await
    }

    pub async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    /// Dispatch a W3C input action sequence.
    pub async fn perform_actions(&self, actions: Value) -> Result<()> {
        self.command::<Value>(Method::POST, "/actions", Some(json!({ "actions": actions })))
            .await
            .map(|_| ())
    }

    pub async fn window_handle(&self) -> Result<String> {
        self.command(Method::GET, "/window", None).await
    }

    /// Open a new tab and return its handle. Focus is not moved.
    pub async fn new_window(&self) -> Result<String> {
        let value: NewWindowValue = self
            .command(Method::POST, "/window/new", Some(json!({ "type": "tab" })))
            .await?;
        Ok(value.handle)
    }

    pub async fn switch_to_window(&self, handle: &str) -> Result<()> {
        self.command::<Value>(Method::POST, "/window", Some(json!({ "handle": handle })))
            .await
            .map(|_| ())
    }

    /// Close the focused window, returning the remaining handles.
    pub async fn close_window(&self) -> Result<Vec<String>> {
        self.command(Method::DELETE, "/window", None).await
    }

    pub async fn set_window_rect(&self, width: u32, height: u32) -> Result<()> {
        self.command::<Value>(
            Method::POST,
            "/window/rect",
            Some(json!({ "width": width, "height": height })),
        )
        .await
        .map(|_| ())
    }

    /// Chrome DevTools Protocol passthrough (chromedriver vendor extension).
    pub async fn execute_cdp(&self, cmd: &str, params: Value) -> Result<Value> {
        self.command(
            Method::POST,
            "/goog/cdp/execute",
            Some(json!({ "cmd": cmd, "params": params })),
        )
        .await
    }

    /// End the session and close every window it owns.
    pub async fn delete(&self) -> Result<()> {
        let url = format!("{}/session/{}", self.base_url, self.id);
        let response = self.http.delete(url).send().await?;
        decode::<Value>(response).await.map(|_| ())
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        let error = serde_json::from_slice::<Envelope<ErrorValue>>(&body)
            .map(|e| e.value)
            .unwrap_or_else(|_| ErrorValue {
                error: "unknown error".to_string(),
                message: String::from_utf8_lossy(&body).into_owned(),
            });
        return Err(Error::Command {
            status,
            code: error.error,
            message: error.message,
        });
    }

    let envelope: Envelope<T> = serde_json::from_slice(&body)?;
    Ok(envelope.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_ref_uses_w3c_key() {
        let json = serde_json::to_value(ElementRef::new("abc")).unwrap();
        assert_eq!(json[ELEMENT_KEY], "abc");
    }

    #[test]
    fn chrome_capabilities_carry_args_and_switches() {
        let caps = ChromeCapabilities::default()
            .arg("--no-sandbox")
            .exclude_switch("enable-automation");
        let json = caps.to_json();
        let options = &json["capabilities"]["alwaysMatch"]["goog:chromeOptions"];

        assert_eq!(options["args"][0], "--no-sandbox");
        assert_eq!(options["excludeSwitches"][0], "enable-automation");
        assert!(json["capabilities"]["alwaysMatch"].get("pageLoadStrategy").is_none());
    }

    #[test]
    fn command_error_classification() {
        let missing = Error::Command {
            status: StatusCode::NOT_FOUND,
            code: "no such element".to_string(),
            message: String::new(),
        };
        let timeout = Error::Command {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "timeout".to_string(),
            message: String::new(),
        };

        assert!(missing.is_no_such_element());
        assert!(!missing.is_timeout());
        assert!(timeout.is_timeout());
    }

    #[tokio::test]
    async fn hung_driver_times_out() {
        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut open = Vec::new();
            loop {
                let (socket, _) = listener.accept().await.unwrap();
                open.push(socket);
            }
        });

        let client =
            WebDriverClient::new(format!("http://{}", addr), Duration::from_millis(200)).unwrap();
        let err = client
            .new_session(&ChromeCapabilities::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Http(_)));
        assert!(err.is_timeout());
        server.abort();
    }
}
