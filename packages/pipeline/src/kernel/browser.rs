//! Browser session manager.
//!
//! Owns the single WebDriver session of a process. The launch profile (viewport,
//! locale, timezone, user agent) is fixed at startup; adapters only ever see the
//! [`BasePage`] surface of the tabs handed out by [`BaseBrowser::new_page`].
//!
//! ```text
//! BrowserSession::launch()
//!     ├─► new WebDriver session (chrome flags, UA, window size)
//!     ├─► stealth init script + timezone/locale overrides on the first tab
//!     └─► small random pointer movement
//! new_page()  → new tab, same overrides, focus tracked per command
//! close_page() → close tab, refocus the default tab
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use webdriver::{
    ChromeCapabilities, ElementRef, Session, Timeouts, WebDriverClient, DEFAULT_COMMAND_TIMEOUT,
};

use super::traits::{BaseBrowser, BasePage, ElementHandle};
use crate::common::BrowserError;

/// Runs before any page script and masks the usual automation tells.
const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
Object.defineProperty(navigator, 'permissions', {
  get: () => ({ query: () => Promise.resolve({ state: 'granted' }) })
});
"#;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Identity presented to every site. Stable for the life of the session.
#[derive(Debug, Clone)]
pub struct BrowserProfile {
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub locale: String,
    pub timezone: String,
    pub headless: bool,
}

impl Default for BrowserProfile {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            viewport: (1366, 768),
            locale: "en-US".to_string(),
            timezone: "America/New_York".to_string(),
            headless: true,
        }
    }
}

impl BrowserProfile {
    pub fn capabilities(&self) -> ChromeCapabilities {
        let mut caps = ChromeCapabilities::default()
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-accelerated-2d-canvas")
            .arg("--no-first-run")
            .arg("--no-zygote")
            .arg("--disable-gpu")
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={}", self.user_agent))
            .arg(format!("--window-size={},{}", self.viewport.0, self.viewport.1))
            .arg(format!("--lang={}", self.locale))
            .exclude_switch("enable-automation");
        if self.headless {
            caps = caps.arg("--headless=new");
        }
        caps
    }
}

fn driver_error(e: webdriver::Error) -> BrowserError {
    match e {
        webdriver::Error::Http(ref http) if http.is_timeout() => {
            BrowserError::timeout("webdriver command", DEFAULT_COMMAND_TIMEOUT)
        }
        other => BrowserError::Driver(other.to_string()),
    }
}

/// Poll `query` until it finds an element. Each call gets only the time left
/// before the deadline, so a hung driver call cannot outlive `timeout`.
async fn poll_for<F, Fut>(
    what: &str,
    timeout: Duration,
    mut query: F,
) -> Result<ElementHandle, BrowserError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<Option<ElementHandle>, BrowserError>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(remaining, query()).await {
            Ok(Ok(Some(element))) => return Ok(element),
            Ok(Ok(None)) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(BrowserError::timeout(what, timeout)),
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(BrowserError::timeout(what, timeout));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

struct SessionState {
    session: Session,
    profile: BrowserProfile,
    /// Tab the session opened with; never closed by `close_page`.
    default_window: String,
    focused: Mutex<String>,
}

impl SessionState {
    async fn focus(&self, handle: &str) -> Result<(), BrowserError> {
        let mut focused = self.focused.lock().await;
        if focused.as_str() != handle {
            self.session
                .switch_to_window(handle)
                .await
                .map_err(driver_error)?;
            *focused = handle.to_string();
        }
        Ok(())
    }

    /// Identity overrides are per tab in Chrome, so every new tab gets them.
    async fn apply_identity(&self) -> Result<(), BrowserError> {
        self.session
            .execute_cdp(
                "Page.addScriptToEvaluateOnNewDocument",
                json!({ "source": STEALTH_SCRIPT }),
            )
            .await
            .map_err(driver_error)?;
        self.session
            .execute_cdp(
                "Emulation.setTimezoneOverride",
                json!({ "timezoneId": self.profile.timezone }),
            )
            .await
            .map_err(driver_error)?;
        self.session
            .execute_cdp(
                "Emulation.setLocaleOverride",
                json!({ "locale": self.profile.locale }),
            )
            .await
            .map_err(driver_error)?;
        Ok(())
    }
}

pub struct BrowserSession {
    state: Arc<SessionState>,
}

impl BrowserSession {
    pub async fn launch(webdriver_url: &str, profile: BrowserProfile) -> anyhow::Result<Self> {
        let client = WebDriverClient::new(webdriver_url, DEFAULT_COMMAND_TIMEOUT)?;
        let session = client.new_session(&profile.capabilities()).await?;
        info!(session_id = %session.id(), "browser session started");

        session
            .set_timeouts(Timeouts {
                page_load: 30_000,
                script: 10_000,
                implicit: 0,
            })
            .await?;
        session
            .set_window_rect(profile.viewport.0, profile.viewport.1)
            .await?;

        let default_window = session.window_handle().await?;
        let state = Arc::new(SessionState {
            session,
            profile,
            focused: Mutex::new(default_window.clone()),
            default_window,
        });
        state.apply_identity().await?;

        let browser = Self { state };
        browser.wiggle_pointer().await?;
        Ok(browser)
    }

    async fn wiggle_pointer(&self) -> Result<(), BrowserError> {
        let (x, y) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(100..200), rng.gen_range(100..200))
        };
        let page = WebDriverPage {
            state: Arc::clone(&self.state),
            handle: self.state.default_window.clone(),
        };
        page.move_pointer(x, y).await
    }

    /// The tab the session opened with. Workers drive this page for their whole life.
    pub fn default_page(&self) -> Arc<dyn BasePage> {
        Arc::new(WebDriverPage {
            state: Arc::clone(&self.state),
            handle: self.state.default_window.clone(),
        })
    }
}

#[async_trait]
impl BaseBrowser for BrowserSession {
    async fn new_page(&self) -> Result<Arc<dyn BasePage>, BrowserError> {
        let handle = self
            .state
            .session
            .new_window()
            .await
            .map_err(driver_error)?;
        self.state.focus(&handle).await?;
        self.state.apply_identity().await?;
        debug!(handle = %handle, "opened page");

        Ok(Arc::new(WebDriverPage {
            state: Arc::clone(&self.state),
            handle,
        }))
    }

    async fn close_page(&self, page: Arc<dyn BasePage>) -> Result<(), BrowserError> {
        let handle = page.handle().map(str::to_string);
        drop(page);
        let Some(handle) = handle else {
            return Ok(());
        };
        if handle == self.state.default_window {
            return Ok(());
        }

        self.state.focus(&handle).await?;
        self.state
            .session
            .close_window()
            .await
            .map_err(driver_error)?;
        self.state.focus(&self.state.default_window).await
    }

    async fn shutdown(&self) -> Result<(), BrowserError> {
        info!(session_id = %self.state.session.id(), "closing browser session");
        if let Err(e) = self.state.session.delete().await {
            warn!(error = %e, "failed to delete browser session");
            return Err(driver_error(e));
        }
        Ok(())
    }
}

pub struct WebDriverPage {
    state: Arc<SessionState>,
    handle: String,
}

impl WebDriverPage {
    fn element(element: &ElementHandle) -> ElementRef {
        ElementRef::new(element.0.clone())
    }

    fn session(&self) -> &Session {
        &self.state.session
    }
}

#[async_trait]
impl BasePage for WebDriverPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.state.focus(&self.handle).await?;
        match tokio::time::timeout(timeout, self.session().navigate(url)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if !e.is_timeout() => Err(driver_error(e)),
            _ => Err(BrowserError::timeout(format!("navigation to {}", url), timeout)),
        }
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        self.state.focus(&self.handle).await?;
        self.session().current_url().await.map_err(driver_error)
    }

    async fn query(&self, selector: &str) -> Result<Option<ElementHandle>, BrowserError> {
        self.state.focus(&self.handle).await?;
        match self.session().find_element(selector).await {
            Ok(element) => Ok(Some(ElementHandle(element.id))),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(driver_error(e)),
        }
    }

    async fn wait_for(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<ElementHandle, BrowserError> {
        poll_for(selector, timeout, || self.query(selector)).await
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        self.state.focus(&self.handle).await?;
        self.session()
            .click(&Self::element(element))
            .await
            .map_err(driver_error)
    }

    async fn clear(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        self.state.focus(&self.handle).await?;
        self.session()
            .clear(&Self::element(element))
            .await
            .map_err(driver_error)
    }

    async fn send_keys(&self, element: &ElementHandle, text: &str) -> Result<(), BrowserError> {
        self.state.focus(&self.handle).await?;
        self.session()
            .send_keys(&Self::element(element), text)
            .await
            .map_err(driver_error)
    }

    async fn text(&self, element: &ElementHandle) -> Result<String, BrowserError> {
        self.state.focus(&self.handle).await?;
        self.session()
            .text(&Self::element(element))
            .await
            .map_err(driver_error)
    }

    async fn set_input_file(
        &self,
        element: &ElementHandle,
        path: &str,
    ) -> Result<(), BrowserError> {
        // File inputs accept the absolute path as typed text.
        self.send_keys(element, path).await
    }

    async fn move_pointer(&self, x: i64, y: i64) -> Result<(), BrowserError> {
        self.state.focus(&self.handle).await?;
        self.session()
            .perform_actions(json!([{
                "type": "pointer",
                "id": "mouse",
                "parameters": { "pointerType": "mouse" },
                "actions": [
                    { "type": "pointerMove", "duration": 250, "origin": "viewport", "x": x, "y": y }
                ]
            }]))
            .await
            .map_err(driver_error)
    }

    async fn scroll_by(&self, delta_y: i64) -> Result<(), BrowserError> {
        self.state.focus(&self.handle).await?;
        self.session()
            .perform_actions(json!([{
                "type": "wheel",
                "id": "wheel",
                "actions": [
                    { "type": "scroll", "x": 0, "y": 0, "deltaX": 0, "deltaY": delta_y,
                      "duration": 200, "origin": "viewport" }
                ]
            }]))
            .await
            .map_err(driver_error)
    }

    fn handle(&self) -> Option<&str> {
        Some(&self.handle)
    }
}
