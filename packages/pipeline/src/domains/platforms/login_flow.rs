//! Credential login shared by every site.

use std::time::Duration;

use tracing::{debug, warn};

use super::adapter::LoginResult;
use super::interaction::type_like_human;
use super::Platform;
use crate::common::{AuthError, BrowserError, Pacer, PauseBand};
use crate::domains::applications::PlatformCredentials;
use crate::kernel::BasePage;

/// Post-login marker wait.
pub const LOGGED_IN_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a site's login form lives and how it reports the outcome.
#[derive(Debug, Clone, Copy)]
pub struct LoginSelectors {
    pub url: &'static str,
    pub username: &'static str,
    pub password: &'static str,
    pub submit: &'static str,
    /// Present only once the session is authenticated.
    pub logged_in_marker: &'static str,
    /// Inline error shown for bad credentials.
    pub error_banner: Option<&'static str>,
    /// Element shown when the site asks for a second factor.
    pub verification_element: Option<&'static str>,
    /// URL fragments of verification interstitials.
    pub challenge_markers: &'static [&'static str],
}

pub const DEFAULT_CHALLENGE_MARKERS: &[&str] = &["challenge", "checkpoint"];

pub async fn run(
    page: &dyn BasePage,
    platform: Platform,
    selectors: &LoginSelectors,
    credentials: &PlatformCredentials,
    pacer: &Pacer,
    navigation_timeout: Duration,
) -> Result<LoginResult, AuthError> {
    let browser = |source: BrowserError| AuthError::Browser { platform, source };

    page.goto(selectors.url, navigation_timeout)
        .await
        .map_err(browser)?;
    pacer.pause(PauseBand::ACTION).await;

    let username = page
        .wait_for(selectors.username, navigation_timeout)
        .await
        .map_err(browser)?;
    page.clear(&username).await.map_err(browser)?;
    type_like_human(page, &username, &credentials.email, pacer)
        .await
        .map_err(browser)?;
    pacer.pause(PauseBand::ACTION).await;

    let password = page
        .wait_for(selectors.password, navigation_timeout)
        .await
        .map_err(browser)?;
    page.clear(&password).await.map_err(browser)?;
    type_like_human(page, &password, &credentials.password, pacer)
        .await
        .map_err(browser)?;
    pacer.pause(PauseBand::ACTION).await;

    let submit = page
        .wait_for(selectors.submit, navigation_timeout)
        .await
        .map_err(browser)?;
    page.click(&submit).await.map_err(browser)?;
    pacer.pause(PauseBand::PAGE_SETTLE).await;

    let url = page.current_url().await.map_err(browser)?;
    if selectors.challenge_markers.iter().any(|m| url.contains(m)) {
        warn!(platform = %platform, url = %url, "verification interstitial after login");
        return Err(AuthError::VerificationRequired { platform, url });
    }
    if let Some(selector) = selectors.verification_element {
        if page.query(selector).await.map_err(browser)?.is_some() {
            warn!(platform = %platform, "verification prompt after login");
            return Err(AuthError::VerificationRequired { platform, url });
        }
    }
    if let Some(selector) = selectors.error_banner {
        if let Some(banner) = page.query(selector).await.map_err(browser)? {
            let reason = page.text(&banner).await.map_err(browser)?;
            return Err(AuthError::Rejected {
                platform,
                reason: reason.trim().to_string(),
            });
        }
    }

    page.wait_for(selectors.logged_in_marker, LOGGED_IN_TIMEOUT)
        .await
        .map_err(browser)?;
    debug!(platform = %platform, "login confirmed");

    Ok(LoginResult {
        platform,
        message: format!("Successfully logged into {}", platform),
    })
}
