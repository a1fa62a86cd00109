//! Human-looking input helpers shared by the site flows.

use rand::Rng;
use tracing::debug;

use crate::common::{BrowserError, Pacer, PauseBand};
use crate::kernel::{BasePage, ElementHandle};

/// Type `text` one character at a time with a keystroke pause after each.
pub async fn type_like_human(
    page: &dyn BasePage,
    element: &ElementHandle,
    text: &str,
    pacer: &Pacer,
) -> Result<(), BrowserError> {
    let mut buf = [0u8; 4];
    for ch in text.chars() {
        page.send_keys(element, ch.encode_utf8(&mut buf)).await?;
        pacer.pause(PauseBand::KEYSTROKE).await;
    }
    Ok(())
}

/// Scroll down 100-400px. Failures are cosmetic and only logged.
pub async fn scroll_randomly(page: &dyn BasePage, pacer: &Pacer) {
    let amount = rand::thread_rng().gen_range(100..400);
    if let Err(e) = page.scroll_by(amount).await {
        debug!(error = %e, "random scroll failed");
    }
    pacer.pause(PauseBand::SCROLL).await;
}
