//! Small page interactions shared by login and navigation.

use anyhow::{Context, Result};
use chromiumoxide::Page;
use std::time::{Duration, Instant};

/// Finds the innermost visible element whose text contains `text`
/// (case-insensitive). With `click = true` the element is clicked.
const TEXT_TARGET_JS: &str = r#"
(text, click) => {
    const needle = text.toLowerCase();
    const visible = el => el.getClientRects().length > 0
        && getComputedStyle(el).visibility !== 'hidden';
    const matches = Array.from(document.querySelectorAll('body *'))
        .filter(el => (el.innerText || '').toLowerCase().includes(needle) && visible(el));
    const innermost = matches.filter(el => !matches.some(other => other !== el && el.contains(other)));
    const target = innermost[0];
    if (!target) return false;
    if (click) {
        const clickable = target.closest('button, a, [role="button"], [role="menuitem"]') || target;
        clickable.scrollIntoView({ block: 'center' });
        clickable.click();
    }
    return true;
}
"#;

fn text_target_call(text: &str, click: bool) -> Result<String> {
    Ok(format!(
        "({})({}, {})",
        TEXT_TARGET_JS,
        serde_json::to_string(text)?,
        click
    ))
}

async fn text_target(page: &Page, text: &str, click: bool) -> Result<bool> {
    page.evaluate_expression(text_target_call(text, click)?)
        .await
        .with_context(|| format!("Failed to look up text '{}'", text))?
        .into_value()
        .map_err(|e| anyhow::anyhow!("Failed to parse text lookup result: {:?}", e))
}

/// Poll until an element showing `text` is visible.
///
/// Returns `Ok(false)` if `timeout` elapses first.
pub async fn wait_for_text(
    page: &Page,
    text: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<bool> {
    let start = Instant::now();
    loop {
        if text_target(page, text, false).await? {
            return Ok(true);
        }
        if start.elapsed() >= timeout {
            return Ok(false);
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Click the element showing `text`.
pub async fn click_text(page: &Page, text: &str) -> Result<()> {
    if text_target(page, text, true).await? {
        Ok(())
    } else {
        anyhow::bail!("No visible element with text '{}'", text)
    }
}

/// Focus a form field and type into it.
pub async fn fill(page: &Page, selector: &str, value: &str) -> Result<()> {
    let element = page
        .find_element(selector)
        .await
        .with_context(|| format!("Element not found '{}'", selector))?;

    element
        .click()
        .await
        .with_context(|| format!("Failed to focus '{}'", selector))?;

    element
        .type_str(value)
        .await
        .with_context(|| format!("Failed to type into '{}'", selector))?;

    Ok(())
}

pub async fn click(page: &Page, selector: &str) -> Result<()> {
    page.find_element(selector)
        .await
        .with_context(|| format!("Element not found '{}'", selector))?
        .click()
        .await
        .with_context(|| format!("Click failed on '{}'", selector))?;
    Ok(())
}

/// Scroll the window itself (not a container) to the bottom.
pub async fn scroll_window_to_bottom(page: &Page) -> Result<()> {
    page.evaluate_expression("window.scrollTo(0, document.body.scrollHeight)")
        .await
        .context("Failed to scroll window")?;
    Ok(())
}
