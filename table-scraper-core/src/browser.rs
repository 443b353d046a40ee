//! BrowserManager: CDP browser lifecycle.
//!
//! Launches (or connects to) one Chrome instance and hands out a single page
//! that the whole run drives.

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::handler::Handler;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::RwLock;

/// Configuration for the BrowserManager.
#[derive(Debug, Clone)]
pub struct BrowserManagerConfig {
    /// Custom Chrome/Edge binary path.
    pub browser_path: Option<String>,
    /// Connect to an already-running browser via CDP URL.
    pub cdp_url: Option<String>,
    /// Run headless (default: false, the login flow is easier to follow headed).
    pub headless: bool,
    /// Browser window size.
    pub window_size: (u32, u32),
}

impl Default for BrowserManagerConfig {
    fn default() -> Self {
        Self {
            browser_path: None,
            cdp_url: None,
            headless: false,
            window_size: (1280, 900),
        }
    }
}

/// Drive the CDP handler until the connection closes.
fn spawn_handler(mut handler: Handler) {
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
        tracing::debug!("CDP handler finished");
    });
}

/// Holds the browser instance and its one page.
pub struct BrowserManager {
    browser: RwLock<Option<Browser>>,
    page: RwLock<Option<Page>>,
    config: BrowserManagerConfig,
}

impl BrowserManager {
    pub fn new(config: BrowserManagerConfig) -> Self {
        Self {
            browser: RwLock::new(None),
            page: RwLock::new(None),
            config,
        }
    }

    /// Ensure a browser is running, launching one if needed.
    pub async fn ensure_browser(&self) -> Result<()> {
        let mut browser_guard = self.browser.write().await;
        if browser_guard.is_some() {
            return Ok(());
        }

        let browser = if let Some(ref cdp_url) = self.config.cdp_url {
            let (browser, handler) = Browser::connect(cdp_url)
                .await
                .with_context(|| format!("Failed to connect to browser at {}", cdp_url))?;
            spawn_handler(handler);
            browser
        } else {
            let mut builder = BrowserConfig::builder();

            if let Some(ref path) = self.config.browser_path {
                builder = builder.chrome_executable(path);
            }

            if !self.config.headless {
                builder = builder.with_head();
            }

            builder = builder
                .window_size(self.config.window_size.0, self.config.window_size.1)
                .arg("--disable-dev-shm-usage")
                .arg("--remote-allow-origins=*");

            let config = builder.build().map_err(|e| anyhow::anyhow!("{}", e))?;

            let (browser, handler) = Browser::launch(config)
                .await
                .context("Failed to launch browser")?;
            spawn_handler(handler);
            browser
        };

        tracing::info!(
            headless = self.config.headless,
            remote = self.config.cdp_url.is_some(),
            "Browser ready"
        );

        *browser_guard = Some(browser);
        Ok(())
    }

    /// Get or create the active page.
    pub async fn page(&self) -> Result<Page> {
        self.ensure_browser().await?;

        let mut page_guard = self.page.write().await;
        if let Some(ref page) = *page_guard {
            return Ok(page.clone());
        }

        let browser_guard = self.browser.read().await;
        let browser = browser_guard.as_ref().context("Browser not initialized")?;

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to create new page")?;

        *page_guard = Some(page.clone());
        Ok(page)
    }

    pub async fn is_running(&self) -> bool {
        self.browser.read().await.is_some()
    }

    /// Close the page and the browser. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.page.write().await.take();

        let Some(mut browser) = self.browser.write().await.take() else {
            return;
        };

        if self.config.cdp_url.is_some() {
            // Leave a browser we did not launch running.
            tracing::info!("Disconnected from browser");
            return;
        }

        if let Err(e) = browser.close().await {
            tracing::debug!(error = %e, "Browser close failed");
        }
        if let Err(e) = browser.wait().await {
            tracing::debug!(error = %e, "Browser process wait failed");
        }
        tracing::info!("Browser closed");
    }
}
