//! Fixed menu path from the instructions page to the product table.

use crate::config::NavigationSettings;
use crate::dom;
use crate::error::ScrapeError;
use crate::observer::TotalCountObserver;
use anyhow::{Context, Result};
use chromiumoxide::Page;
use std::time::Duration;

/// Drives the UI to the product table.
pub struct Navigator<'a> {
    settings: &'a NavigationSettings,
}

impl<'a> Navigator<'a> {
    pub fn new(settings: &'a NavigationSettings) -> Self {
        Self { settings }
    }

    /// Walk from the instructions page to a loaded product table.
    ///
    /// Returns the advisory total row count, 0 when the config response was
    /// never seen. A step that does not appear in time is fatal.
    pub async fn open_product_table(&self, page: &Page) -> Result<u64> {
        let settings = self.settings;

        page.goto(&settings.instructions_url)
            .await
            .with_context(|| format!("Failed to open {}", settings.instructions_url))?;
        tokio::time::sleep(settings.load_settle()).await;

        let observer =
            TotalCountObserver::attach(page, &settings.config_response_marker).await?;

        // The launch button sits at the bottom of the instructions page.
        dom::scroll_window_to_bottom(page).await?;
        tokio::time::sleep(Duration::from_millis(1000)).await;

        self.wait_for(page, &settings.launch_text).await?;
        dom::click_text(page, &settings.launch_text).await?;
        tokio::time::sleep(settings.load_settle()).await;
        tracing::info!("Clicked {}", settings.launch_text);

        for step in &settings.steps {
            self.wait_for(page, &step.text).await?;
            tokio::time::sleep(settings.step_pause()).await;
            dom::click_text(page, &step.text)
                .await
                .with_context(|| format!("Navigation step '{}' failed", step.text))?;
            tokio::time::sleep(settings.load_settle()).await;
            tracing::info!(step = %step.text, "{}", step.done_message);
            tokio::time::sleep(settings.step_pause()).await;
        }

        let total = observer
            .total(Duration::from_millis(settings.total_count_wait_ms))
            .await;
        Ok(total)
    }

    async fn wait_for(&self, page: &Page, text: &str) -> Result<()> {
        let timeout = self.settings.step_timeout();
        if dom::wait_for_text(page, text, timeout, self.settings.poll_interval()).await? {
            Ok(())
        } else {
            Err(ScrapeError::StepTimeout {
                step: text.to_string(),
                timeout_ms: self.settings.step_timeout_ms,
            }
            .into())
        }
    }
}
