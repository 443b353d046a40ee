//! One-time login form submission.

use crate::config::{Credentials, NavigationSettings};
use crate::dom;
use crate::error::ScrapeError;
use anyhow::{Context, Result};
use chromiumoxide::Page;
use std::time::Duration;

const EMAIL_INPUT: &str = r#"input[type="email"]"#;
const PASSWORD_INPUT: &str = r#"input[type="password"]"#;
const SUBMIT_BUTTON: &str = r#"button[type="submit"]"#;

/// Submits the login form and checks whether the app rejected it.
pub struct Authenticator<'a> {
    settings: &'a NavigationSettings,
}

impl<'a> Authenticator<'a> {
    pub fn new(settings: &'a NavigationSettings) -> Self {
        Self { settings }
    }

    /// Log in on `page`.
    ///
    /// Fails with [`ScrapeError::AuthenticationFailed`] when the rejection
    /// message shows up within the probe window.
    pub async fn login(&self, page: &Page, credentials: &Credentials) -> Result<()> {
        page.goto(&self.settings.login_url)
            .await
            .with_context(|| format!("Failed to open {}", self.settings.login_url))?;

        dom::fill(page, EMAIL_INPUT, &credentials.email).await?;
        dom::fill(page, PASSWORD_INPUT, &credentials.password).await?;
        dom::click(page, SUBMIT_BUTTON).await?;

        tokio::time::sleep(self.settings.load_settle()).await;

        let rejected = dom::wait_for_text(
            page,
            &self.settings.login_failed_text,
            Duration::from_millis(self.settings.login_failure_probe_ms),
            self.settings.poll_interval(),
        )
        .await?;

        if rejected {
            tracing::error!(email = %credentials.email, "Login failed");
            return Err(ScrapeError::AuthenticationFailed.into());
        }

        tracing::info!(email = %credentials.email, "Logged in");
        Ok(())
    }
}
