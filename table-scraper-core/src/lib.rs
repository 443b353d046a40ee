//! Product-table scraper core library.
//!
//! Provides [`run_scrape`], which logs in (or restores a saved session),
//! walks the app's menus to the product table, and collects every row into a
//! JSON file, plus [`run_login`] for refreshing the saved session only.

pub mod browser;
pub mod collector;
pub mod config;
pub mod dom;
pub mod error;
pub mod login;
pub mod navigator;
pub mod observer;
pub mod record;
pub mod session;
pub mod surface;
pub mod writer;

use anyhow::{Context, Result};
use browser::BrowserManager;
use chromiumoxide::Page;
use collector::{CollectionState, Collector, StopReason};
use config::{Credentials, ScrapeConfig};
use error::ScrapeError;
use login::Authenticator;
use navigator::Navigator;
use session::{AuthPlan, SessionStore};
use std::path::PathBuf;
use surface::ChromeTableSurface;
use validator::Validate;
use writer::JsonFileWriter;

/// Summary of a finished scrape.
#[derive(Debug)]
pub struct RunOutcome {
    pub collected: usize,
    /// Advisory total from the app, 0 when unknown.
    pub expected_total: u64,
    pub stop_reason: StopReason,
    pub output_file: PathBuf,
}

/// Make `page` logged in, preferring a stored session.
///
/// With `force_login` the stored session is ignored and replaced.
async fn authenticate(
    page: &Page,
    config: &ScrapeConfig,
    credentials: Option<&Credentials>,
    force_login: bool,
) -> Result<()> {
    let store = SessionStore::new(&config.session_file);

    if let AuthPlan::Restore(token) = AuthPlan::decide(&store, force_login)? {
        tracing::info!(file = %store.path().display(), "Found saved session");
        return session::restore_session(page, &token, &config.navigation.login_url).await;
    }

    let credentials = credentials.ok_or(ScrapeError::MissingCredentials)?;
    Authenticator::new(&config.navigation)
        .login(page, credentials)
        .await?;

    let captured = session::capture_session(page).await?;
    if session::commit_captured(&store, captured.as_ref())? {
        tracing::info!(file = %store.path().display(), "Session saved");
    } else {
        tracing::warn!("No session found in sessionStorage, nothing saved");
    }
    Ok(())
}

async fn scrape_with(
    manager: &BrowserManager,
    config: &ScrapeConfig,
    credentials: Option<&Credentials>,
) -> Result<RunOutcome> {
    let page = manager.page().await?;

    authenticate(&page, config, credentials, false).await?;

    let expected_total = Navigator::new(&config.navigation)
        .open_product_table(&page)
        .await?;

    let surface = ChromeTableSurface::new(page.clone(), config.selectors.clone())
        .with_poll_interval(config.navigation.poll_interval());
    let mut writer = JsonFileWriter::new(&config.output_file);
    let collector = Collector::new(config.collector.clone(), config.selectors.placeholder.clone());

    let report = collector
        .collect(&surface, CollectionState::new(expected_total), &mut writer)
        .await
        .with_context(|| format!("Failed to write {}", config.output_file.display()))?;

    tracing::info!(
        collected = report.records.len(),
        file = %writer.path().display(),
        "Data saved"
    );

    Ok(RunOutcome {
        collected: report.records.len(),
        expected_total,
        stop_reason: report.stop_reason,
        output_file: config.output_file.clone(),
    })
}

/// Run the whole flow: authenticate, navigate, collect, write.
///
/// The browser is launched on first use; shutting `manager` down is left to
/// the caller so an interrupted run can close it the same way.
pub async fn run_scrape(
    manager: &BrowserManager,
    config: ScrapeConfig,
    credentials: Option<Credentials>,
) -> Result<RunOutcome> {
    config
        .collector
        .validate()
        .context("Invalid collector settings")?;

    scrape_with(manager, &config, credentials.as_ref()).await
}

/// Log in with `credentials` and save a fresh session file.
///
/// The old session file is only replaced after the new login went through.
pub async fn run_login(
    manager: &BrowserManager,
    config: ScrapeConfig,
    credentials: Credentials,
) -> Result<()> {
    let page = manager.page().await?;
    authenticate(&page, &config, Some(&credentials), true).await
}
