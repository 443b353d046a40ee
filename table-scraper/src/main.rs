//! Product table scraper binary.
//!
//! Provides two subcommands:
//! - `scrape` (default): Log in or restore the saved session, open the product
//!   table, and collect every row into a JSON file
//! - `login`: Log in with fresh credentials and save the session for reuse
//!
//! Credentials may also live in a `.env` file in the working directory.

use clap::{Parser, Subcommand};
use scraper_common::BrowserArgs;
use std::future::Future;
use std::path::PathBuf;
use table_scraper_core::browser::{BrowserManager, BrowserManagerConfig};
use table_scraper_core::config::{Credentials, ScrapeConfig};

#[derive(Parser)]
#[command(name = "table-scraper", about = "Scrape the product table into JSON")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Collect the product table (default when no subcommand given)
    Scrape(ScrapeArgs),

    /// Log in and save the session for later runs
    Login(LoginArgs),
}

#[derive(clap::Args)]
struct CredentialArgs {
    /// Account email
    #[clap(long, env = "IDEN_EMAIL")]
    email: Option<String>,

    /// Account password
    #[clap(long, env = "IDEN_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

impl CredentialArgs {
    fn into_credentials(self) -> Option<Credentials> {
        match (self.email, self.password) {
            (Some(email), Some(password)) => Some(Credentials { email, password }),
            _ => None,
        }
    }
}

#[derive(Parser)]
struct ScrapeArgs {
    #[clap(flatten)]
    browser: BrowserArgs,

    #[clap(flatten)]
    credentials: CredentialArgs,

    /// Output JSON file, rewritten after every new row
    #[clap(long, default_value = "products.json")]
    output: PathBuf,

    /// Saved session file
    #[clap(long, default_value = "session.json")]
    session_file: PathBuf,

    /// Maximum scroll iterations before giving up
    #[clap(long, default_value = "500")]
    max_iterations: u32,

    /// Pause after each scroll, in milliseconds
    #[clap(long, default_value = "1000")]
    settle_ms: u64,
}

#[derive(Parser)]
struct LoginArgs {
    #[clap(flatten)]
    browser: BrowserArgs,

    #[clap(flatten)]
    credentials: CredentialArgs,

    /// Session file to write
    #[clap(long, default_value = "session.json")]
    session_file: PathBuf,
}

fn browser_config(args: &BrowserArgs) -> BrowserManagerConfig {
    BrowserManagerConfig {
        browser_path: args.browser_path.clone(),
        cdp_url: args.cdp_url.clone(),
        headless: args.headless,
        window_size: (args.window_width, args.window_height),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Must run before parsing so the `env` args see the file's values.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    scraper_common::init_logging();

    match cli.command {
        None | Some(Command::Scrape(_)) => {
            // Extract scrape args (default or explicit)
            let args = match cli.command {
                Some(Command::Scrape(args)) => args,
                _ => ScrapeArgs::parse_from(["table-scraper"]),
            };
            run_scrape(args).await
        }
        Some(Command::Login(args)) => run_login(args).await,
    }
}

/// Run `work` until it finishes or `interrupt` fires, then close the browser.
///
/// `None` means the run was interrupted.
async fn until_interrupted<T>(
    manager: &BrowserManager,
    work: impl Future<Output = anyhow::Result<T>>,
    interrupt: impl Future<Output = ()>,
) -> anyhow::Result<Option<T>> {
    let result = tokio::select! {
        result = work => result.map(Some),
        _ = interrupt => {
            tracing::info!("Ctrl+C received, shutting down browser");
            Ok(None)
        }
    };
    manager.shutdown().await;
    result
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

async fn run_scrape(args: ScrapeArgs) -> anyhow::Result<()> {
    let mut config = ScrapeConfig {
        session_file: args.session_file,
        output_file: args.output,
        ..Default::default()
    };
    config.collector.max_iterations = args.max_iterations;
    config.collector.settle_ms = args.settle_ms;

    let manager = BrowserManager::new(browser_config(&args.browser));
    let credentials = args.credentials.into_credentials();

    let work = table_scraper_core::run_scrape(&manager, config, credentials);
    let Some(outcome) = until_interrupted(&manager, work, ctrl_c()).await? else {
        tracing::info!("Rows collected so far are already on disk");
        return Ok(());
    };

    tracing::info!(
        collected = outcome.collected,
        expected = outcome.expected_total,
        stop_reason = ?outcome.stop_reason,
        file = %outcome.output_file.display(),
        "Total collected: {} rows",
        outcome.collected
    );
    Ok(())
}

async fn run_login(args: LoginArgs) -> anyhow::Result<()> {
    let credentials = args
        .credentials
        .into_credentials()
        .ok_or_else(|| anyhow::anyhow!("Set IDEN_EMAIL and IDEN_PASSWORD (or pass --email/--password)"))?;

    let config = ScrapeConfig {
        session_file: args.session_file.clone(),
        ..Default::default()
    };

    let manager = BrowserManager::new(browser_config(&args.browser));
    let work = table_scraper_core::run_login(&manager, config, credentials);
    if until_interrupted(&manager, work, ctrl_c()).await?.is_none() {
        return Ok(());
    }

    println!();
    println!("Session saved to {}.", args.session_file.display());
    println!("Run `table-scraper scrape` to reuse it.");

    Ok(())
}
