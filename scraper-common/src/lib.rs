//! Shared CLI and logging bootstrap for the scraper binaries in this workspace.
//!
//! Binaries flatten [`BrowserArgs`] into their own argument structs and call
//! [`init_logging`] once before doing any work.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Browser-launch arguments shared across all scraper commands.
#[derive(Debug, Clone, clap::Args)]
pub struct BrowserArgs {
    /// Custom Chrome/Edge binary path
    #[clap(long)]
    pub browser_path: Option<String>,

    /// Connect to an already-running browser via CDP URL
    #[clap(long)]
    pub cdp_url: Option<String>,

    /// Run the browser without a visible window
    #[clap(long)]
    pub headless: bool,

    /// Browser window width in pixels
    #[clap(long, default_value = "1280")]
    pub window_width: u32,

    /// Browser window height in pixels
    #[clap(long, default_value = "900")]
    pub window_height: u32,
}

/// Install the global tracing subscriber.
///
/// Honours `RUST_LOG`; falls back to `info`.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    tracing::debug!("Logging initialised");
}
