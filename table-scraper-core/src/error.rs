//! Error types for the scraper core.
//!
//! Library-level failures are typed here; the pipeline and the binary wrap
//! them in `anyhow` with context.

use chromiumoxide::error::CdpError;
use std::path::PathBuf;
use thiserror::Error;

/// Failure raised by a [`Surface`](crate::surface::Surface) or one of its rows.
#[derive(Error, Debug)]
pub enum SurfaceError {
    /// The browser, tab, or CDP connection is gone.
    #[error("Surface lost: {0}")]
    Lost(String),

    /// A selector the surface depends on matched nothing.
    #[error("Element not found: {0}")]
    Missing(String),

    /// Any other browser-side failure.
    #[error("Browser error: {0}")]
    Browser(String),
}

impl SurfaceError {
    pub fn is_lost(&self) -> bool {
        matches!(self, SurfaceError::Lost(_))
    }
}

/// Messages Chrome returns once the target behind a session has gone away.
const TARGET_GONE_MARKERS: &[&str] = &[
    "Target closed",
    "No target with given id",
    "Session with given id not found",
    "Cannot find context with specified id",
];

fn means_target_gone(message: &str) -> bool {
    TARGET_GONE_MARKERS.iter().any(|m| message.contains(m))
}

impl From<CdpError> for SurfaceError {
    fn from(err: CdpError) -> Self {
        match err {
            CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
                SurfaceError::Lost(err.to_string())
            }
            CdpError::NotFound => SurfaceError::Missing(err.to_string()),
            other => {
                let message = other.to_string();
                if means_target_gone(&message) {
                    SurfaceError::Lost(message)
                } else {
                    SurfaceError::Browser(message)
                }
            }
        }
    }
}

/// Failure writing records or the session file to disk.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Fatal failures of the login / navigation flow.
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// The application rejected the submitted credentials.
    #[error("Login failed: the application rejected the credentials")]
    AuthenticationFailed,

    /// No stored session and no credentials to log in with.
    #[error("No saved session and no credentials provided (set IDEN_EMAIL and IDEN_PASSWORD)")]
    MissingCredentials,

    /// A fixed navigation step never became visible.
    #[error("Timed out after {timeout_ms}ms waiting for '{step}'")]
    StepTimeout { step: String, timeout_ms: u64 },
}
