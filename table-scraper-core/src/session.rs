//! Session persistence across runs.
//!
//! The application keeps its login state in `sessionStorage.current_user`.
//! After a successful login that value is saved to a small JSON file; later
//! runs inject it back into a fresh page and reload, skipping the login form.

use crate::writer::to_pretty_json;
use anyhow::{Context, Result};
use chromiumoxide::Page;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// `sessionStorage` key holding the login state.
pub const SESSION_KEY: &str = "current_user";

/// Stored proof of login. Opaque to this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionToken {
    pub current_user: serde_json::Value,
}

/// Session file on disk.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored token, `None` if no session file exists.
    pub fn load(&self) -> Result<Option<SessionToken>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let token: SessionToken = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(Some(token))
    }

    pub fn save(&self, token: &SessionToken) -> Result<()> {
        let contents = to_pretty_json(token)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    /// Remove the session file if present.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }
}

/// How a run gets a logged-in page.
#[derive(Debug, PartialEq)]
pub enum AuthPlan {
    /// Re-inject a stored token and reload.
    Restore(SessionToken),
    /// Submit the login form.
    Login,
}

impl AuthPlan {
    pub fn decide(store: &SessionStore, force_login: bool) -> Result<Self> {
        if force_login {
            return Ok(AuthPlan::Login);
        }
        Ok(match store.load()? {
            Some(token) => AuthPlan::Restore(token),
            None => AuthPlan::Login,
        })
    }
}

fn set_item_script(token: &SessionToken) -> Result<String> {
    let serialized = serde_json::to_string(&token.current_user)?;
    Ok(format!(
        "sessionStorage.setItem({}, {})",
        serde_json::to_string(SESSION_KEY)?,
        serde_json::to_string(&serialized)?
    ))
}

/// Open `login_url`, inject the stored token and reload so the app picks it up.
pub async fn restore_session(page: &Page, token: &SessionToken, login_url: &str) -> Result<()> {
    page.goto(login_url)
        .await
        .with_context(|| format!("Failed to open {}", login_url))?;

    page.evaluate_expression(set_item_script(token)?)
        .await
        .context("Failed to inject session token")?;

    page.reload().await.context("Failed to reload after session restore")?;

    tracing::info!("Session restored");
    Ok(())
}

/// Turn the value `sessionStorage.getItem` evaluated to into a token.
///
/// An unset key comes back as JS `null` (or no value at all) and means there
/// is nothing to save.
fn token_from_storage(value: Option<&serde_json::Value>) -> Result<Option<SessionToken>> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(raw)) => {
            let current_user = serde_json::from_str(raw)
                .with_context(|| format!("'{}' in sessionStorage is not JSON", SESSION_KEY))?;
            Ok(Some(SessionToken { current_user }))
        }
        Some(other) => anyhow::bail!("Unexpected sessionStorage value: {}", other),
    }
}

/// Read the login state out of the page, if the app stored one.
pub async fn capture_session(page: &Page) -> Result<Option<SessionToken>> {
    let script = format!(
        "sessionStorage.getItem({})",
        serde_json::to_string(SESSION_KEY)?
    );
    let result = page
        .evaluate_expression(script)
        .await
        .context("Failed to read sessionStorage")?;

    token_from_storage(result.value())
}

/// Store the token captured after a fresh login.
///
/// Without a token the old session file is dropped: it belongs to the login
/// that was just replaced. Call only once the new login has gone through.
pub fn commit_captured(store: &SessionStore, captured: Option<&SessionToken>) -> Result<bool> {
    match captured {
        Some(token) => {
            store.save(token)?;
            Ok(true)
        }
        None => {
            store.clear()?;
            Ok(false)
        }
    }
}
