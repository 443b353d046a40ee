//! Run configuration: target URLs, selectors, file locations and timings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

/// Account used for the one-time login.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// CSS selectors and marker text for the virtualized product table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSelectors {
    /// Scrollable element wrapping the table.
    pub container: String,
    /// Fully rendered, animated-in data rows.
    pub rows: String,
    /// Any body row; used when probing for the loading placeholder.
    pub any_row: String,
    pub cell: String,
    /// Sub-element of the rating cell that carries the numeric value.
    pub rating: String,
    /// Text a placeholder cell shows while data streams in.
    pub placeholder: String,
}

impl Default for TableSelectors {
    fn default() -> Self {
        Self {
            container: "div.rounded-md.border.shadow-sm.bg-card > div".to_string(),
            rows: "tbody tr.infinite-table-row-appear".to_string(),
            any_row: "tbody tr".to_string(),
            cell: "td".to_string(),
            rating: "span".to_string(),
            placeholder: "...".to_string(),
        }
    }
}

fn default_max_iterations() -> u32 {
    500
}

fn default_settle_ms() -> u64 {
    1000
}

fn default_loader_appear_ms() -> u64 {
    1000
}

fn default_loader_clear_ms() -> u64 {
    5000
}

/// Bounds for the scroll-and-collect loop.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CollectorSettings {
    /// Hard cap on scroll iterations.
    #[serde(default = "default_max_iterations")]
    #[validate(range(min = 1, max = 100000))]
    pub max_iterations: u32,

    /// Pause after each scroll so lazy rows can render.
    #[serde(default = "default_settle_ms")]
    #[validate(range(max = 60000))]
    pub settle_ms: u64,

    /// How long to look for a loader row after settling.
    #[serde(default = "default_loader_appear_ms")]
    #[validate(range(max = 60000))]
    pub loader_appear_ms: u64,

    /// How long to wait for a visible loader row to go away.
    #[serde(default = "default_loader_clear_ms")]
    #[validate(range(max = 120000))]
    pub loader_clear_ms: u64,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            settle_ms: default_settle_ms(),
            loader_appear_ms: default_loader_appear_ms(),
            loader_clear_ms: default_loader_clear_ms(),
        }
    }
}

impl CollectorSettings {
    /// Settings with every wait set to zero. Useful against in-memory surfaces.
    pub fn immediate(max_iterations: u32) -> Self {
        Self {
            max_iterations,
            settle_ms: 0,
            loader_appear_ms: 0,
            loader_clear_ms: 0,
        }
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn loader_appear(&self) -> Duration {
        Duration::from_millis(self.loader_appear_ms)
    }

    pub fn loader_clear(&self) -> Duration {
        Duration::from_millis(self.loader_clear_ms)
    }
}

/// One click in the fixed menu path, identified by its visible text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationStep {
    pub text: String,
    pub done_message: String,
}

impl NavigationStep {
    fn new(text: &str, done_message: &str) -> Self {
        Self {
            text: text.to_string(),
            done_message: done_message.to_string(),
        }
    }
}

/// URLs and timings for login and menu navigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationSettings {
    pub login_url: String,
    pub instructions_url: String,
    /// Button at the bottom of the instructions page that opens the app.
    pub launch_text: String,
    pub steps: Vec<NavigationStep>,
    /// URL fragment of the JSON response carrying `totalItemCount`.
    pub config_response_marker: String,
    /// Visible text shown when the login form is rejected.
    pub login_failed_text: String,
    pub step_timeout_ms: u64,
    pub step_pause_ms: u64,
    /// Settle time after actions that trigger page loads.
    pub load_settle_ms: u64,
    pub login_failure_probe_ms: u64,
    /// How long to keep waiting for the total count once the table is open.
    pub total_count_wait_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            login_url: "https://hiring.idenhq.com/".to_string(),
            instructions_url: "https://hiring.idenhq.com/instructions".to_string(),
            launch_text: "Launch Challenge".to_string(),
            steps: vec![
                NavigationStep::new("Menu", "Menu opened"),
                NavigationStep::new("Data Management", "Data Management opened"),
                NavigationStep::new("Inventory", "Inventory opened"),
                NavigationStep::new("View All Products", "All Products opened"),
                NavigationStep::new("Load Product Table", "Product table loaded"),
            ],
            config_response_marker: "get_user_config_safe".to_string(),
            login_failed_text: "Login failed".to_string(),
            step_timeout_ms: 10000,
            step_pause_ms: 800,
            load_settle_ms: 1500,
            login_failure_probe_ms: 10000,
            total_count_wait_ms: 2000,
            poll_interval_ms: 200,
        }
    }
}

impl NavigationSettings {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn step_pause(&self) -> Duration {
        Duration::from_millis(self.step_pause_ms)
    }

    pub fn load_settle(&self) -> Duration {
        Duration::from_millis(self.load_settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Everything one scrape run needs.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub session_file: PathBuf,
    pub output_file: PathBuf,
    pub navigation: NavigationSettings,
    pub selectors: TableSelectors,
    pub collector: CollectorSettings,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            session_file: PathBuf::from("session.json"),
            output_file: PathBuf::from("products.json"),
            navigation: NavigationSettings::default(),
            selectors: TableSelectors::default(),
            collector: CollectorSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_collector_settings_are_valid() {
        let settings = CollectorSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.max_iterations, 500);
        assert_eq!(settings.loader_clear(), Duration::from_secs(5));
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let settings = CollectorSettings::immediate(0);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_collector_settings_fill_defaults() {
        let settings: CollectorSettings =
            serde_json::from_str(r#"{ "max_iterations": 20 }"#).unwrap();
        assert_eq!(settings.max_iterations, 20);
        assert_eq!(settings.settle_ms, 1000);
        assert_eq!(settings.loader_appear_ms, 1000);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials {
            email: "me@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{:?}", creds);
        assert!(debug.contains("me@example.com"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_default_navigation_path() {
        let nav = NavigationSettings::default();
        let texts: Vec<&str> = nav.steps.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(
            texts,
            [
                "Menu",
                "Data Management",
                "Inventory",
                "View All Products",
                "Load Product Table"
            ]
        );
    }
}
