//! Run configuration and site constants
//!
//! Scrape settings come from CLI flags; SMTP credentials come from the
//! environment only, never from flags.

use std::path::PathBuf;
use std::time::Duration;

/// Entry URL of the disclosure search site
pub const DEFAULT_ENTRY_URL: &str = "https://efdsearch.senate.gov/search/";

/// Consent checkbox on the entry page
pub const AGREEMENT_CHECKBOX: &str = "#agree_statement";

/// PTR report-type checkbox on the search form
pub const PTR_CHECKBOX: &str = "#reportTypes";

/// From-date input on the search form
pub const FROM_DATE_INPUT: &str = "#fromDate";

/// Search form submit button
pub const SEARCH_SUBMIT: &str = "button[type='submit']";

/// Any rendered cell of the result table (present for both results and
/// the explicit empty indicator)
pub const LISTING_READY: &str = "#filedReports tbody td";

/// Result rows on the current listing page
pub const LISTING_ROWS: &str = "#filedReports tbody tr";

/// Explicit "no results" indicator
pub const NO_RESULTS: &str = "td.dataTables_empty";

/// Next-page control, only when enabled
pub const NEXT_PAGE_ENABLED: &str = "#filedReports_next:not(.disabled)";

/// Body of a loaded report detail page
pub const DETAIL_READY: &str = "section.filedReport, div.filedReport, table.table";

/// Settings for one scrape run
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Entry URL to start the session at
    pub entry_url: String,
    /// Per-step timeout applied to every state transition
    pub step_timeout: Duration,
    /// Run the browser headless
    pub headless: bool,
    /// Enable the Chrome sandbox (disable inside containers)
    pub sandbox: bool,
    /// Explicit Chrome/Chromium executable path
    pub chrome_path: Option<String>,
    /// Directory for run artifacts and the seen-set file
    pub data_dir: PathBuf,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            entry_url: DEFAULT_ENTRY_URL.to_string(),
            step_timeout: Duration::from_secs(10),
            headless: true,
            sandbox: true,
            chrome_path: None,
            data_dir: PathBuf::from("data"),
        }
    }
}

impl ScrapeConfig {
    /// Path of the persisted seen-set file
    pub fn seen_path(&self) -> PathBuf {
        self.data_dir.join("seen_reports.json")
    }
}

/// SMTP settings for the email notifier
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP relay host
    pub smtp_host: String,
    /// SMTP relay port
    pub smtp_port: u16,
    /// Login username
    pub username: String,
    /// Login password or app password
    pub password: String,
    /// From address
    pub from_address: String,
    /// Recipient addresses
    pub recipients: Vec<String>,
}

impl EmailConfig {
    /// Build from `PTRWATCH_*` environment variables.
    ///
    /// Returns `None` when the required variables are absent, in which
    /// case the pipeline falls back to log-only notification.
    pub fn from_env() -> Option<Self> {
        let username = std::env::var("PTRWATCH_SMTP_USERNAME").ok()?;
        let password = std::env::var("PTRWATCH_SMTP_PASSWORD").ok()?;
        let recipients: Vec<String> = std::env::var("PTRWATCH_NOTIFY_TO")
            .ok()?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if recipients.is_empty() {
            return None;
        }

        let smtp_host = std::env::var("PTRWATCH_SMTP_HOST")
            .unwrap_or_else(|_| "smtp.gmail.com".to_string());
        let smtp_port = std::env::var("PTRWATCH_SMTP_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(587);
        let from_address =
            std::env::var("PTRWATCH_NOTIFY_FROM").unwrap_or_else(|_| username.clone());

        Some(Self {
            smtp_host,
            smtp_port,
            username,
            password,
            from_address,
            recipients,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScrapeConfig::default();
        assert_eq!(config.entry_url, DEFAULT_ENTRY_URL);
        assert_eq!(config.step_timeout, Duration::from_secs(10));
        assert!(config.headless);
        assert!(config.sandbox);
        assert!(config.chrome_path.is_none());
    }

    #[test]
    fn test_seen_path_under_data_dir() {
        let config = ScrapeConfig {
            data_dir: PathBuf::from("/var/lib/ptr-watch"),
            ..ScrapeConfig::default()
        };
        assert_eq!(
            config.seen_path(),
            PathBuf::from("/var/lib/ptr-watch/seen_reports.json")
        );
    }
}
