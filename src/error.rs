//! Error types for ptr-watch
//!
//! This module provides the error type hierarchy using `thiserror`.
//! Systemic failures (navigation, persistence) abort a run; report- and
//! row-level failures are recovered locally and recorded.

use thiserror::Error;

/// The main error type for ptr-watch operations
#[derive(Error, Debug)]
pub enum Error {
    /// Browser lifecycle and control errors
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    /// Site navigation errors (systemic, abort the run)
    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    /// Report parsing errors (report is skipped, run continues)
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Seen-set or artifact persistence errors (systemic)
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Notification delivery errors (logged, never retried)
    #[error("Notify error: {0}")]
    Notify(#[from] NotifyError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Browser lifecycle and control errors
#[derive(Error, Debug)]
pub enum BrowserError {
    /// Failed to launch browser
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// Browser configuration error
    #[error("Invalid browser configuration: {0}")]
    ConfigError(String),

    /// Element matching a selector was not found on the page
    #[error("Element not found: {0}")]
    ElementMissing(String),

    /// Timeout waiting for the browser
    #[error("Browser operation timed out after {0}ms")]
    Timeout(u64),

    /// In-page script evaluation failed
    #[error("Script evaluation failed: {0}")]
    Script(String),
}

/// Navigation errors raised by the search state machine
#[derive(Error, Debug)]
pub enum NavigationError {
    /// A per-step timeout was exceeded
    #[error("Timed out in state {state} after {elapsed_ms}ms")]
    Timeout {
        /// State the machine was in when the timeout fired
        state: &'static str,
        /// Elapsed time for the step, in milliseconds
        elapsed_ms: u64,
    },

    /// A required control or field was missing from the page
    #[error("Missing control in state {state}: {selector}")]
    ControlMissing {
        /// State the machine was in
        state: &'static str,
        /// Selector that failed to match
        selector: String,
    },

    /// Any other browser failure during a transition
    #[error("Failed in state {state}: {detail}")]
    Step {
        /// State the machine was in
        state: &'static str,
        /// Underlying failure description
        detail: String,
    },

    /// Detail link could not be resolved to an absolute URL
    #[error("Invalid detail URL: {0}")]
    InvalidUrl(String),
}

/// Report-level parse errors; the enclosing run continues
#[derive(Error, Debug)]
pub enum ParseError {
    /// A required labeled field was absent from the document
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A required field was present but unusable
    #[error("Malformed field {field}: {value:?}")]
    MalformedField {
        /// Field name
        field: &'static str,
        /// Raw text that failed to parse
        value: String,
    },

    /// The document contained no recognizable report structure
    #[error("Document has no report content")]
    EmptyDocument,
}

/// Persistence errors from the seen-set store or artifact writer
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Underlying I/O failure
    #[error("I/O failure on {path}: {source}")]
    Io {
        /// Path being read or written
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Stored seen-set could not be decoded
    #[error("Corrupt seen-set at {path}: {detail}")]
    Corrupt {
        /// Path of the store file
        path: String,
        /// Decode failure description
        detail: String,
    },

    /// Another run holds the store lock
    #[error("Seen-set locked by another run: {0}")]
    Locked(String),
}

/// Notification delivery errors
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Address failed to parse
    #[error("Invalid address: {0}")]
    BadAddress(String),

    /// Message could not be built
    #[error("Failed to build message: {0}")]
    Build(String),

    /// SMTP transport failure
    #[error("Delivery failed: {0}")]
    Transport(String),
}

/// Result type alias for ptr-watch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Convert chromiumoxide errors
impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::Script(err.to_string())
    }
}
