//! ptr-watch - Senate Periodic Transaction Report watcher
//!
//! This crate scrapes newly filed Periodic Transaction Reports (PTRs)
//! from the Senate financial-disclosure site, parses them into typed
//! transaction records, deduplicates against reports seen in prior runs,
//! persists a JSON run artifact, and notifies an operator by email.
//!
//! # Architecture
//!
//! ```text
//! Chrome (CDP) ──▶ SessionDriver ──▶ SearchNavigator (state machine)
//!                                          │ result rows
//!                                          ▼
//!                                    ReportParser
//!                                          │ reports
//!                                          ▼
//!                                     SeenStore ──▶ RunResult ──▶ Notifier
//!                                    (filter/commit)     │
//!                                                        ▼
//!                                                  JSON artifact
//! ```
//!
//! The navigation is modeled as an explicit state machine over an
//! injected [`browser::SessionDriver`], so timeout and retry behavior is
//! testable without a real browser. Parsing is tolerant: malformed rows
//! become recorded warnings, never report-level failures. The seen-set
//! commits only after the run result has been delivered.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod browser;
pub mod config;
pub mod dedup;
pub mod error;
pub mod extraction;
pub mod model;
pub mod navigation;
pub mod notify;
pub mod run;

// Re-exports for convenience
pub use browser::{ChromeSession, SessionDriver};
pub use config::{EmailConfig, ScrapeConfig};
pub use dedup::{JsonFileBackend, MemoryBackend, SeenStore};
pub use error::{Error, Result};
pub use extraction::ReportParser;
pub use model::{Report, ReportIdentity, RunOutcome, RunResult, Transaction};
pub use navigation::{NavState, SearchNavigator};
pub use notify::{EmailNotifier, LogNotifier, Notifier};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
