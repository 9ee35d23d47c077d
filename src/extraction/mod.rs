//! Report extraction module
//!
//! Parses fetched detail documents into typed reports, with tolerant
//! cell-level normalization.

pub mod normalize;
pub mod report;

pub use report::ReportParser;
