//! Session driver contract
//!
//! The navigation state machine is written against this trait so tests
//! can inject a scripted fake in place of a real browser.

use crate::error::BrowserError;
use async_trait::async_trait;
use std::time::Duration;

/// Blocking-with-timeout browser primitives for one scrape session.
///
/// Every method is a single site interaction. Implementations surface
/// elapsed timeouts as [`BrowserError::Timeout`] so the caller can map
/// them to navigation failures carrying the machine state.
#[async_trait]
pub trait SessionDriver: Send {
    /// Load a URL and wait for the document to be ready
    async fn open(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Wait until an element matching the selector is present
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Click the first element matching the selector
    async fn click(&mut self, selector: &str) -> Result<(), BrowserError>;

    /// Set the value of the first input matching the selector
    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError>;

    /// Whether an element matching the selector is currently present
    async fn exists(&mut self, selector: &str) -> Result<bool, BrowserError>;

    /// Serialized HTML of the current document
    async fn current_document(&mut self) -> Result<String, BrowserError>;

    /// Release the underlying browser resources
    async fn close(&mut self) -> Result<(), BrowserError>;
}
