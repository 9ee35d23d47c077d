//! Browser session module
//!
//! This module provides the session-driver seam used by the navigation
//! state machine, plus its ChromiumOxide (CDP) implementation.

pub mod chrome;
pub mod driver;

pub use chrome::{ChromeConfig, ChromeSession};
pub use driver::SessionDriver;
