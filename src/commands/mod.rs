//! Command implementations for the CLI
//!
//! - start: Start the pricing server
//! - scrape: One-shot collection into the pricing file
//! - refresh: Trigger a refresh on a running instance
//! - test: Test configuration validity
//! - config: Configuration display and validation

pub mod config;
pub mod refresh;
pub mod scrape;
pub mod start;
