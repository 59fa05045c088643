//! codevault - Codebase upload service
//!
//! Uploads batches of files as codebases, browses them file by file and
//! serves them back as ZIP archives. Runs as two HTTP tiers: a public API
//! tier with a metadata ledger and an internal storage tier.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod vault;
pub mod web;

pub use config::Config;
pub use db::Database;
pub use error::{Result, VaultError};
