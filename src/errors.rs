// errors.rs
use std::fmt;

use crate::scraper::ScraperError;

/// Errors from the persistence layer. Always fatal to the current run:
/// losing dedup state silently would mean duplicate alerts later.
#[derive(Debug)]
pub enum StoreError {
    Open(String),
    Db(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Open(msg) => write!(f, "Failed to open store: {msg}"),
            StoreError::Db(msg) => write!(f, "Database error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Fatal outcome of a pipeline run. Notify failures are deliberately absent:
/// they are logged and retried on the next run instead of aborting this one.
#[derive(Debug)]
pub enum RunError {
    Fetch(ScraperError),
    Store(StoreError),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Fetch(e) => write!(f, "Fetch failed: {e}"),
            RunError::Store(e) => write!(f, "Store failed: {e}"),
        }
    }
}

impl std::error::Error for RunError {}

impl From<ScraperError> for RunError {
    fn from(e: ScraperError) -> Self {
        RunError::Fetch(e)
    }
}

impl From<StoreError> for RunError {
    fn from(e: StoreError) -> Self {
        RunError::Store(e)
    }
}
