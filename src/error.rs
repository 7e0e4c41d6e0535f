//! Error types for the flyer pipeline

use thiserror::Error;

/// Errors raised while configuring, fetching, formatting or delivering events.
///
/// Only `Config` is fatal. Everything else is logged by the poll loop and the
/// loop moves on to the next event or the next cycle.
#[derive(Debug, Error)]
pub enum FlyerError {
    /// Required setting missing or unparseable
    #[error("configuration error: {0}")]
    Config(String),

    /// Event API request, status or body failure
    #[error("event fetch failed: {0}")]
    SourceFetch(String),

    /// A single event had an unexpected shape
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// The chat channel rejected a message
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// Transport-level HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, FlyerError>;
