//! Error types for marketbot-market.

use thiserror::Error;

/// Errors from the purchasing API and inventory source.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API rejected request: {0}")]
    Api(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Inventory snapshot unavailable for account {0}")]
    InventoryUnavailable(i64),
}

/// Result type alias for market operations.
pub type MarketResult<T> = std::result::Result<T, MarketError>;
