//! Error types for the MTM engine.

use thiserror::Error;

/// Core error type for `mtm-core` operations.
#[derive(Error, Debug)]
pub enum MtmError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("trade is not yet closed")]
    TradeNotClosed,

    #[error("invalid trade state: {0}")]
    InvalidTradeState(String),

    #[error("unsupported mode: {0}")]
    UnsupportedMode(String),
}

/// Result type alias for `mtm-core` operations.
pub type Result<T> = std::result::Result<T, MtmError>;
