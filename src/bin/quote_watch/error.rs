//! Error types for the quote watcher.

use ekubo_quoter_sdk::error::DexError;

/// Main error type for the quote watcher.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Quoter SDK error: {0}")]
    Dex(#[from] DexError),

    #[error("Decimals of token {0} are unknown, pass --decimals")]
    UnknownDecimals(String),

    #[error("Amount {0} does not fit into a signed 256-bit integer")]
    AmountOverflow(String),

    #[error("Signal handler error: {0}")]
    Signal(#[from] std::io::Error),

    #[error("Polling stopped after {0} consecutive errors")]
    TooManyErrors(u32),

    #[error("Poller event channel closed unexpectedly")]
    PollerClosed,
}

pub type Result<T> = std::result::Result<T, Error>;
