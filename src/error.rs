use std::time::Duration;

/// Error kind, a plain tag for exhaustive matching without
/// destructuring the error payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Liquidity,
    RateLimit,
    Api,
    Timeout,
    Cancelled,
    TokenNotFound,
    InvalidChain,
    InvalidAddress,
    InvalidAmount,
    Decode,
    Transport,
}

/// Error returned by the quoter client, the swap encoder and their
/// collaborators.
#[derive(Debug, thiserror::Error)]
pub enum DexError {
    #[error("insufficient liquidity: {0}")]
    Liquidity(String),

    #[error("rate limited, retry after: {retry_after:?}")]
    RateLimit { retry_after: Option<Duration> },

    #[error("api error (status {status:?}): {message}")]
    Api {
        status: Option<u16>,
        message: String,
    },

    #[error("request timed out")]
    Timeout,

    #[error("request cancelled")]
    Cancelled,

    #[error("token not found: {0}")]
    TokenNotFound(String),

    #[error("invalid chain: {0}")]
    InvalidChain(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl DexError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Liquidity(_) => ErrorKind::Liquidity,
            Self::RateLimit { .. } => ErrorKind::RateLimit,
            Self::Api { .. } => ErrorKind::Api,
            Self::Timeout => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::TokenNotFound(_) => ErrorKind::TokenNotFound,
            Self::InvalidChain(_) => ErrorKind::InvalidChain,
            Self::InvalidAddress(_) => ErrorKind::InvalidAddress,
            Self::InvalidAmount(_) => ErrorKind::InvalidAmount,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Transport(_) => ErrorKind::Transport,
        }
    }

    /// Whether another attempt of the same request may succeed.
    ///
    /// API errors without a status come from a successful response carrying
    /// an error payload and are never retried, same as 404.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimit { .. } | Self::Timeout | Self::Transport(_) => true,
            Self::Api {
                status: Some(status),
                ..
            } => *status != 404,
            Self::Api { status: None, .. }
            | Self::Liquidity(_)
            | Self::Cancelled
            | Self::TokenNotFound(_)
            | Self::InvalidChain(_)
            | Self::InvalidAddress(_)
            | Self::InvalidAmount(_)
            | Self::Decode(_) => false,
        }
    }

    /// Server-provided delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Heuristic over the upstream error text, which is the only
    /// signal the quoter API gives for missing liquidity.
    pub(crate) fn from_api_message(status: Option<u16>, message: String) -> Self {
        if message.to_ascii_lowercase().contains("insufficient liquidity") {
            Self::Liquidity(message)
        } else {
            Self::Api { status, message }
        }
    }
}

impl From<reqwest::Error> for DexError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(value.to_string())
        }
    }
}

impl From<serde_json::Error> for DexError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(DexError::Timeout.is_retryable());
        assert!(DexError::RateLimit { retry_after: None }.is_retryable());
        assert!(DexError::Transport("reset".to_string()).is_retryable());
        assert!(
            DexError::Api {
                status: Some(503),
                message: String::new()
            }
            .is_retryable()
        );

        assert!(!DexError::Cancelled.is_retryable());
        assert!(!DexError::Liquidity(String::new()).is_retryable());
        assert!(!DexError::TokenNotFound("FOO".to_string()).is_retryable());
        assert!(!DexError::InvalidChain("moon".to_string()).is_retryable());
        assert!(!DexError::Decode(String::new()).is_retryable());
        assert!(
            !DexError::Api {
                status: None,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            !DexError::Api {
                status: Some(404),
                message: String::new()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_liquidity_message_detection() {
        assert_eq!(
            DexError::from_api_message(None, "Insufficient liquidity in pools".to_string())
                .kind(),
            ErrorKind::Liquidity
        );
        assert_eq!(
            DexError::from_api_message(Some(404), "route not found".to_string()).kind(),
            ErrorKind::Api
        );
    }
}
