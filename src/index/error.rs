use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Cache connection lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Rate limited: retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Server error: status {0}")]
    ServerError(u16),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that may go away when the same request is sent again
pub trait Retryable {
    fn is_retryable(&self) -> bool;

    /// Delay requested by the server, if any
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(e) => !e.is_builder() && !e.is_decode(),
            FetchError::RateLimited { .. } | FetchError::ServerError(_) => true,
            FetchError::NotFound(_) | FetchError::InvalidResponse(_) | FetchError::Io(_) => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(FetchError::RateLimited { retry_after_secs: None }, true)]
    #[case(FetchError::ServerError(503), true)]
    #[case(FetchError::NotFound("https://go.dev/dl/".into()), false)]
    #[case(FetchError::InvalidResponse("truncated".into()), false)]
    fn is_retryable_by_kind(#[case] error: FetchError, #[case] expected: bool) {
        assert_eq!(error.is_retryable(), expected);
    }

    #[test]
    fn retry_after_is_reported_for_rate_limits() {
        let error = FetchError::RateLimited {
            retry_after_secs: Some(3),
        };
        assert_eq!(error.retry_after(), Some(Duration::from_secs(3)));
        assert_eq!(FetchError::ServerError(500).retry_after(), None);
    }
}
