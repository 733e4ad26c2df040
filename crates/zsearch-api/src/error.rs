use reqwest::StatusCode;
use thiserror::Error;

use crate::retry::is_retryable_status;

/// Everything that can go wrong talking to the search endpoint
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No API key configured. Set BIGMODEL_API_KEY or add `key` under [api] in the config file")]
    MissingApiKey,

    #[error("Invalid search request: {0}")]
    InvalidRequest(String),

    #[error("Search request rejected: {0}")]
    BadRequest(String),

    #[error("Authentication failed: {message}")]
    Unauthorized { status: u16, message: String },

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    ParseError(#[from] serde_json::Error),
}

impl ApiError {
    /// Whether sending the same request again could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Timeout | ApiError::RateLimited(_) => true,
            ApiError::NetworkError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ApiError::RequestFailed { status, .. } => StatusCode::from_u16(*status)
                .map(is_retryable_status)
                .unwrap_or(false),
            ApiError::MissingApiKey
            | ApiError::InvalidRequest(_)
            | ApiError::BadRequest(_)
            | ApiError::Unauthorized { .. }
            | ApiError::ParseError(_) => false,
        }
    }

    /// HTTP status the server answered with, if it answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::BadRequest(_) => Some(StatusCode::BAD_REQUEST.as_u16()),
            ApiError::Unauthorized { status, .. } | ApiError::RequestFailed { status, .. } => {
                Some(*status)
            }
            ApiError::RateLimited(_) => Some(StatusCode::TOO_MANY_REQUESTS.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(ApiError::Timeout.is_retryable());
        assert!(ApiError::RateLimited("slow down".into()).is_retryable());
        assert!(ApiError::RequestFailed { status: 503, message: String::new() }.is_retryable());

        assert!(!ApiError::RequestFailed { status: 404, message: String::new() }.is_retryable());
        assert!(!ApiError::Unauthorized { status: 401, message: "bad key".into() }.is_retryable());
        assert!(!ApiError::BadRequest("bad count".into()).is_retryable());
        assert!(!ApiError::InvalidRequest("empty".into()).is_retryable());
        assert!(!ApiError::MissingApiKey.is_retryable());
    }

    #[test]
    fn test_retryable_follows_status_rule() {
        // 408 is a transient failure even though it's a 4xx
        assert!(ApiError::RequestFailed { status: 408, message: String::new() }.is_retryable());
        assert!(ApiError::RequestFailed { status: 502, message: String::new() }.is_retryable());
        assert!(!ApiError::RequestFailed { status: 409, message: String::new() }.is_retryable());
        assert!(!ApiError::RequestFailed { status: 1000, message: String::new() }.is_retryable());
    }

    #[test]
    fn test_status_of_server_replies() {
        assert_eq!(ApiError::BadRequest("x".into()).status(), Some(400));
        assert_eq!(ApiError::Unauthorized { status: 403, message: "x".into() }.status(), Some(403));
        assert_eq!(ApiError::RateLimited("x".into()).status(), Some(429));
        assert_eq!(ApiError::RequestFailed { status: 502, message: "x".into() }.status(), Some(502));

        assert_eq!(ApiError::InvalidRequest("empty".into()).status(), None);
        assert_eq!(ApiError::Timeout.status(), None);
        assert_eq!(ApiError::MissingApiKey.status(), None);
    }
}
