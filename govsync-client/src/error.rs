//! Errors returned by the client.
//!
//! | Variant           | Retried internally | Meaning |
//! |-------------------|--------------------|---------|
//! | `Authentication`  | No                 | Token issuance was rejected or failed |
//! | `Transport`       | Yes, then surfaced | Network error, 5xx, 429 or 408, retries spent |
//! | `RemoteRejection` | No                 | Any other non-success status |
//! | `Decode`          | No                 | A success response did not have the expected shape |
//! | `Cancelled`       | No                 | The caller's cancellation token fired |

use std::fmt;

use reqwest::{header::HeaderMap, Method, StatusCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("authentication failed: {message}")]
    Authentication {
        status: Option<StatusCode>,
        message: String,
    },

    #[error("{method} {path} failed after {attempts} attempt(s): {cause}")]
    Transport {
        method: Method,
        path: String,
        attempts: u32,
        cause: FailureCause,
    },

    #[error("{method} {path} was rejected with status {status}: {body}")]
    RemoteRejection {
        method: Method,
        path: String,
        status: StatusCode,
        headers: HeaderMap,
        body: String,
    },

    #[error("could not decode response of {method} {path}: {message}")]
    Decode {
        method: Method,
        path: String,
        message: String,
    },

    #[error("request cancelled")]
    Cancelled,
}

impl ClientError {
    /// Whether the failure was of the transient kind the client retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Transport { .. })
    }

    /// The HTTP status behind the error, if there was a response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Authentication { status, .. } => *status,
            ClientError::Transport {
                cause: FailureCause::Status { status, .. },
                ..
            } => Some(*status),
            ClientError::RemoteRejection { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// What went wrong on the last attempt of a call that exhausted its retries.
#[derive(Debug, Clone)]
pub enum FailureCause {
    Network(String),
    Status { status: StatusCode, body: String },
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Network(message) => write!(f, "network error: {}", message),
            FailureCause::Status { status, body } => write!(f, "status {}: {}", status, body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability() {
        let transport = ClientError::Transport {
            method: Method::GET,
            path: "v3/roles".to_string(),
            attempts: 6,
            cause: FailureCause::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "".to_string(),
            },
        };
        assert!(transport.is_retryable());
        assert_eq!(transport.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(
            transport.to_string(),
            "GET v3/roles failed after 6 attempt(s): status 503 Service Unavailable: "
        );

        let rejected = ClientError::RemoteRejection {
            method: Method::PATCH,
            path: "v3/roles/r1".to_string(),
            status: StatusCode::BAD_REQUEST,
            headers: HeaderMap::new(),
            body: "{\"detailCode\":\"400.1 Bad request content\"}".to_string(),
        };
        assert!(!rejected.is_retryable());
        assert!(rejected.to_string().contains("400.1 Bad request content"));

        assert!(!ClientError::Cancelled.is_retryable());
    }
}
