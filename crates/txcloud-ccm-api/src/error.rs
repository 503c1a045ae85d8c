//! Cloud API error types.

use thiserror::Error;

/// A result type using `ApiError`.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors produced at the cloud API boundary.
///
/// Every variant means the remote call did not succeed. None of them says
/// anything about whether the queried resource exists.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never got a response (connect, TLS, timeout, body read).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with an error envelope.
    #[error("{action} failed: [{code}] {message} (RequestId: {request_id})")]
    Remote {
        /// API action that failed, e.g. `DescribeInstances`.
        action: &'static str,
        /// Error code, e.g. `AuthFailure.SignatureFailure`.
        code: String,
        /// Human-readable error message.
        message: String,
        /// Request ID assigned by the API.
        request_id: String,
    },

    /// Non-success HTTP status without an error envelope.
    #[error("{action} returned HTTP {status}")]
    Http {
        /// API action that failed.
        action: &'static str,
        /// HTTP status code.
        status: u16,
    },

    /// The response body could not be decoded.
    #[error("invalid {action} response: {reason}")]
    Decode {
        /// API action whose response was rejected.
        action: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// The request body could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    /// The configured endpoint is not a usable URL.
    #[error("invalid API endpoint: {0}")]
    InvalidEndpoint(String),
}

impl ApiError {
    /// Create a remote error.
    #[must_use]
    pub fn remote(
        action: &'static str,
        code: impl Into<String>,
        message: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self::Remote {
            action,
            code: code.into(),
            message: message.into(),
            request_id: request_id.into(),
        }
    }

    /// The API error code, if the API returned one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Remote { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Returns `true` if repeating the same call later might succeed.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            Self::Remote { code, .. } => {
                code.starts_with("InternalError")
                    || code.starts_with("RequestLimitExceeded")
                    || code == "ResourceUnavailable"
            }
            Self::Decode { .. } | Self::Encode(_) | Self::InvalidEndpoint(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_display() {
        let err = ApiError::remote(
            "DescribeInstances",
            "AuthFailure.SecretIdNotFound",
            "The SecretId is not found",
            "req-1",
        );
        assert_eq!(
            err.to_string(),
            "DescribeInstances failed: [AuthFailure.SecretIdNotFound] The SecretId is not found (RequestId: req-1)"
        );
        assert_eq!(err.code(), Some("AuthFailure.SecretIdNotFound"));
    }

    #[test]
    fn retriable_classification() {
        assert!(ApiError::remote("A", "InternalError", "boom", "r").is_retriable());
        assert!(ApiError::remote("A", "RequestLimitExceeded", "slow down", "r").is_retriable());
        assert!(!ApiError::remote("A", "AuthFailure", "denied", "r").is_retriable());
        assert!(ApiError::Http {
            action: "A",
            status: 502
        }
        .is_retriable());
        assert!(!ApiError::Http {
            action: "A",
            status: 404
        }
        .is_retriable());
        assert!(!ApiError::Decode {
            action: "A",
            reason: "eof".to_string()
        }
        .is_retriable());
    }
}
