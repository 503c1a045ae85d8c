//! Error types for the provider.

use thiserror::Error;
use txcloud_ccm_api::ApiError;
use txcloud_ccm_core::IdError;

/// Errors returned to the orchestrator.
///
/// `NotFound` is a definitive answer from the inventory and may drive node
/// deletion. `ExternalService` only says the question could not be answered.
#[derive(Error, Debug)]
pub enum CcmError {
    /// Malformed provider ID. Raised before any remote call.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] IdError),

    /// No instance in the configured VPC matched the lookup.
    #[error("instance not found: {0}")]
    NotFound(String),

    /// The cloud API call failed.
    #[error("cloud API error: {0}")]
    ExternalService(#[from] ApiError),

    /// The operation is not implemented by this provider.
    #[error("{0} is not supported by the tencentcloud provider")]
    NotSupported(&'static str),

    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl CcmError {
    /// Whether the inventory definitively reported the instance as absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the orchestrator may get a different answer by asking again later.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::ExternalService(e) => e.is_retriable(),
            Self::InvalidInput(_) | Self::NotFound(_) | Self::NotSupported(_) | Self::Config(_) => {
                false
            }
        }
    }
}

/// A specialized Result type for provider operations.
pub type Result<T> = std::result::Result<T, CcmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_distinct_from_external_failure() {
        let not_found = CcmError::NotFound("instance-id=ins-1 in vpc-a".to_string());
        assert!(not_found.is_not_found());
        assert!(!not_found.is_retriable());

        let external = CcmError::from(ApiError::remote(
            "DescribeInstances",
            "InternalError",
            "boom",
            "req-1",
        ));
        assert!(!external.is_not_found());
        assert!(external.is_retriable());
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            CcmError::NotSupported("AddSSHKeyToAllInstances").to_string(),
            "AddSSHKeyToAllInstances is not supported by the tencentcloud provider"
        );
        let invalid = CcmError::from(IdError::InvalidFormat("tencentcloud://x".to_string()));
        assert_eq!(
            invalid.to_string(),
            "invalid input: invalid format for providerId tencentcloud://x"
        );
    }
}
