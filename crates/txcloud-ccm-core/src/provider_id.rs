//! Provider ID codec.
//!
//! Kubernetes identifies the cloud instance backing a node through
//! `Node.spec.providerID`. For this provider the value has the shape
//! `tencentcloud://<zone>/<instance-id>`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name this provider registers under; also the provider ID scheme.
pub const PROVIDER_NAME: &str = "tencentcloud";

const SCHEME_PREFIX: &str = "tencentcloud://";

/// A decoded provider ID: the availability zone and the CVM instance ID.
///
/// Both segments are guaranteed non-empty and free of `/`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProviderId {
    zone: String,
    instance_id: String,
}

impl ProviderId {
    /// Encode a zone and instance ID into a provider ID.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidSegment`] if either value is empty or contains `/`.
    pub fn new(zone: impl Into<String>, instance_id: impl Into<String>) -> Result<Self, IdError> {
        let zone = zone.into();
        let instance_id = instance_id.into();
        check_segment("zone", &zone)?;
        check_segment("instance_id", &instance_id)?;
        Ok(Self { zone, instance_id })
    }

    /// Decode a provider ID string.
    ///
    /// Accepts `tencentcloud://<zone>/<instance-id>` as well as the form with an
    /// empty leading segment, `tencentcloud:///<zone>/<instance-id>`, which is what
    /// Kubernetes stores when it prefixes the scheme onto `/<zone>/<instance-id>`.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::MissingScheme`] when the prefix is absent and
    /// [`IdError::InvalidFormat`] when the path is not exactly two non-empty segments.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        let path = s
            .strip_prefix(SCHEME_PREFIX)
            .ok_or_else(|| IdError::MissingScheme(s.to_string()))?;
        let path = path.strip_prefix('/').unwrap_or(path);

        let mut parts = path.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(zone), Some(instance_id), None) if !zone.is_empty() && !instance_id.is_empty() => {
                Ok(Self {
                    zone: zone.to_string(),
                    instance_id: instance_id.to_string(),
                })
            }
            _ => Err(IdError::InvalidFormat(s.to_string())),
        }
    }

    /// The availability zone segment.
    #[must_use]
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// The CVM instance ID segment.
    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Consume the provider ID, returning `(zone, instance_id)`.
    #[must_use]
    pub fn into_parts(self) -> (String, String) {
        (self.zone, self.instance_id)
    }
}

fn check_segment(field: &'static str, value: &str) -> Result<(), IdError> {
    if value.is_empty() || value.contains('/') {
        return Err(IdError::InvalidSegment {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

impl fmt::Debug for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProviderId({self})")
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME_PREFIX}{}/{}", self.zone, self.instance_id)
    }
}

impl FromStr for ProviderId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ProviderId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProviderId> for String {
    fn from(id: ProviderId) -> Self {
        id.to_string()
    }
}

/// Errors that can occur when encoding or decoding provider IDs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The value does not start with `tencentcloud://`.
    #[error("invalid format for providerId {0}: missing tencentcloud:// prefix")]
    MissingScheme(String),

    /// The path after the scheme is not `<zone>/<instance-id>`.
    #[error("invalid format for providerId {0}")]
    InvalidFormat(String),

    /// A segment passed to the encoder is empty or contains `/`.
    #[error("invalid {field} {value:?}: must be non-empty and must not contain '/'")]
    InvalidSegment {
        /// Which segment was rejected.
        field: &'static str,
        /// The rejected value.
        value: String,
    },
}
