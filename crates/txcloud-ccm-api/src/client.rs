//! The cloud API capability consumed by the provider.

use async_trait::async_trait;
use std::fmt;
use txcloud_ccm_core::{InstanceDescriptor, RouteEntry};

use crate::error::Result;

/// Server-side filter for instance queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceFilter {
    /// Match instances that own the given private IP.
    PrivateIpAddress(String),
    /// Match the instance with the given ID.
    InstanceId(String),
}

impl InstanceFilter {
    /// Filter name as understood by `DescribeInstances`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PrivateIpAddress(_) => "private-ip-address",
            Self::InstanceId(_) => "instance-id",
        }
    }

    /// Filter value.
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::PrivateIpAddress(v) | Self::InstanceId(v) => v,
        }
    }
}

impl fmt::Display for InstanceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name(), self.value())
    }
}

/// Instance inventory and cluster route table operations.
///
/// Implementations return whatever the remote service returns: instances are
/// not filtered by VPC here and route operations are not deduplicated.
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Query instances matching a server-side filter, in response order.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote call fails.
    async fn query_instances(&self, filter: &InstanceFilter) -> Result<Vec<InstanceDescriptor>>;

    /// List the entries of a cluster route table.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote call fails.
    async fn describe_routes(&self, route_table: &str) -> Result<Vec<RouteEntry>>;

    /// Add an entry to a cluster route table.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote call fails or the service rejects the entry.
    async fn create_route(&self, route_table: &str, route: &RouteEntry) -> Result<()>;

    /// Remove an entry from a cluster route table.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote call fails or the service rejects the request.
    async fn delete_route(&self, route_table: &str, route: &RouteEntry) -> Result<()>;
}
