//! Shared data model: instances, routes and node addresses.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a CVM instance as reported by the inventory API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceState {
    /// Instance is being created.
    Pending,
    /// Instance creation failed.
    LaunchFailed,
    /// Instance is running.
    Running,
    /// Instance is stopped.
    Stopped,
    /// Instance is starting.
    Starting,
    /// Instance is stopping.
    Stopping,
    /// Instance is rebooting.
    Rebooting,
    /// Instance has been shut down and is waiting to be released.
    Shutdown,
    /// Instance is being terminated.
    Terminating,
    /// State string not recognised.
    #[default]
    #[serde(other)]
    Unknown,
}

impl InstanceState {
    /// Parse an instance state from the API's `InstanceState` string.
    #[must_use]
    pub fn from_api_state(state: &str) -> Self {
        match state {
            "PENDING" => Self::Pending,
            "LAUNCH_FAILED" => Self::LaunchFailed,
            "RUNNING" => Self::Running,
            "STOPPED" => Self::Stopped,
            "STARTING" => Self::Starting,
            "STOPPING" => Self::Stopping,
            "REBOOTING" => Self::Rebooting,
            "SHUTDOWN" => Self::Shutdown,
            "TERMINATING" => Self::Terminating,
            _ => Self::Unknown,
        }
    }

    /// Whether the instance is running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// A CVM instance as seen by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDescriptor {
    /// Instance ID, e.g. `ins-abcd1234`.
    pub instance_id: String,
    /// Availability zone, e.g. `ap-guangzhou-3`.
    pub zone: String,
    /// Instance type, e.g. `S5.MEDIUM4`.
    pub instance_type: String,
    /// Current lifecycle state.
    pub instance_state: InstanceState,
    /// VPC the instance's primary network interface belongs to.
    pub vpc_id: String,
    /// Private addresses in API order.
    pub private_ips: Vec<String>,
    /// Public addresses in API order.
    pub public_ips: Vec<String>,
}

impl InstanceDescriptor {
    /// Whether the instance has `ip` among its private addresses.
    #[must_use]
    pub fn has_private_ip(&self, ip: &str) -> bool {
        self.private_ips.iter().any(|p| p == ip)
    }
}

/// One entry of a cluster route table.
///
/// The `(gateway_ip, destination_cidr)` pair identifies the entry within a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Next hop, the private IP of the node owning the CIDR.
    pub gateway_ip: String,
    /// Pod CIDR routed to the gateway.
    pub destination_cidr: String,
}

impl RouteEntry {
    /// Create a route entry.
    #[must_use]
    pub fn new(gateway_ip: impl Into<String>, destination_cidr: impl Into<String>) -> Self {
        Self {
            gateway_ip: gateway_ip.into(),
            destination_cidr: destination_cidr.into(),
        }
    }
}

impl fmt::Display for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via {}", self.destination_cidr, self.gateway_ip)
    }
}

/// Kind of a node address, named after the Kubernetes `NodeAddressType` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeAddressType {
    /// Address reachable inside the VPC.
    InternalIP,
    /// Address reachable from outside the VPC.
    ExternalIP,
}

impl NodeAddressType {
    /// The Kubernetes string for this address type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InternalIP => "InternalIP",
            Self::ExternalIP => "ExternalIP",
        }
    }
}

impl fmt::Display for NodeAddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed node address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddress {
    /// Address kind.
    pub kind: NodeAddressType,
    /// The IP address, verbatim from the inventory.
    pub address: String,
}

impl NodeAddress {
    /// An `InternalIP` address.
    #[must_use]
    pub fn internal(address: impl Into<String>) -> Self {
        Self {
            kind: NodeAddressType::InternalIP,
            address: address.into(),
        }
    }

    /// An `ExternalIP` address.
    #[must_use]
    pub fn external(address: impl Into<String>) -> Self {
        Self {
            kind: NodeAddressType::ExternalIP,
            address: address.into(),
        }
    }
}
