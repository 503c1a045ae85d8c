//! The capability contract exposed to the orchestrator.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use txcloud_ccm_core::{NodeAddress, RouteEntry};

use crate::error::Result;

/// Node lifecycle queries.
///
/// Node names are the nodes' private IPs; provider IDs use the
/// `tencentcloud://<zone>/<instance-id>` form.
#[async_trait]
pub trait Instances: Send + Sync {
    /// Addresses of the instance whose private IP is `name`.
    ///
    /// # Errors
    ///
    /// `NotFound` if no instance in the VPC owns the IP, `ExternalService` if the lookup failed.
    async fn node_addresses(&self, name: &str) -> Result<Vec<NodeAddress>>;

    /// Addresses of the instance identified by `provider_id`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a malformed provider ID, otherwise as [`Instances::node_addresses`].
    async fn node_addresses_by_provider_id(&self, provider_id: &str) -> Result<Vec<NodeAddress>>;

    /// Provider ID of the node named `name`.
    ///
    /// # Errors
    ///
    /// `NotFound` or `ExternalService` from the lookup.
    async fn instance_id(&self, name: &str) -> Result<String>;

    /// Instance type of the node named `name`.
    ///
    /// # Errors
    ///
    /// `NotFound` or `ExternalService` from the lookup.
    async fn instance_type(&self, name: &str) -> Result<String>;

    /// Instance type of the instance identified by `provider_id`.
    ///
    /// # Errors
    ///
    /// `InvalidInput`, `NotFound` or `ExternalService`.
    async fn instance_type_by_provider_id(&self, provider_id: &str) -> Result<String>;

    /// Whether the instance still exists.
    ///
    /// Returns `Ok(true)` when it does. Absence is reported as a `NotFound`
    /// error, never as `Ok(false)`.
    ///
    /// # Errors
    ///
    /// `InvalidInput`, `NotFound` or `ExternalService`.
    async fn instance_exists_by_provider_id(&self, provider_id: &str) -> Result<bool>;

    /// Whether the instance exists but is not running.
    ///
    /// # Errors
    ///
    /// `InvalidInput`, `NotFound` or `ExternalService`.
    async fn instance_shutdown_by_provider_id(&self, provider_id: &str) -> Result<bool>;

    /// Instance ID (without zone) of the node named `name`.
    ///
    /// # Errors
    ///
    /// `NotFound` or `ExternalService` from the lookup.
    async fn external_id(&self, name: &str) -> Result<String>;

    /// Register an SSH key on every instance.
    ///
    /// # Errors
    ///
    /// Always `NotSupported`.
    async fn add_ssh_key_to_all_instances(&self, user: &str, key_data: &[u8]) -> Result<()>;

    /// Name of the node this process runs on.
    ///
    /// # Errors
    ///
    /// Always `NotSupported`.
    async fn current_node_name(&self, hostname: &str) -> Result<String>;
}

/// Pod CIDR routes between nodes.
#[async_trait]
pub trait Routes: Send + Sync {
    /// All routes in the cluster route table.
    ///
    /// # Errors
    ///
    /// `ExternalService` if the table cannot be read.
    async fn list_routes(&self, cluster_name: &str) -> Result<Vec<RouteEntry>>;

    /// Add a route. `name_hint` is informational only.
    ///
    /// # Errors
    ///
    /// `ExternalService` with the remote service's own error.
    async fn create_route(&self, cluster_name: &str, name_hint: &str, route: &RouteEntry)
        -> Result<()>;

    /// Remove a route.
    ///
    /// # Errors
    ///
    /// `ExternalService` with the remote service's own error.
    async fn delete_route(&self, cluster_name: &str, route: &RouteEntry) -> Result<()>;
}

/// Optional interfaces an orchestrator may ask a cloud provider for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Node lifecycle queries.
    Instances,
    /// Pod CIDR routes.
    Routes,
    /// Service load balancers.
    LoadBalancer,
    /// Zone and region metadata.
    Zones,
    /// Cluster enumeration.
    Clusters,
}

impl Capability {
    /// All capability kinds.
    pub const ALL: [Self; 5] = [
        Self::Instances,
        Self::Routes,
        Self::LoadBalancer,
        Self::Zones,
        Self::Clusters,
    ];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Instances => "Instances",
            Self::Routes => "Routes",
            Self::LoadBalancer => "LoadBalancer",
            Self::Zones => "Zones",
            Self::Clusters => "Clusters",
        };
        f.write_str(name)
    }
}

/// The capabilities a provider implements, queried by kind.
///
/// Load balancers, zones and clusters have no implementation in this provider
/// and are always reported absent.
#[derive(Clone, Default)]
pub struct CapabilityTable {
    instances: Option<Arc<dyn Instances>>,
    routes: Option<Arc<dyn Routes>>,
}

impl CapabilityTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the `Instances` implementation.
    #[must_use]
    pub fn with_instances(mut self, instances: Arc<dyn Instances>) -> Self {
        self.instances = Some(instances);
        self
    }

    /// Register the `Routes` implementation.
    #[must_use]
    pub fn with_routes(mut self, routes: Arc<dyn Routes>) -> Self {
        self.routes = Some(routes);
        self
    }

    /// The `Instances` implementation, if supported.
    #[must_use]
    pub fn instances(&self) -> Option<Arc<dyn Instances>> {
        self.instances.clone()
    }

    /// The `Routes` implementation, if supported.
    #[must_use]
    pub fn routes(&self) -> Option<Arc<dyn Routes>> {
        self.routes.clone()
    }

    /// Whether `capability` is implemented.
    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Instances => self.instances.is_some(),
            Capability::Routes => self.routes.is_some(),
            Capability::LoadBalancer | Capability::Zones | Capability::Clusters => false,
        }
    }

    /// Implemented capabilities, in [`Capability::ALL`] order.
    #[must_use]
    pub fn supported(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| self.supports(*c))
            .collect()
    }
}

impl fmt::Debug for CapabilityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityTable")
            .field("supported", &self.supported())
            .finish()
    }
}
