//! VPC-scoped instance resolution.
//!
//! Every lookup asks the cloud API for candidates matching one filter, then
//! keeps only instances in the configured VPC. The API is never trusted to
//! scope results itself.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};
use txcloud_ccm_api::{ApiError, CloudApi, InstanceFilter};
use txcloud_ccm_core::{InstanceDescriptor, NodeAddress, ProviderId};

use crate::addresses::to_address_list;
use crate::capability::Instances;
use crate::error::{CcmError, Result};

/// Resolves node names and provider IDs to CVM instances.
pub struct InstanceResolver {
    api: Arc<dyn CloudApi>,
    vpc_id: String,
}

impl InstanceResolver {
    /// Create a resolver scoped to `vpc_id`.
    #[must_use]
    pub fn new(api: Arc<dyn CloudApi>, vpc_id: impl Into<String>) -> Self {
        Self {
            api,
            vpc_id: vpc_id.into(),
        }
    }

    /// The VPC this resolver is scoped to.
    #[must_use]
    pub fn vpc_id(&self) -> &str {
        &self.vpc_id
    }

    /// Find the instance in the VPC that owns private IP `ip`.
    ///
    /// # Errors
    ///
    /// `NotFound` when no instance in the VPC owns the IP. `ExternalService`
    /// when the query itself failed.
    #[instrument(skip(self), fields(vpc_id = %self.vpc_id))]
    pub async fn resolve_by_private_ip(&self, ip: &str) -> Result<InstanceDescriptor> {
        let filter = InstanceFilter::PrivateIpAddress(ip.to_string());
        let candidates = self.query(&filter).await?;
        self.pick(candidates, &filter, |instance| instance.has_private_ip(ip))
    }

    /// Find the instance in the VPC with instance ID `id`.
    ///
    /// # Errors
    ///
    /// `NotFound` when no instance in the VPC has the ID. `ExternalService`
    /// when the query itself failed.
    #[instrument(skip(self), fields(vpc_id = %self.vpc_id))]
    pub async fn resolve_by_instance_id(&self, id: &str) -> Result<InstanceDescriptor> {
        let filter = InstanceFilter::InstanceId(id.to_string());
        let candidates = self.query(&filter).await?;
        self.pick(candidates, &filter, |instance| instance.instance_id == id)
    }

    /// Decode `provider_id` and resolve its instance ID.
    ///
    /// The zone segment is not checked against the instance.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a malformed provider ID, without any remote call.
    /// Otherwise as [`InstanceResolver::resolve_by_instance_id`].
    pub async fn resolve_by_provider_id(&self, provider_id: &str) -> Result<InstanceDescriptor> {
        let id = ProviderId::parse(provider_id)?;
        self.resolve_by_instance_id(id.instance_id()).await
    }

    async fn query(&self, filter: &InstanceFilter) -> Result<Vec<InstanceDescriptor>> {
        self.api.query_instances(filter).await.map_err(|e| {
            debug!(%filter, error = %e, "instance query failed");
            CcmError::ExternalService(e)
        })
    }

    /// First candidate, in response order, inside the VPC and satisfying `matches`.
    fn pick(
        &self,
        candidates: Vec<InstanceDescriptor>,
        filter: &InstanceFilter,
        matches: impl Fn(&InstanceDescriptor) -> bool,
    ) -> Result<InstanceDescriptor> {
        let returned = candidates.len();
        let found = candidates
            .into_iter()
            .find(|instance| instance.vpc_id == self.vpc_id && matches(instance));

        match found {
            Some(instance) => {
                debug!(
                    %filter,
                    instance_id = %instance.instance_id,
                    zone = %instance.zone,
                    "resolved instance"
                );
                Ok(instance)
            }
            None => {
                debug!(%filter, returned, "no instance in VPC");
                Err(CcmError::NotFound(format!("{filter} in {}", self.vpc_id)))
            }
        }
    }
}

#[async_trait]
impl Instances for InstanceResolver {
    async fn node_addresses(&self, name: &str) -> Result<Vec<NodeAddress>> {
        let instance = self.resolve_by_private_ip(name).await?;
        Ok(to_address_list(&instance))
    }

    async fn node_addresses_by_provider_id(&self, provider_id: &str) -> Result<Vec<NodeAddress>> {
        let instance = self.resolve_by_provider_id(provider_id).await?;
        Ok(to_address_list(&instance))
    }

    async fn instance_id(&self, name: &str) -> Result<String> {
        let instance = self.resolve_by_private_ip(name).await?;
        let id = ProviderId::new(instance.zone, instance.instance_id).map_err(|e| {
            ApiError::Decode {
                action: "DescribeInstances",
                reason: format!("incomplete instance record: {e}"),
            }
        })?;
        Ok(id.to_string())
    }

    async fn instance_type(&self, name: &str) -> Result<String> {
        Ok(self.resolve_by_private_ip(name).await?.instance_type)
    }

    async fn instance_type_by_provider_id(&self, provider_id: &str) -> Result<String> {
        Ok(self.resolve_by_provider_id(provider_id).await?.instance_type)
    }

    async fn instance_exists_by_provider_id(&self, provider_id: &str) -> Result<bool> {
        self.resolve_by_provider_id(provider_id).await.map(|_| true)
    }

    async fn instance_shutdown_by_provider_id(&self, provider_id: &str) -> Result<bool> {
        let instance = self.resolve_by_provider_id(provider_id).await?;
        Ok(!instance.instance_state.is_running())
    }

    async fn external_id(&self, name: &str) -> Result<String> {
        Ok(self.resolve_by_private_ip(name).await?.instance_id)
    }

    async fn add_ssh_key_to_all_instances(&self, _user: &str, _key_data: &[u8]) -> Result<()> {
        Err(CcmError::NotSupported("AddSSHKeyToAllInstances"))
    }

    async fn current_node_name(&self, _hostname: &str) -> Result<String> {
        Err(CcmError::NotSupported("CurrentNodeName"))
    }
}
