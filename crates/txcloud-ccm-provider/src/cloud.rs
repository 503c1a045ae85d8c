//! The Tencent Cloud provider.

use std::sync::Arc;

use tracing::{info, warn};
use txcloud_ccm_api::{CloudApi, HttpCloudApi};
use txcloud_ccm_core::PROVIDER_NAME;

use crate::capability::CapabilityTable;
use crate::config::CloudConfig;
use crate::error::Result;
use crate::instances::InstanceResolver;
use crate::routes::RouteTranslator;

/// The provider instance handed to the orchestrator.
///
/// One [`CloudApi`] client is shared by the instance resolver and the route
/// translator.
pub struct TencentCloud {
    config: CloudConfig,
    capabilities: CapabilityTable,
}

impl TencentCloud {
    /// Build the provider on top of an existing cloud API client.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the configuration is incomplete.
    pub fn new(config: CloudConfig, api: Arc<dyn CloudApi>) -> Result<Self> {
        config.validate()?;
        if config.cluster_route_table.is_empty() {
            warn!("cluster_route_table is empty; route operations will fail");
        }

        let instances = Arc::new(InstanceResolver::new(api.clone(), config.vpc_id.clone()));
        let routes = Arc::new(RouteTranslator::new(api, config.cluster_route_table.clone()));
        let capabilities = CapabilityTable::new()
            .with_instances(instances)
            .with_routes(routes);

        info!(
            region = %config.region,
            vpc_id = %config.vpc_id,
            route_table = %config.cluster_route_table,
            "tencentcloud provider initialized"
        );
        Ok(Self {
            config,
            capabilities,
        })
    }

    /// Build the provider with an HTTP client for Tencent Cloud API 3.0.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is incomplete or the HTTP client
    /// cannot be created.
    pub fn from_config(config: CloudConfig) -> Result<Self> {
        config.validate()?;
        let api = HttpCloudApi::new(config.api_settings())?;
        Self::new(config, Arc::new(api))
    }

    /// The name this provider registers under.
    #[must_use]
    pub const fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }

    /// Whether the provider can tag resources with a cluster ID. It cannot.
    #[must_use]
    pub const fn has_cluster_id(&self) -> bool {
        false
    }

    /// The implemented capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    /// The effective configuration.
    #[must_use]
    pub fn config(&self) -> &CloudConfig {
        &self.config
    }
}

impl std::fmt::Debug for TencentCloud {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TencentCloud")
            .field("config", &self.config)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}
