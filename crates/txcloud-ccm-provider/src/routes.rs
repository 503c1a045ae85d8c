//! Cluster route table translation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use txcloud_ccm_api::CloudApi;
use txcloud_ccm_core::RouteEntry;

use crate::capability::Routes;
use crate::error::Result;

/// Maps orchestrator route calls onto the configured TKE route table.
///
/// Routes are passed through verbatim. There is no local idempotency: creating
/// an existing route or deleting a missing one returns whatever the remote
/// service answers. The cluster name is ignored since the table is fixed by
/// configuration.
pub struct RouteTranslator {
    api: Arc<dyn CloudApi>,
    route_table: String,
}

impl RouteTranslator {
    /// Create a translator operating on `route_table`.
    #[must_use]
    pub fn new(api: Arc<dyn CloudApi>, route_table: impl Into<String>) -> Self {
        Self {
            api,
            route_table: route_table.into(),
        }
    }

    /// The route table this translator operates on.
    #[must_use]
    pub fn route_table(&self) -> &str {
        &self.route_table
    }
}

#[async_trait]
impl Routes for RouteTranslator {
    async fn list_routes(&self, cluster_name: &str) -> Result<Vec<RouteEntry>> {
        let routes = self.api.describe_routes(&self.route_table).await?;
        debug!(
            cluster_name,
            route_table = %self.route_table,
            count = routes.len(),
            "listed routes"
        );
        Ok(routes)
    }

    async fn create_route(
        &self,
        cluster_name: &str,
        name_hint: &str,
        route: &RouteEntry,
    ) -> Result<()> {
        self.api.create_route(&self.route_table, route).await?;
        info!(
            cluster_name,
            name_hint,
            route_table = %self.route_table,
            %route,
            "created route"
        );
        Ok(())
    }

    async fn delete_route(&self, cluster_name: &str, route: &RouteEntry) -> Result<()> {
        self.api.delete_route(&self.route_table, route).await?;
        info!(
            cluster_name,
            route_table = %self.route_table,
            %route,
            "deleted route"
        );
        Ok(())
    }
}
