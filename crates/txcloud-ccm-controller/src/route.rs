//! Route controller.
//!
//! Keeps the cluster route table in line with the pod CIDRs assigned to
//! Nodes. Each Node with a pod CIDR wants one route whose gateway is the node
//! name, which is the node's private IP.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, ListParams};
use kube::Client;
use tracing::{debug, error, info, warn};
use txcloud_ccm_core::RouteEntry;
use txcloud_ccm_provider::Routes;

use crate::node::reconcile_ticker;

/// A route some Node wants, with the node name used as the creation hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredRoute {
    /// Name of the Node.
    pub node_name: String,
    /// The route for its pod CIDR.
    pub route: RouteEntry,
}

/// Routes to delete and create to reach the desired state.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RoutePlan {
    /// Routes to create.
    pub create: Vec<DesiredRoute>,
    /// Routes no Node wants.
    pub delete: Vec<RouteEntry>,
}

/// Outcome of one reconcile pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RouteStats {
    /// Routes created.
    pub created: usize,
    /// Routes deleted.
    pub deleted: usize,
    /// Create or delete calls that failed.
    pub failed: usize,
}

/// Routes wanted by `nodes`, one per Node with a pod CIDR.
#[must_use]
pub fn desired_routes(nodes: &[Node]) -> Vec<DesiredRoute> {
    nodes
        .iter()
        .filter_map(|node| {
            let name = node.metadata.name.as_deref()?;
            let cidr = node.spec.as_ref()?.pod_cidr.as_deref()?;
            if name.is_empty() || cidr.is_empty() {
                return None;
            }
            Some(DesiredRoute {
                node_name: name.to_string(),
                route: RouteEntry::new(name, cidr),
            })
        })
        .collect()
}

/// Compare desired routes against the table's current entries.
///
/// An entry whose CIDR points at the wrong gateway is deleted and recreated.
#[must_use]
pub fn plan_routes(desired: &[DesiredRoute], existing: &[RouteEntry]) -> RoutePlan {
    let wanted: HashSet<&RouteEntry> = desired.iter().map(|d| &d.route).collect();
    let present: HashSet<&RouteEntry> = existing.iter().collect();

    RoutePlan {
        create: desired
            .iter()
            .filter(|d| !present.contains(&d.route))
            .cloned()
            .collect(),
        delete: existing
            .iter()
            .filter(|r| !wanted.contains(r))
            .cloned()
            .collect(),
    }
}

/// Bring the route table in line with `nodes`.
///
/// Deletes run before creates so a reassigned CIDR is free when its new route
/// is added. A failed create or delete is logged and counted; the next pass
/// tries again.
///
/// # Errors
///
/// Returns an error if the current routes cannot be listed.
pub async fn reconcile_routes(
    routes: &dyn Routes,
    cluster_name: &str,
    nodes: &[Node],
) -> txcloud_ccm_provider::Result<RouteStats> {
    let existing = routes.list_routes(cluster_name).await?;
    let plan = plan_routes(&desired_routes(nodes), &existing);
    let mut stats = RouteStats::default();

    for route in &plan.delete {
        match routes.delete_route(cluster_name, route).await {
            Ok(()) => stats.deleted += 1,
            Err(e) => {
                warn!(%route, error = %e, "Failed to delete route");
                stats.failed += 1;
            }
        }
    }

    for desired in &plan.create {
        match routes
            .create_route(cluster_name, &desired.node_name, &desired.route)
            .await
        {
            Ok(()) => stats.created += 1,
            Err(e) => {
                warn!(
                    node = %desired.node_name,
                    route = %desired.route,
                    error = %e,
                    "Failed to create route"
                );
                stats.failed += 1;
            }
        }
    }

    Ok(stats)
}

/// Periodically reconciles the cluster route table against Node pod CIDRs.
pub struct RouteController {
    nodes: Api<Node>,
    routes: Arc<dyn Routes>,
    cluster_name: String,
    period: Duration,
}

impl RouteController {
    /// Create a controller for all Nodes visible to `client`.
    #[must_use]
    pub fn new(
        client: Client,
        routes: Arc<dyn Routes>,
        cluster_name: impl Into<String>,
        period: Duration,
    ) -> Self {
        Self {
            nodes: Api::all(client),
            routes,
            cluster_name: cluster_name.into(),
            period,
        }
    }

    /// Run until the task is dropped.
    pub async fn run(&self) {
        info!(
            cluster_name = %self.cluster_name,
            period_secs = self.period.as_secs(),
            "Starting route controller"
        );
        let mut ticker = reconcile_ticker(self.period);
        loop {
            ticker.tick().await;
            self.reconcile().await;
        }
    }

    async fn reconcile(&self) {
        let nodes = match self.nodes.list(&ListParams::default()).await {
            Ok(list) => list.items,
            Err(e) => {
                error!(error = %e, "Failed to list nodes");
                return;
            }
        };

        match reconcile_routes(self.routes.as_ref(), &self.cluster_name, &nodes).await {
            Ok(stats) if stats == RouteStats::default() => debug!("Routes up to date"),
            Ok(stats) => info!(
                created = stats.created,
                deleted = stats.deleted,
                failed = stats.failed,
                "Reconciled routes"
            ),
            Err(e) => error!(error = %e, "Failed to list routes"),
        }
    }
}
