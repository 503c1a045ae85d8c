//! Node lifecycle controller.
//!
//! Every period the controller lists all Nodes and, for each one, asks the
//! provider what the cloud knows about the backing instance:
//!
//! - a missing `spec.providerID` is initialised from the node name
//! - `status.addresses` follow the instance's addresses
//! - a Node whose instance is gone is deleted
//! - a stopped instance gets the shutdown taint, which is removed once it runs again
//!
//! A failed cloud call never changes a Node.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::core::v1::{Node, NodeAddress, Taint};
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams};
use kube::Client;
use serde_json::{json, Map, Value};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use txcloud_ccm_provider::{to_k8s_addresses, Instances};

/// Taint placed on nodes whose instance is not running.
pub const SHUTDOWN_TAINT_KEY: &str = "node.cloudprovider.kubernetes.io/shutdown";

const SHUTDOWN_TAINT_EFFECT: &str = "NoSchedule";

/// Nodes reconciled in parallel.
const CONCURRENCY: usize = 8;

/// Changes to write back to a Node.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NodeUpdate {
    /// New `spec.providerID`.
    pub provider_id: Option<String>,
    /// New `status.addresses`.
    pub addresses: Option<Vec<NodeAddress>>,
    /// New `spec.taints`.
    pub taints: Option<Vec<Taint>>,
    /// `metadata.resourceVersion` the update was computed from.
    pub resource_version: Option<String>,
}

impl NodeUpdate {
    fn is_empty(&self) -> bool {
        self.provider_id.is_none() && self.addresses.is_none() && self.taints.is_none()
    }

    /// Merge patch for the Node's spec, if anything in it changes.
    ///
    /// A merge patch replaces the whole taint list, so the patch carries the
    /// listed `resourceVersion` and the API server rejects it with a conflict
    /// if the Node changed in the meantime.
    #[must_use]
    pub fn spec_patch(&self) -> Option<Value> {
        let mut spec = Map::new();
        if let Some(provider_id) = &self.provider_id {
            spec.insert("providerID".to_string(), json!(provider_id));
        }
        if let Some(taints) = &self.taints {
            spec.insert("taints".to_string(), json!(taints));
        }
        if spec.is_empty() {
            return None;
        }
        Some(match &self.resource_version {
            Some(rv) => json!({ "metadata": { "resourceVersion": rv }, "spec": spec }),
            None => json!({ "spec": spec }),
        })
    }

    /// Merge patch for the Node's status, if the addresses change.
    #[must_use]
    pub fn status_patch(&self) -> Option<Value> {
        self.addresses
            .as_ref()
            .map(|addresses| json!({ "status": { "addresses": addresses } }))
    }
}

/// What to do with a Node after asking the cloud about it.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeAction {
    /// The instance no longer exists.
    Delete,
    /// Write the given changes.
    Update(NodeUpdate),
    /// Nothing to write this period.
    Skip,
}

/// Decide what to do with `node`.
pub async fn plan_node(instances: &dyn Instances, node: &Node) -> NodeAction {
    let Some(name) = node.metadata.name.as_deref() else {
        return NodeAction::Skip;
    };
    let spec = node.spec.as_ref();
    let mut update = NodeUpdate::default();

    let provider_id = match spec.and_then(|s| s.provider_id.as_deref()) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => match instances.instance_id(name).await {
            Ok(id) => {
                update.provider_id = Some(id.clone());
                id
            }
            Err(e) => {
                warn!(node = name, error = %e, "Cannot determine provider ID");
                return NodeAction::Skip;
            }
        },
    };

    match instances.instance_exists_by_provider_id(&provider_id).await {
        Ok(_) => {}
        Err(e) if e.is_not_found() => {
            info!(node = name, %provider_id, "Instance no longer exists");
            return NodeAction::Delete;
        }
        Err(e) => {
            warn!(node = name, %provider_id, error = %e, "Instance existence check failed");
            return NodeAction::Skip;
        }
    }

    match instances.instance_shutdown_by_provider_id(&provider_id).await {
        Ok(shutdown) => {
            let current = spec.and_then(|s| s.taints.as_deref()).unwrap_or_default();
            update.taints = reconcile_shutdown_taint(current, shutdown);
        }
        Err(e) => warn!(node = name, error = %e, "Instance shutdown check failed"),
    }

    match instances.node_addresses_by_provider_id(&provider_id).await {
        Ok(addresses) => {
            let addresses = to_k8s_addresses(&addresses);
            let current = node
                .status
                .as_ref()
                .and_then(|s| s.addresses.as_deref())
                .unwrap_or_default();
            if addresses != current {
                update.addresses = Some(addresses);
            }
        }
        Err(e) => warn!(node = name, error = %e, "Node address lookup failed"),
    }

    if update.is_empty() {
        NodeAction::Skip
    } else {
        update.resource_version.clone_from(&node.metadata.resource_version);
        NodeAction::Update(update)
    }
}

/// The taint list after adding or removing the shutdown taint, or `None` if unchanged.
pub fn reconcile_shutdown_taint(current: &[Taint], shutdown: bool) -> Option<Vec<Taint>> {
    let tainted = current.iter().any(|t| t.key == SHUTDOWN_TAINT_KEY);
    match (shutdown, tainted) {
        (true, false) => {
            let mut taints = current.to_vec();
            taints.push(Taint {
                key: SHUTDOWN_TAINT_KEY.to_string(),
                effect: SHUTDOWN_TAINT_EFFECT.to_string(),
                ..Taint::default()
            });
            Some(taints)
        }
        (false, true) => Some(
            current
                .iter()
                .filter(|t| t.key != SHUTDOWN_TAINT_KEY)
                .cloned()
                .collect(),
        ),
        _ => None,
    }
}

/// Ticker for a reconcile loop.
///
/// A pass that overruns the period delays the next one instead of triggering
/// catch-up passes.
#[must_use]
pub fn reconcile_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Periodically reconciles every Node against the cloud inventory.
pub struct NodeController {
    nodes: Api<Node>,
    instances: Arc<dyn Instances>,
    period: Duration,
}

impl NodeController {
    /// Create a controller for all Nodes visible to `client`.
    #[must_use]
    pub fn new(client: Client, instances: Arc<dyn Instances>, period: Duration) -> Self {
        Self {
            nodes: Api::all(client),
            instances,
            period,
        }
    }

    /// Run until the task is dropped.
    pub async fn run(&self) {
        info!(period_secs = self.period.as_secs(), "Starting node lifecycle controller");
        let mut ticker = reconcile_ticker(self.period);
        loop {
            ticker.tick().await;
            if let Err(e) = self.reconcile_all().await {
                error!(error = %e, "Failed to list nodes");
            }
        }
    }

    async fn reconcile_all(&self) -> kube::Result<()> {
        let nodes = self.nodes.list(&ListParams::default()).await?;
        debug!(count = nodes.items.len(), "Reconciling nodes");

        futures::stream::iter(nodes.items)
            .for_each_concurrent(CONCURRENCY, |node| async move {
                self.reconcile(&node).await;
            })
            .await;
        Ok(())
    }

    async fn reconcile(&self, node: &Node) {
        let Some(name) = node.metadata.name.as_deref() else {
            return;
        };
        let action = plan_node(self.instances.as_ref(), node).await;
        if let Err(e) = self.apply(name, action).await {
            error!(node = name, error = %e, "Failed to update node");
        }
    }

    async fn apply(&self, name: &str, action: NodeAction) -> kube::Result<()> {
        match action {
            NodeAction::Skip => Ok(()),
            NodeAction::Delete => match self.nodes.delete(name, &DeleteParams::default()).await {
                Ok(_) => {
                    info!(node = name, "Deleted node");
                    Ok(())
                }
                Err(kube::Error::Api(e)) if e.code == 404 => {
                    debug!(node = name, "Node already deleted");
                    Ok(())
                }
                Err(e) => Err(e),
            },
            NodeAction::Update(update) => {
                let params = PatchParams::default();
                if let Some(patch) = update.spec_patch() {
                    match self.nodes.patch(name, &params, &Patch::Merge(&patch)).await {
                        Ok(_) => {}
                        Err(kube::Error::Api(e)) if e.code == 409 => {
                            debug!(node = name, "Node changed since listed, retrying next period");
                            return Ok(());
                        }
                        Err(e) => return Err(e),
                    }
                }
                if let Some(patch) = update.status_patch() {
                    self.nodes
                        .patch_status(name, &params, &Patch::Merge(&patch))
                        .await?;
                }
                info!(
                    node = name,
                    provider_id = ?update.provider_id,
                    addresses = update.addresses.as_ref().map(Vec::len),
                    taints_changed = update.taints.is_some(),
                    "Updated node"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{NodeSpec, NodeStatus};
    use kube::api::ObjectMeta;
    use txcloud_ccm_api::MockCloudApi;
    use txcloud_ccm_core::{InstanceDescriptor, InstanceState};
    use txcloud_ccm_provider::InstanceResolver;

    const PROVIDER_ID: &str = "tencentcloud://ap-guangzhou-3/ins-1";

    fn instance(state: InstanceState) -> InstanceDescriptor {
        InstanceDescriptor {
            instance_id: "ins-1".to_string(),
            zone: "ap-guangzhou-3".to_string(),
            instance_type: "S5.MEDIUM4".to_string(),
            instance_state: state,
            vpc_id: "vpc-a".to_string(),
            private_ips: vec!["10.0.0.5".to_string()],
            public_ips: vec!["1.2.3.4".to_string()],
        }
    }

    fn node(provider_id: Option<&str>, taints: Option<Vec<Taint>>) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some("10.0.0.5".to_string()),
                resource_version: Some("12".to_string()),
                ..ObjectMeta::default()
            },
            spec: Some(NodeSpec {
                provider_id: provider_id.map(ToString::to_string),
                taints,
                ..NodeSpec::default()
            }),
            status: None,
        }
    }

    fn k8s_address(kind: &str, address: &str) -> NodeAddress {
        NodeAddress {
            address: address.to_string(),
            type_: kind.to_string(),
        }
    }

    fn shutdown_taint() -> Taint {
        Taint {
            key: SHUTDOWN_TAINT_KEY.to_string(),
            effect: "NoSchedule".to_string(),
            ..Taint::default()
        }
    }

    fn resolver(api: &Arc<MockCloudApi>) -> InstanceResolver {
        InstanceResolver::new(api.clone(), "vpc-a")
    }

    #[tokio::test]
    async fn new_node_gets_provider_id_and_addresses() {
        let api = Arc::new(MockCloudApi::new());
        api.add_instance(instance(InstanceState::Running));

        let action = plan_node(&resolver(&api), &node(None, None)).await;
        assert_eq!(
            action,
            NodeAction::Update(NodeUpdate {
                provider_id: Some(PROVIDER_ID.to_string()),
                addresses: Some(vec![
                    k8s_address("InternalIP", "10.0.0.5"),
                    k8s_address("ExternalIP", "1.2.3.4"),
                ]),
                taints: None,
                resource_version: Some("12".to_string()),
            })
        );
    }

    #[tokio::test]
    async fn missing_instance_deletes_node() {
        let api = Arc::new(MockCloudApi::new());
        let action = plan_node(&resolver(&api), &node(Some(PROVIDER_ID), None)).await;
        assert_eq!(action, NodeAction::Delete);
    }

    #[tokio::test]
    async fn cloud_outage_leaves_node_alone() {
        let api = Arc::new(MockCloudApi::new());
        api.add_instance(instance(InstanceState::Running));
        api.fail_with("InternalError", "service unavailable");

        let action = plan_node(&resolver(&api), &node(Some(PROVIDER_ID), None)).await;
        assert_eq!(action, NodeAction::Skip);
    }

    #[tokio::test]
    async fn unresolvable_name_is_not_deleted() {
        let api = Arc::new(MockCloudApi::new());
        let action = plan_node(&resolver(&api), &node(None, None)).await;
        assert_eq!(action, NodeAction::Skip);
    }

    #[tokio::test]
    async fn stopped_instance_is_tainted() {
        let api = Arc::new(MockCloudApi::new());
        api.add_instance(instance(InstanceState::Stopped));

        let action = plan_node(&resolver(&api), &node(Some(PROVIDER_ID), None)).await;
        let NodeAction::Update(update) = action else {
            panic!("expected update, got {action:?}");
        };
        assert_eq!(update.taints, Some(vec![shutdown_taint()]));
        assert!(update.provider_id.is_none());
        assert_eq!(
            update.spec_patch().unwrap()["metadata"]["resourceVersion"],
            "12"
        );
    }

    #[tokio::test]
    async fn up_to_date_node_is_skipped() {
        let api = Arc::new(MockCloudApi::new());
        api.add_instance(instance(InstanceState::Running));

        let mut current = node(Some(PROVIDER_ID), None);
        current.status = Some(NodeStatus {
            addresses: Some(vec![
                k8s_address("InternalIP", "10.0.0.5"),
                k8s_address("ExternalIP", "1.2.3.4"),
            ]),
            ..NodeStatus::default()
        });

        assert_eq!(plan_node(&resolver(&api), &current).await, NodeAction::Skip);
    }

    #[tokio::test]
    async fn overrunning_pass_delays_next_tick() {
        let ticker = reconcile_ticker(Duration::from_secs(30));
        assert_eq!(ticker.missed_tick_behavior(), MissedTickBehavior::Delay);
        assert_eq!(ticker.period(), Duration::from_secs(30));
    }

    #[test]
    fn taint_added_and_removed() {
        let other = Taint {
            key: "dedicated".to_string(),
            effect: "NoExecute".to_string(),
            value: Some("gpu".to_string()),
            ..Taint::default()
        };

        let added = reconcile_shutdown_taint(&[other.clone()], true).unwrap();
        assert_eq!(added, vec![other.clone(), shutdown_taint()]);

        assert!(reconcile_shutdown_taint(&added, true).is_none());

        let removed = reconcile_shutdown_taint(&added, false).unwrap();
        assert_eq!(removed, vec![other.clone()]);

        assert!(reconcile_shutdown_taint(&[other], false).is_none());
    }

    #[test]
    fn patches() {
        let update = NodeUpdate {
            provider_id: Some(PROVIDER_ID.to_string()),
            addresses: Some(vec![k8s_address("InternalIP", "10.0.0.5")]),
            taints: None,
            resource_version: None,
        };
        assert_eq!(
            update.spec_patch(),
            Some(json!({ "spec": { "providerID": PROVIDER_ID } }))
        );
        assert_eq!(
            update.status_patch(),
            Some(json!({
                "status": { "addresses": [{ "address": "10.0.0.5", "type": "InternalIP" }] }
            }))
        );

        let tainted = NodeUpdate {
            taints: Some(vec![shutdown_taint()]),
            resource_version: Some("4711".to_string()),
            ..NodeUpdate::default()
        };
        assert_eq!(
            tainted.spec_patch(),
            Some(json!({
                "metadata": { "resourceVersion": "4711" },
                "spec": {
                    "taints": [{ "key": SHUTDOWN_TAINT_KEY, "effect": "NoSchedule" }]
                }
            }))
        );
        assert!(tainted.status_patch().is_none());

        let empty = NodeUpdate::default();
        assert!(empty.is_empty());
        assert!(empty.spec_patch().is_none());
        assert!(empty.status_patch().is_none());
    }
}
