//! Node address list construction.

use k8s_openapi::api::core::v1::NodeAddress as K8sNodeAddress;
use txcloud_ccm_core::{InstanceDescriptor, NodeAddress};

/// Build the address list reported for a node backed by `instance`.
///
/// Private IPs come first as `InternalIP`, then public IPs as `ExternalIP`,
/// each in inventory order. Nothing is deduplicated or filtered, and an
/// instance without addresses yields an empty list.
#[must_use]
pub fn to_address_list(instance: &InstanceDescriptor) -> Vec<NodeAddress> {
    let mut addresses = Vec::with_capacity(instance.private_ips.len() + instance.public_ips.len());
    addresses.extend(instance.private_ips.iter().map(NodeAddress::internal));
    addresses.extend(instance.public_ips.iter().map(NodeAddress::external));
    addresses
}

/// Convert addresses into the Kubernetes `NodeAddress` type, keeping order.
#[must_use]
pub fn to_k8s_addresses(addresses: &[NodeAddress]) -> Vec<K8sNodeAddress> {
    addresses
        .iter()
        .map(|a| K8sNodeAddress {
            address: a.address.clone(),
            type_: a.kind.as_str().to_string(),
        })
        .collect()
}
