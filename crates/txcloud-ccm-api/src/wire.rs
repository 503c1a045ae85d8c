//! JSON shapes of the Tencent Cloud API 3.0 actions used by the provider.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use txcloud_ccm_core::{InstanceDescriptor, InstanceState, RouteEntry};

use crate::error::{ApiError, Result};

/// Maximum page size accepted by `DescribeInstances`.
pub const DESCRIBE_INSTANCES_LIMIT: u32 = 100;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Filter<'a> {
    pub name: &'a str,
    pub values: [&'a str; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeInstancesRequest<'a> {
    pub filters: [Filter<'a>; 1],
    pub limit: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeInstancesResponse {
    pub instance_set: Vec<Instance>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Instance {
    pub instance_id: String,
    pub instance_type: String,
    pub instance_state: String,
    pub placement: Option<Placement>,
    pub virtual_private_cloud: Option<VirtualPrivateCloud>,
    pub private_ip_addresses: Option<Vec<String>>,
    pub public_ip_addresses: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Placement {
    pub zone: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VirtualPrivateCloud {
    pub vpc_id: String,
}

impl From<Instance> for InstanceDescriptor {
    fn from(instance: Instance) -> Self {
        Self {
            instance_id: instance.instance_id,
            zone: instance.placement.map(|p| p.zone).unwrap_or_default(),
            instance_type: instance.instance_type,
            instance_state: InstanceState::from_api_state(&instance.instance_state),
            vpc_id: instance
                .virtual_private_cloud
                .map(|v| v.vpc_id)
                .unwrap_or_default(),
            private_ips: instance.private_ip_addresses.unwrap_or_default(),
            public_ips: instance.public_ip_addresses.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeClusterRoutesRequest<'a> {
    pub route_table_name: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeClusterRoutesResponse {
    pub route_set: Option<Vec<RouteInfo>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RouteInfo {
    pub gateway_ip: String,
    pub destination_cidr_block: String,
}

impl From<RouteInfo> for RouteEntry {
    fn from(route: RouteInfo) -> Self {
        Self {
            gateway_ip: route.gateway_ip,
            destination_cidr: route.destination_cidr_block,
        }
    }
}

/// Body of `CreateClusterRoute` and `DeleteClusterRoute`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClusterRouteRequest<'a> {
    pub route_table_name: &'a str,
    pub gateway_ip: &'a str,
    pub destination_cidr_block: &'a str,
}

/// Response of actions that only return a `RequestId`.
#[derive(Debug, Default, Deserialize)]
pub struct Empty {}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Response")]
    response: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct RemoteError {
    code: String,
    message: String,
}

/// Decode a response body, turning an `Error` envelope into [`ApiError::Remote`].
pub fn decode_response<T: DeserializeOwned>(
    action: &'static str,
    status: u16,
    body: &str,
) -> Result<T> {
    let success = (200..300).contains(&status);

    let envelope: Envelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(_) if !success => return Err(ApiError::Http { action, status }),
        Err(e) => {
            return Err(ApiError::Decode {
                action,
                reason: e.to_string(),
            })
        }
    };
    let mut response = envelope.response;

    if let Some(error) = response.remove("Error") {
        let error: RemoteError = serde_json::from_value(error).unwrap_or_default();
        let request_id = response
            .get("RequestId")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(ApiError::remote(action, error.code, error.message, request_id));
    }

    if !success {
        return Err(ApiError::Http { action, status });
    }

    serde_json::from_value(Value::Object(response)).map_err(|e| ApiError::Decode {
        action,
        reason: e.to_string(),
    })
}
