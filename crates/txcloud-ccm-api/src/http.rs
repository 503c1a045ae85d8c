//! HTTP implementation of [`CloudApi`] against Tencent Cloud API 3.0.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use txcloud_ccm_core::{InstanceDescriptor, RouteEntry};

use crate::client::{CloudApi, InstanceFilter};
use crate::error::{ApiError, Result};
use crate::signing::{self, Credential, CONTENT_TYPE};
use crate::wire::{
    self, ClusterRouteRequest, DescribeClusterRoutesRequest, DescribeClusterRoutesResponse,
    DescribeInstancesRequest, DescribeInstancesResponse, Empty, Filter,
};

/// Public endpoint domain; each product is served from `<service>.<domain>`.
const DEFAULT_DOMAIN: &str = "tencentcloudapi.com";

/// Tencent Cloud products called by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Cloud Virtual Machine.
    Cvm,
    /// Tencent Kubernetes Engine.
    Tke,
}

impl Service {
    /// Service name used in host names and the signing scope.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Cvm => "cvm",
            Self::Tke => "tke",
        }
    }

    /// API version sent in `X-TC-Version`.
    #[must_use]
    pub const fn version(&self) -> &'static str {
        match self {
            Self::Cvm => "2017-03-12",
            Self::Tke => "2018-05-25",
        }
    }
}

/// Connection settings for [`HttpCloudApi`].
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Region sent in `X-TC-Region`, e.g. `ap-guangzhou`.
    pub region: String,
    /// API key pair.
    pub credential: Credential,
    /// Base URL used for every service instead of `https://<service>.tencentcloudapi.com`.
    pub endpoint: Option<String>,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

/// Signed JSON client for the CVM and TKE APIs.
#[derive(Debug, Clone)]
pub struct HttpCloudApi {
    client: reqwest::Client,
    settings: ApiSettings,
}

impl HttpCloudApi {
    /// Create a client with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: ApiSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self { client, settings })
    }

    /// Create a client on top of an existing reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, settings: ApiSettings) -> Self {
        Self { client, settings }
    }

    /// The region requests are sent to.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.settings.region
    }

    /// URL requests for `service` are posted to.
    #[must_use]
    pub fn service_url(&self, service: Service) -> String {
        match &self.settings.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://{}.{DEFAULT_DOMAIN}/", service.name()),
        }
    }

    async fn call<Req, Resp>(
        &self,
        service: Service,
        action: &'static str,
        request: &Req,
    ) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = self.service_url(service);
        let url = reqwest::Url::parse(&url)
            .map_err(|e| ApiError::InvalidEndpoint(format!("{url}: {e}")))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(ApiError::InvalidEndpoint(format!("{url}: missing host"))),
        };

        let payload = serde_json::to_string(request)?;
        let timestamp = Utc::now().timestamp();
        let authorization = signing::authorization(
            &self.settings.credential,
            service.name(),
            &host,
            timestamp,
            &payload,
        );

        debug!(
            service = service.name(),
            action,
            region = %self.settings.region,
            "Calling cloud API"
        );

        let response = self
            .client
            .post(url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .header("X-TC-Action", action)
            .header("X-TC-Version", service.version())
            .header("X-TC-Region", &self.settings.region)
            .header("X-TC-Timestamp", timestamp.to_string())
            .body(payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        wire::decode_response(action, status, &body).inspect_err(|e| {
            debug!(action, error = %e, "Cloud API call failed");
        })
    }
}

#[async_trait]
impl CloudApi for HttpCloudApi {
    async fn query_instances(&self, filter: &InstanceFilter) -> Result<Vec<InstanceDescriptor>> {
        let request = DescribeInstancesRequest {
            filters: [Filter {
                name: filter.name(),
                values: [filter.value()],
            }],
            limit: wire::DESCRIBE_INSTANCES_LIMIT,
        };

        let response: DescribeInstancesResponse = self
            .call(Service::Cvm, "DescribeInstances", &request)
            .await?;

        Ok(response
            .instance_set
            .into_iter()
            .map(InstanceDescriptor::from)
            .collect())
    }

    async fn describe_routes(&self, route_table: &str) -> Result<Vec<RouteEntry>> {
        let request = DescribeClusterRoutesRequest {
            route_table_name: route_table,
        };

        let response: DescribeClusterRoutesResponse = self
            .call(Service::Tke, "DescribeClusterRoutes", &request)
            .await?;

        Ok(response
            .route_set
            .unwrap_or_default()
            .into_iter()
            .map(RouteEntry::from)
            .collect())
    }

    async fn create_route(&self, route_table: &str, route: &RouteEntry) -> Result<()> {
        let request = ClusterRouteRequest {
            route_table_name: route_table,
            gateway_ip: &route.gateway_ip,
            destination_cidr_block: &route.destination_cidr,
        };

        let _: Empty = self
            .call(Service::Tke, "CreateClusterRoute", &request)
            .await?;
        Ok(())
    }

    async fn delete_route(&self, route_table: &str, route: &RouteEntry) -> Result<()> {
        let request = ClusterRouteRequest {
            route_table_name: route_table,
            gateway_ip: &route.gateway_ip,
            destination_cidr_block: &route.destination_cidr,
        };

        let _: Empty = self
            .call(Service::Tke, "DeleteClusterRoute", &request)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(endpoint: Option<String>) -> ApiSettings {
        ApiSettings {
            region: "ap-guangzhou".to_string(),
            credential: Credential::new("AKIDtest", "secret"),
            endpoint,
            request_timeout: Duration::from_secs(5),
        }
    }

    fn client_for(server: &MockServer) -> HttpCloudApi {
        HttpCloudApi::new(settings(Some(format!("{}/", server.uri())))).unwrap()
    }

    #[test]
    fn default_service_urls() {
        let api = HttpCloudApi::new(settings(None)).unwrap();
        assert_eq!(api.service_url(Service::Cvm), "https://cvm.tencentcloudapi.com/");
        assert_eq!(api.service_url(Service::Tke), "https://tke.tencentcloudapi.com/");
        assert_eq!(api.region(), "ap-guangzhou");
    }

    #[tokio::test]
    async fn query_instances_sends_signed_filter() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("X-TC-Action", "DescribeInstances"))
            .and(header("X-TC-Version", "2017-03-12"))
            .and(header("X-TC-Region", "ap-guangzhou"))
            .and(header_regex(
                "Authorization",
                r"^TC3-HMAC-SHA256 Credential=AKIDtest/\d{4}-\d{2}-\d{2}/cvm/tc3_request, SignedHeaders=content-type;host, Signature=[0-9a-f]{64}$",
            ))
            .and(body_json(json!({
                "Filters": [{"Name": "private-ip-address", "Values": ["10.0.0.5"]}],
                "Limit": 100
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Response": {
                    "TotalCount": 2,
                    "InstanceSet": [
                        {
                            "InstanceId": "ins-b",
                            "InstanceType": "S5.SMALL2",
                            "InstanceState": "RUNNING",
                            "Placement": {"Zone": "ap-guangzhou-3"},
                            "VirtualPrivateCloud": {"VpcId": "vpc-b"},
                            "PrivateIpAddresses": ["10.0.0.5"],
                            "PublicIpAddresses": []
                        },
                        {
                            "InstanceId": "ins-a",
                            "InstanceType": "S5.MEDIUM4",
                            "InstanceState": "RUNNING",
                            "Placement": {"Zone": "ap-guangzhou-4"},
                            "VirtualPrivateCloud": {"VpcId": "vpc-a"},
                            "PrivateIpAddresses": ["10.0.0.5"],
                            "PublicIpAddresses": ["1.2.3.4"]
                        }
                    ],
                    "RequestId": "req-1"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = client_for(&server);
        let instances = api
            .query_instances(&InstanceFilter::PrivateIpAddress("10.0.0.5".to_string()))
            .await
            .unwrap();

        let ids: Vec<_> = instances.iter().map(|i| i.instance_id.as_str()).collect();
        assert_eq!(ids, vec!["ins-b", "ins-a"]);
        assert_eq!(instances[1].public_ips, vec!["1.2.3.4".to_string()]);
    }

    #[tokio::test]
    async fn describe_routes_maps_records_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeClusterRoutes"))
            .and(header("X-TC-Version", "2018-05-25"))
            .and(body_json(json!({"RouteTableName": "cls-routes"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Response": {
                    "TotalCount": 2,
                    "RouteSet": [
                        {"RouteTableName": "cls-routes", "GatewayIp": "10.0.0.5", "DestinationCidrBlock": "172.16.0.0/26"},
                        {"RouteTableName": "cls-routes", "GatewayIp": "10.0.0.6", "DestinationCidrBlock": "172.16.0.64/26"}
                    ],
                    "RequestId": "req-2"
                }
            })))
            .mount(&server)
            .await;

        let api = client_for(&server);
        let routes = api.describe_routes("cls-routes").await.unwrap();
        assert_eq!(
            routes,
            vec![
                RouteEntry::new("10.0.0.5", "172.16.0.0/26"),
                RouteEntry::new("10.0.0.6", "172.16.0.64/26"),
            ]
        );
    }

    #[tokio::test]
    async fn create_and_delete_route_bodies() {
        let server = MockServer::start().await;
        let body = json!({
            "RouteTableName": "cls-routes",
            "GatewayIp": "203.0.113.5",
            "DestinationCidrBlock": "10.1.0.0/24"
        });
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "CreateClusterRoute"))
            .and(body_json(body.clone()))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"Response": {"RequestId": "req-3"}})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DeleteClusterRoute"))
            .and(body_json(body))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"Response": {"RequestId": "req-4"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = client_for(&server);
        let route = RouteEntry::new("203.0.113.5", "10.1.0.0/24");
        api.create_route("cls-routes", &route).await.unwrap();
        api.delete_route("cls-routes", &route).await.unwrap();
    }

    #[tokio::test]
    async fn remote_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Response": {
                    "Error": {"Code": "ResourceNotFound", "Message": "route not found"},
                    "RequestId": "req-5"
                }
            })))
            .mount(&server)
            .await;

        let api = client_for(&server);
        let err = api
            .delete_route("cls-routes", &RouteEntry::new("10.0.0.9", "10.9.0.0/24"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("ResourceNotFound"));
        assert!(matches!(
            err,
            ApiError::Remote {
                action: "DeleteClusterRoute",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn server_error_without_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let api = client_for(&server);
        let err = api.describe_routes("cls-routes").await.unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 503, .. }));
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let api = HttpCloudApi::new(settings(Some(format!("{uri}/")))).unwrap();
        let err = api
            .query_instances(&InstanceFilter::InstanceId("ins-1".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[tokio::test]
    async fn invalid_endpoint_is_rejected() {
        let api = HttpCloudApi::new(settings(Some("not a url".to_string()))).unwrap();
        let err = api.describe_routes("cls-routes").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidEndpoint(_)));
    }
}
