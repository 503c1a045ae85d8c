//! A mock cloud API for testing without Tencent Cloud credentials.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use txcloud_ccm_core::{InstanceDescriptor, RouteEntry};

use crate::client::{CloudApi, InstanceFilter};
use crate::error::{ApiError, Result};

/// A call recorded by [`MockCloudApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `query_instances` with the given filter.
    QueryInstances(InstanceFilter),
    /// `describe_routes` on a table.
    DescribeRoutes(String),
    /// `create_route` on a table.
    CreateRoute(String, RouteEntry),
    /// `delete_route` on a table.
    DeleteRoute(String, RouteEntry),
}

/// An in-memory inventory and route table store.
///
/// Behaves like the remote service: instance queries ignore VPC boundaries,
/// duplicate routes are rejected with `ResourceInUse` and deleting a missing
/// route fails with `ResourceNotFound`.
#[derive(Default)]
pub struct MockCloudApi {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    instances: Vec<InstanceDescriptor>,
    tables: HashMap<String, Vec<RouteEntry>>,
    failure: Option<(String, String)>,
    calls: Vec<MockCall>,
}

impl MockCloudApi {
    /// Create an empty mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance to the inventory. Query results keep insertion order.
    pub fn add_instance(&self, instance: InstanceDescriptor) {
        self.state.lock().instances.push(instance);
    }

    /// Create an empty route table.
    pub fn add_route_table(&self, name: impl Into<String>) {
        self.state.lock().tables.entry(name.into()).or_default();
    }

    /// Insert a route without going through `create_route`.
    pub fn seed_route(&self, table: impl Into<String>, route: RouteEntry) {
        self.state
            .lock()
            .tables
            .entry(table.into())
            .or_default()
            .push(route);
    }

    /// Fail every following call with the given API error code and message.
    pub fn fail_with(&self, code: impl Into<String>, message: impl Into<String>) {
        self.state.lock().failure = Some((code.into(), message.into()));
    }

    /// Stop injecting failures.
    pub fn clear_failure(&self) {
        self.state.lock().failure = None;
    }

    /// Routes currently stored in `table`.
    #[must_use]
    pub fn routes(&self, table: &str) -> Vec<RouteEntry> {
        self.state
            .lock()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    /// Number of calls received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }
}

impl MockState {
    fn record(&mut self, action: &'static str, call: MockCall) -> Result<()> {
        self.calls.push(call);
        match &self.failure {
            Some((code, message)) => Err(ApiError::remote(action, code, message, "mock-request")),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CloudApi for MockCloudApi {
    async fn query_instances(&self, filter: &InstanceFilter) -> Result<Vec<InstanceDescriptor>> {
        let mut state = self.state.lock();
        state.record("DescribeInstances", MockCall::QueryInstances(filter.clone()))?;

        Ok(state
            .instances
            .iter()
            .filter(|instance| match filter {
                InstanceFilter::PrivateIpAddress(ip) => instance.has_private_ip(ip),
                InstanceFilter::InstanceId(id) => instance.instance_id == *id,
            })
            .cloned()
            .collect())
    }

    async fn describe_routes(&self, route_table: &str) -> Result<Vec<RouteEntry>> {
        let mut state = self.state.lock();
        state.record(
            "DescribeClusterRoutes",
            MockCall::DescribeRoutes(route_table.to_string()),
        )?;

        Ok(state.tables.get(route_table).cloned().unwrap_or_default())
    }

    async fn create_route(&self, route_table: &str, route: &RouteEntry) -> Result<()> {
        const ACTION: &str = "CreateClusterRoute";
        let mut state = self.state.lock();
        state.record(
            ACTION,
            MockCall::CreateRoute(route_table.to_string(), route.clone()),
        )?;

        let Some(table) = state.tables.get_mut(route_table) else {
            return Err(ApiError::remote(
                ACTION,
                "ResourceNotFound",
                format!("route table {route_table} not found"),
                "mock-request",
            ));
        };
        if table.contains(route) {
            return Err(ApiError::remote(
                ACTION,
                "ResourceInUse",
                format!("route {route} already exists"),
                "mock-request",
            ));
        }
        table.push(route.clone());
        Ok(())
    }

    async fn delete_route(&self, route_table: &str, route: &RouteEntry) -> Result<()> {
        const ACTION: &str = "DeleteClusterRoute";
        let mut state = self.state.lock();
        state.record(
            ACTION,
            MockCall::DeleteRoute(route_table.to_string(), route.clone()),
        )?;

        let position = state
            .tables
            .get(route_table)
            .and_then(|table| table.iter().position(|r| r == route));
        match position {
            Some(index) => {
                if let Some(table) = state.tables.get_mut(route_table) {
                    table.remove(index);
                }
                Ok(())
            }
            None => Err(ApiError::remote(
                ACTION,
                "ResourceNotFound",
                format!("route {route} not found"),
                "mock-request",
            )),
        }
    }
}
