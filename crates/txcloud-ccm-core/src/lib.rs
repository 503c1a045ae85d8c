//! Core types and utilities for txcloud-ccm.
//!
//! This crate provides the foundational types shared by the cloud API client,
//! the provider and the controller binary:
//!
//! - **Provider IDs**: the `tencentcloud://<zone>/<instance-id>` node identity
//! - **Instances**: the VPC-scoped view of a CVM instance
//! - **Routes**: gateway-IP to CIDR entries of a cluster route table
//! - **Node addresses**: the ordered, typed address list reported for a node
//!
//! # Example
//!
//! ```
//! use txcloud_ccm_core::ProviderId;
//!
//! let id = ProviderId::new("ap-guangzhou-3", "ins-abcd1234").unwrap();
//! assert_eq!(id.to_string(), "tencentcloud://ap-guangzhou-3/ins-abcd1234");
//!
//! let parsed: ProviderId = "tencentcloud://ap-guangzhou-3/ins-abcd1234".parse().unwrap();
//! assert_eq!(parsed.instance_id(), "ins-abcd1234");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod provider_id;
pub mod types;

pub use provider_id::{IdError, ProviderId, PROVIDER_NAME};
pub use types::{
    InstanceDescriptor, InstanceState, NodeAddress, NodeAddressType, RouteEntry,
};
