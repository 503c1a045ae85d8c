//! Tencent Cloud provider for Kubernetes.
//!
//! This crate answers the questions a cloud controller manager asks about
//! nodes and pod routes:
//!
//! - [`InstanceResolver`] maps node names (private IPs) and provider IDs to
//!   CVM instances inside the configured VPC
//! - [`RouteTranslator`] lists, creates and deletes entries in the cluster
//!   route table
//! - [`TencentCloud`] wires both onto one [`CloudApi`](txcloud_ccm_api::CloudApi)
//!   client and exposes them through a [`CapabilityTable`]
//!
//! # Errors
//!
//! [`CcmError::NotFound`] is a definitive statement that the instance is gone
//! and is what makes the orchestrator delete a Node. A failed API call is
//! always [`CcmError::ExternalService`], never `NotFound`.
//!
//! # Example
//!
//! ```no_run
//! use txcloud_ccm_provider::{CloudConfig, TencentCloud};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CloudConfig::load(None)?;
//! let cloud = TencentCloud::from_config(config)?;
//!
//! if let Some(instances) = cloud.capabilities().instances() {
//!     let provider_id = instances.instance_id("10.0.0.5").await?;
//!     println!("{provider_id}");
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod addresses;
pub mod capability;
pub mod cloud;
pub mod config;
pub mod error;
pub mod instances;
pub mod routes;

pub use addresses::{to_address_list, to_k8s_addresses};
pub use capability::{Capability, CapabilityTable, Instances, Routes};
pub use cloud::TencentCloud;
pub use config::CloudConfig;
pub use error::{CcmError, Result};
pub use instances::InstanceResolver;
pub use routes::RouteTranslator;
