//! Tencent Cloud API client for the txcloud cloud controller manager.
//!
//! This crate provides the [`CloudApi`] trait consumed by the provider and the
//! [`HttpCloudApi`] implementation talking to Tencent Cloud API 3.0:
//!
//! - CVM `DescribeInstances` with a single server-side filter
//! - TKE `DescribeClusterRoutes`, `CreateClusterRoute` and `DeleteClusterRoute`
//! - TC3-HMAC-SHA256 request signing
//!
//! Every failure of a remote call is an [`ApiError`]; the client never decides
//! whether a resource exists.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use txcloud_ccm_api::{ApiSettings, CloudApi, Credential, HttpCloudApi, InstanceFilter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = HttpCloudApi::new(ApiSettings {
//!     region: "ap-guangzhou".to_string(),
//!     credential: Credential::new("AKID...", "..."),
//!     endpoint: None,
//!     request_timeout: Duration::from_secs(10),
//! })?;
//!
//! let instances = api
//!     .query_instances(&InstanceFilter::PrivateIpAddress("10.0.0.5".to_string()))
//!     .await?;
//! println!("{} instance(s)", instances.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! Enable the `test-utils` feature for [`MockCloudApi`], an in-memory stand-in
//! that records every call.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod error;
pub mod http;
pub mod signing;
mod wire;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use client::{CloudApi, InstanceFilter};
pub use error::{ApiError, Result};
pub use http::{ApiSettings, HttpCloudApi, Service};
pub use signing::Credential;

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockCall, MockCloudApi};
