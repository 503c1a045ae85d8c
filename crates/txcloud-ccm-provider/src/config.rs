//! Cloud configuration.
//!
//! The configuration is a JSON document (the `--cloud-config` file). Every field
//! left empty in the document falls back to an environment variable:
//!
//! | Field                 | Environment variable                                        |
//! |-----------------------|-------------------------------------------------------------|
//! | `region`              | `TENCENTCLOUD_CLOUD_CONTROLLER_MANAGER_REGION`              |
//! | `vpc_id`              | `TENCENTCLOUD_CLOUD_CONTROLLER_MANAGER_VPC_ID`              |
//! | `secret_id`           | `TENCENTCLOUD_CLOUD_CONTROLLER_MANAGER_SECRET_ID`           |
//! | `secret_key`          | `TENCENTCLOUD_CLOUD_CONTROLLER_MANAGER_SECRET_KEY`          |
//! | `cluster_route_table` | `TENCENTCLOUD_CLOUD_CONTROLLER_MANAGER_CLUSTER_ROUTE_TABLE` |

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use txcloud_ccm_api::{ApiSettings, Credential};

use crate::error::{CcmError, Result};

const ENV_PREFIX: &str = "TENCENTCLOUD_CLOUD_CONTROLLER_MANAGER_";

/// Configuration of the Tencent Cloud provider.
#[derive(Clone, Deserialize)]
pub struct CloudConfig {
    /// API region, e.g. `ap-guangzhou`.
    #[serde(default)]
    pub region: String,

    /// VPC whose instances this provider manages.
    #[serde(default)]
    pub vpc_id: String,

    /// API `SecretId`.
    #[serde(default)]
    pub secret_id: String,

    /// API `SecretKey`.
    #[serde(default)]
    pub secret_key: String,

    /// Name of the TKE cluster route table holding pod CIDR routes.
    #[serde(default)]
    pub cluster_route_table: String,

    /// Base URL replacing `https://<service>.tencentcloudapi.com`.
    #[serde(default)]
    pub api_endpoint: Option<String>,

    /// Timeout for a single API request, in seconds.
    #[serde(default = "CloudConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl CloudConfig {
    const fn default_request_timeout() -> u64 {
        10
    }

    /// Parse a JSON configuration document without applying environment fallbacks.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON for this type.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CcmError::Config(format!("invalid cloud config: {e}")))
    }

    /// Read a JSON configuration document and apply environment fallbacks.
    ///
    /// `None` means no document was supplied; only the environment is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader fails or the document is invalid.
    pub fn from_reader(reader: Option<impl Read>) -> Result<Self> {
        let mut config = match reader {
            Some(mut reader) => {
                let mut json = String::new();
                reader
                    .read_to_string(&mut json)
                    .map_err(|e| CcmError::Config(format!("failed to read cloud config: {e}")))?;
                Self::from_json(&json)?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Load the configuration file at `path`, if any, and apply environment fallbacks.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = path
            .map(|p| {
                std::fs::File::open(p).map_err(|e| {
                    CcmError::Config(format!("failed to open {}: {e}", p.display()))
                })
            })
            .transpose()?;
        Self::from_reader(file)
    }

    /// Fill empty fields from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Fill empty fields using `lookup` to resolve environment variable names.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let fields: [(&mut String, &str); 5] = [
            (&mut self.region, "REGION"),
            (&mut self.vpc_id, "VPC_ID"),
            (&mut self.secret_id, "SECRET_ID"),
            (&mut self.secret_key, "SECRET_KEY"),
            (&mut self.cluster_route_table, "CLUSTER_ROUTE_TABLE"),
        ];
        for (field, suffix) in fields {
            if field.is_empty() {
                if let Some(value) = lookup(&format!("{ENV_PREFIX}{suffix}")) {
                    *field = value;
                }
            }
        }
    }

    /// Check that everything needed to talk to the API is present.
    ///
    /// An empty `cluster_route_table` is accepted; route calls then fail remotely.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error naming the first missing field.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("region", &self.region),
            ("vpc_id", &self.vpc_id),
            ("secret_id", &self.secret_id),
            ("secret_key", &self.secret_key),
        ];
        for (name, value) in required {
            if value.is_empty() {
                return Err(CcmError::Config(format!("{name} is required")));
            }
        }
        if self.request_timeout_seconds == 0 {
            return Err(CcmError::Config(
                "request_timeout_seconds must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Connection settings for the HTTP cloud API client.
    #[must_use]
    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            region: self.region.clone(),
            credential: Credential::new(&self.secret_id, &self.secret_key),
            endpoint: self.api_endpoint.clone(),
            request_timeout: self.request_timeout(),
        }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            region: String::new(),
            vpc_id: String::new(),
            secret_id: String::new(),
            secret_key: String::new(),
            cluster_route_table: String::new(),
            api_endpoint: None,
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

impl fmt::Debug for CloudConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudConfig")
            .field("region", &self.region)
            .field("vpc_id", &self.vpc_id)
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"<redacted>")
            .field("cluster_route_table", &self.cluster_route_table)
            .field("api_endpoint", &self.api_endpoint)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn full_json() -> &'static str {
        r#"{
            "region": "ap-guangzhou",
            "vpc_id": "vpc-a",
            "secret_id": "AKIDtest",
            "secret_key": "secret",
            "cluster_route_table": "cls-routes"
        }"#
    }

    #[test]
    fn parse_full_document() {
        let config = CloudConfig::from_json(full_json()).unwrap();
        assert_eq!(config.region, "ap-guangzhou");
        assert_eq!(config.vpc_id, "vpc-a");
        assert_eq!(config.cluster_route_table, "cls-routes");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert!(config.api_endpoint.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn env_fills_only_empty_fields() {
        let mut config = CloudConfig::from_json(r#"{"region": "ap-shanghai"}"#).unwrap();
        let env: HashMap<String, String> = [
            ("TENCENTCLOUD_CLOUD_CONTROLLER_MANAGER_REGION", "ap-beijing"),
            ("TENCENTCLOUD_CLOUD_CONTROLLER_MANAGER_VPC_ID", "vpc-env"),
            ("TENCENTCLOUD_CLOUD_CONTROLLER_MANAGER_SECRET_ID", "AKIDenv"),
            ("TENCENTCLOUD_CLOUD_CONTROLLER_MANAGER_SECRET_KEY", "env-secret"),
            ("TENCENTCLOUD_CLOUD_CONTROLLER_MANAGER_CLUSTER_ROUTE_TABLE", "rt-env"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        config.apply_env_with(|key| env.get(key).cloned());

        assert_eq!(config.region, "ap-shanghai");
        assert_eq!(config.vpc_id, "vpc-env");
        assert_eq!(config.secret_id, "AKIDenv");
        assert_eq!(config.secret_key, "env-secret");
        assert_eq!(config.cluster_route_table, "rt-env");
    }

    #[test]
    fn validate_reports_missing_field() {
        let config = CloudConfig::from_json(r#"{"region": "ap-guangzhou"}"#).unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "configuration error: vpc_id is required");
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = CloudConfig::from_json(full_json()).unwrap();
        config.request_timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_json_is_config_error() {
        assert!(matches!(
            CloudConfig::from_json("{not json"),
            Err(CcmError::Config(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(full_json().as_bytes()).unwrap();

        let config = CloudConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.secret_id, "AKIDtest");
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = CloudConfig::load(Some(&dir.path().join("absent.json"))).unwrap_err();
        assert!(matches!(err, CcmError::Config(_)));
    }

    #[test]
    fn debug_redacts_secret_key() {
        let config = CloudConfig::from_json(full_json()).unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("AKIDtest"));
        assert!(!debug.contains("\"secret\""));
    }

    #[test]
    fn api_settings_carry_endpoint_and_timeout() {
        let mut config = CloudConfig::from_json(full_json()).unwrap();
        config.api_endpoint = Some("http://127.0.0.1:9000/".to_string());
        config.request_timeout_seconds = 3;

        let settings = config.api_settings();
        assert_eq!(settings.region, "ap-guangzhou");
        assert_eq!(settings.credential.secret_id(), "AKIDtest");
        assert_eq!(settings.endpoint.as_deref(), Some("http://127.0.0.1:9000/"));
        assert_eq!(settings.request_timeout, Duration::from_secs(3));
    }
}
