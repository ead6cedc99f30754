//! Gateway configuration

use crate::error::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_REGION: &str = "eu-central-1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            access_key_id: None,
            secret_access_key: None,
            region: default_region(),
            endpoint_url: None,
            force_path_style: false,
        }
    }
}

impl GatewayConfig {
    /// Load from `AWS_ACCESS_KEY`, `AWS_SECRET_KEY`, `AWS_REGION`,
    /// `S3_ENDPOINT_URL` and `S3_FORCE_PATH_STYLE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            access_key_id: non_empty("AWS_ACCESS_KEY"),
            secret_access_key: non_empty("AWS_SECRET_KEY"),
            region: non_empty("AWS_REGION").unwrap_or_else(default_region),
            endpoint_url: non_empty("S3_ENDPOINT_URL"),
            force_path_style: non_empty("S3_FORCE_PATH_STYLE")
                .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }

    /// Copy of this config pointed at `region`; blank or absent keeps the current one.
    pub fn with_region(&self, region: Option<&str>) -> Self {
        let mut config = self.clone();
        if let Some(region) = region.map(str::trim).filter(|r| !r.is_empty()) {
            config.region = region.to_string();
        }
        config
    }

    /// Static key pair when both halves are set, `None` to defer to the SDK
    /// provider chain. A lone half is a configuration error.
    pub(crate) fn static_credentials(&self) -> StorageResult<Option<(&str, &str)>> {
        match (self.access_key_id.as_deref(), self.secret_access_key.as_deref()) {
            (Some(access), Some(secret)) => Ok(Some((access, secret))),
            (None, None) => Ok(None),
            _ => Err(StorageError::MissingParameter(
                "both the access key and the secret key must be provided".to_string(),
            )),
        }
    }
}
