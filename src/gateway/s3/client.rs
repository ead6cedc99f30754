//! S3 client creation and per-request SSE-C headers

use crate::config::GatewayConfig;
use crate::error::StorageResult;
use crate::gateway::{RequestParams, SseCustomerKey};
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::Client;
use log::debug;
use std::collections::HashMap;

/// Build a client from `config`. Static keys when configured, otherwise the
/// SDK default provider chain (env, profile, IMDS) resolves credentials.
pub(crate) async fn create_s3_client(config: &GatewayConfig) -> StorageResult<Client> {
    let region = Region::new(config.region.clone());

    let mut builder = match config.static_credentials()? {
        Some((access_key_id, secret_access_key)) => {
            let credentials = Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "s3-agent-tools",
            );
            S3ConfigBuilder::new()
                .credentials_provider(credentials)
                .region(region)
        }
        None => {
            debug!("s3_client: no static keys, using default provider chain");
            let sdk_config = aws_config::defaults(BehaviorVersion::latest())
                .region(region)
                .load()
                .await;
            S3ConfigBuilder::from(&sdk_config)
        }
    };

    if let Some(endpoint_url) = config.endpoint_url.as_deref() {
        builder = builder.endpoint_url(endpoint_url);
    }

    if config.force_path_style {
        builder = builder.force_path_style(true);
    }

    Ok(Client::from_conf(builder.build()))
}

/// SSE-C header values; all `None` when the request carries no key.
pub(super) struct SseHeaders {
    pub algorithm: Option<String>,
    pub key: Option<String>,
    pub key_md5: Option<String>,
}

impl SseHeaders {
    pub fn from_params(params: &RequestParams) -> Self {
        let key = params.encryption_key.as_ref();
        Self {
            algorithm: key.map(|_| SseCustomerKey::ALGORITHM.to_string()),
            key: key.map(SseCustomerKey::key_base64),
            key_md5: key.map(SseCustomerKey::key_md5_base64),
        }
    }
}

pub(super) fn metadata_of(params: &RequestParams) -> Option<HashMap<String, String>> {
    if params.metadata.is_empty() {
        None
    } else {
        Some(params.metadata.clone())
    }
}
