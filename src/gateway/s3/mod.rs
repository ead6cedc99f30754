//! `aws-sdk-s3` backed gateway

mod client;
mod list;
mod objects;
mod presigned;
mod upload;

use super::{
    CompletedPartInfo, GatewayProvider, ObjectHead, RequestParams, StorageGateway,
    DEFAULT_WORKER_COUNT,
};
use crate::config::GatewayConfig;
use crate::error::StorageResult;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use log::info;
use std::sync::Arc;
use std::time::Duration;

pub(crate) use client::create_s3_client;

/// S3 rejects non-final parts below 5 MiB with EntityTooSmall.
const S3_MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct S3Gateway {
    client: Client,
    worker_count: usize,
}

impl S3Gateway {
    pub async fn connect(config: &GatewayConfig) -> StorageResult<Self> {
        let client = create_s3_client(config).await?;
        info!(
            "s3_gateway_connect: region={} endpoint={}",
            config.region,
            config.endpoint_url.as_deref().unwrap_or("default")
        );
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            worker_count: DEFAULT_WORKER_COUNT,
        }
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.max(1);
        self
    }
}

#[async_trait]
impl StorageGateway for S3Gateway {
    async fn head_bucket(&self, bucket: &str) -> StorageResult<()> {
        objects::head_bucket(&self.client, bucket).await
    }

    async fn create_bucket(&self, bucket: &str, region: &str) -> StorageResult<()> {
        objects::create_bucket(&self.client, bucket, region).await
    }

    async fn list_buckets(&self) -> StorageResult<Vec<String>> {
        list::list_buckets(&self.client).await
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<String>> {
        list::list_objects(&self.client, bucket, prefix).await
    }

    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        params: &RequestParams,
    ) -> StorageResult<ObjectHead> {
        objects::head_object(&self.client, bucket, key, params).await
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        params: &RequestParams,
    ) -> StorageResult<Vec<u8>> {
        objects::get_object(&self.client, bucket, key, None, params).await
    }

    async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end: u64,
        params: &RequestParams,
    ) -> StorageResult<Vec<u8>> {
        objects::get_object(&self.client, bucket, key, Some((start, end)), params).await
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        params: &RequestParams,
    ) -> StorageResult<()> {
        objects::put_object(&self.client, bucket, key, body, params).await
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        params: &RequestParams,
    ) -> StorageResult<String> {
        upload::create_multipart_upload(&self.client, bucket, key, params).await
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
        params: &RequestParams,
    ) -> StorageResult<String> {
        upload::upload_part(&self.client, bucket, key, upload_id, part_number, body, params).await
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPartInfo>,
        params: &RequestParams,
    ) -> StorageResult<()> {
        upload::complete_multipart_upload(&self.client, bucket, key, upload_id, parts, params).await
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StorageResult<()> {
        upload::abort_multipart_upload(&self.client, bucket, key, upload_id).await
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        objects::delete_object(&self.client, bucket, key).await
    }

    async fn generate_presigned_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        presigned::generate_presigned_url(&self.client, bucket, key, expires_in).await
    }

    fn worker_count(&self) -> usize {
        self.worker_count
    }

    fn min_part_size(&self) -> u64 {
        S3_MIN_PART_SIZE
    }
}

/// Builds an [`S3Gateway`] per requested region from a base config.
#[derive(Debug, Clone)]
pub struct S3GatewayProvider {
    config: GatewayConfig,
}

impl S3GatewayProvider {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl GatewayProvider for S3GatewayProvider {
    async fn connect(&self, region: &str) -> StorageResult<Arc<dyn StorageGateway>> {
        let config = self.config.with_region(Some(region));
        let gateway: Arc<dyn StorageGateway> = Arc::new(S3Gateway::connect(&config).await?);
        Ok(gateway)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn provider_builds_gateway_with_static_keys() {
        let provider = S3GatewayProvider::new(GatewayConfig {
            access_key_id: Some("AKIDEXAMPLE".into()),
            secret_access_key: Some("secret".into()),
            endpoint_url: Some("http://127.0.0.1:9".into()),
            force_path_style: true,
            ..GatewayConfig::default()
        });
        let gateway = provider.connect("us-west-2").await.unwrap();
        assert_eq!(gateway.worker_count(), DEFAULT_WORKER_COUNT);
        assert_eq!(gateway.min_part_size(), S3_MIN_PART_SIZE);
    }

    #[tokio::test]
    async fn presigned_url_is_signed_offline() {
        let config = GatewayConfig {
            access_key_id: Some("AKIDEXAMPLE".into()),
            secret_access_key: Some("secret".into()),
            region: "eu-central-1".into(),
            endpoint_url: Some("http://127.0.0.1:9".into()),
            force_path_style: true,
        };
        let gateway = S3Gateway::connect(&config).await.unwrap();
        let url = gateway
            .generate_presigned_url("reports", "q3/summary.pdf", Duration::from_secs(600))
            .await
            .unwrap();
        assert!(url.starts_with("http://127.0.0.1:9/reports/q3/summary.pdf?"), "{url}");
        assert!(url.contains("X-Amz-Expires=600"), "{url}");
        assert!(url.contains("X-Amz-Signature="), "{url}");
    }

    #[tokio::test]
    async fn lone_access_key_fails_before_connecting() {
        let config = GatewayConfig {
            access_key_id: Some("AKIDEXAMPLE".into()),
            ..GatewayConfig::default()
        };
        let err = S3Gateway::connect(&config).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MissingParameter);
    }
}
