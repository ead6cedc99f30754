//! Tool-call surface over the gateway, the transfer engine and the parser
//!
//! Every operation validates its required parameters before touching a
//! gateway, and every fault comes back as a status-tagged error response.

use super::types::{
    BucketCreated, BucketList, DownloadedObject, FileContents, ObjectDeleted, ObjectList,
    PresignedUrl, ToolCall, ToolResponse, UploadReceipt,
};
use crate::config::GatewayConfig;
use crate::error::{require, StorageError, StorageResult};
use crate::gateway::{GatewayProvider, RequestParams, S3GatewayProvider, StorageGateway};
use crate::transfer::{TransferEngine, TransferPolicy, TransferResult, UploadSource};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::{debug, info, warn};
use object_parse::Format;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_PRESIGNED_EXPIRATION_SECS: u64 = 3600;
/// Longest validity S3 accepts for a SigV4 presigned URL (7 days).
pub const MAX_PRESIGNED_EXPIRATION_SECS: u64 = 604_800;

pub struct S3Tools<P> {
    provider: P,
    default_region: String,
    policy: TransferPolicy,
}

impl S3Tools<S3GatewayProvider> {
    /// Tools backed by S3, defaulting to the config's region.
    pub fn from_config(config: GatewayConfig, policy: TransferPolicy) -> Self {
        let region = config.region.clone();
        Self::new(S3GatewayProvider::new(config), region, policy)
    }
}

impl<P: GatewayProvider> S3Tools<P> {
    pub fn new(provider: P, default_region: impl Into<String>, policy: TransferPolicy) -> Self {
        Self {
            provider,
            default_region: default_region.into(),
            policy,
        }
    }

    pub fn policy(&self) -> &TransferPolicy {
        &self.policy
    }

    pub async fn create_bucket(
        &self,
        bucket: &str,
        region: Option<&str>,
    ) -> ToolResponse<BucketCreated> {
        respond("create_bucket", self.try_create_bucket(bucket, region).await)
    }

    pub async fn list_buckets(&self, region: Option<&str>) -> ToolResponse<BucketList> {
        respond("list_buckets", self.try_list_buckets(region).await)
    }

    pub async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        region: Option<&str>,
    ) -> ToolResponse<ObjectList> {
        respond("list_objects", self.try_list_objects(bucket, prefix, region).await)
    }

    /// Expiration defaults to one hour.
    pub async fn generate_presigned_url(
        &self,
        bucket: &str,
        key: &str,
        expiration_seconds: Option<u64>,
        region: Option<&str>,
    ) -> ToolResponse<PresignedUrl> {
        respond(
            "generate_presigned_url",
            self.try_presigned_url(bucket, key, expiration_seconds, region)
                .await,
        )
    }

    /// Fetch an object and decode it by the suffix of its key.
    pub async fn read_file(
        &self,
        bucket: &str,
        key: &str,
        region: Option<&str>,
    ) -> ToolResponse<FileContents> {
        respond("read_file", self.try_read_file(bucket, key, region).await)
    }

    /// Upload raw bytes. An empty key, or one ending in `/`, gets `filename`
    /// appended.
    pub async fn upload_bytes(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        bucket: &str,
        key: &str,
        region: Option<&str>,
    ) -> ToolResponse<UploadReceipt> {
        self.upload_source("upload_bytes", UploadSource::Bytes(bytes), filename, bucket, key, region)
            .await
    }

    pub async fn upload_base64(
        &self,
        base64_data: &str,
        filename: &str,
        bucket: &str,
        key: &str,
        region: Option<&str>,
    ) -> ToolResponse<UploadReceipt> {
        let bytes = match decode_base64(base64_data) {
            Ok(bytes) => bytes,
            Err(err) => return respond("upload_base64", Err(err)),
        };
        self.upload_source("upload_base64", UploadSource::Bytes(bytes), filename, bucket, key, region)
            .await
    }

    /// Upload a local file; the key defaults to the file's name.
    pub async fn upload_file(
        &self,
        local_path: &str,
        bucket: &str,
        key: Option<&str>,
        region: Option<&str>,
    ) -> ToolResponse<UploadReceipt> {
        let path = match require(local_path, "localPath") {
            Ok(path) => PathBuf::from(path),
            Err(err) => return respond("upload_file", Err(err)),
        };
        let file_name = match path.file_name().and_then(|name| name.to_str()) {
            Some(name) => name.to_string(),
            None => {
                let err = StorageError::MissingParameter(format!(
                    "'localPath' {} has no file name",
                    path.display()
                ));
                return respond("upload_file", Err(err));
            }
        };
        self.upload_source(
            "upload_file",
            UploadSource::File(path),
            &file_name,
            bucket,
            key.unwrap_or_default(),
            region,
        )
        .await
    }

    pub async fn download_object(
        &self,
        bucket: &str,
        key: &str,
        region: Option<&str>,
    ) -> ToolResponse<DownloadedObject> {
        respond("download_object", self.try_download_object(bucket, key, region).await)
    }

    pub async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        region: Option<&str>,
    ) -> ToolResponse<ObjectDeleted> {
        respond("delete_object", self.try_delete_object(bucket, key, region).await)
    }

    /// Run one decoded tool call and serialize its response.
    pub async fn call(&self, call: ToolCall) -> Value {
        match call {
            ToolCall::CreateBucket { bucket, region } => {
                to_json(self.create_bucket(&bucket, region.as_deref()).await)
            }
            ToolCall::ListBuckets { region } => to_json(self.list_buckets(region.as_deref()).await),
            ToolCall::ListObjects {
                bucket,
                prefix,
                region,
            } => to_json(self.list_objects(&bucket, &prefix, region.as_deref()).await),
            ToolCall::GeneratePresignedUrl {
                bucket,
                key,
                expiration_seconds,
                region,
            } => to_json(
                self.generate_presigned_url(&bucket, &key, expiration_seconds, region.as_deref())
                    .await,
            ),
            ToolCall::ReadFile {
                bucket,
                key,
                region,
            } => to_json(self.read_file(&bucket, &key, region.as_deref()).await),
            ToolCall::UploadBase64 {
                base64_data,
                filename,
                bucket,
                key,
                region,
            } => to_json(
                self.upload_base64(&base64_data, &filename, &bucket, &key, region.as_deref())
                    .await,
            ),
            ToolCall::UploadFile {
                local_path,
                bucket,
                key,
                region,
            } => to_json(
                self.upload_file(&local_path, &bucket, key.as_deref(), region.as_deref())
                    .await,
            ),
            ToolCall::DownloadObject {
                bucket,
                key,
                region,
            } => to_json(self.download_object(&bucket, &key, region.as_deref()).await),
            ToolCall::DeleteObject {
                bucket,
                key,
                region,
            } => to_json(self.delete_object(&bucket, &key, region.as_deref()).await),
        }
    }

    /// Like [`S3Tools::call`] for a raw JSON request.
    pub async fn call_json(&self, request: Value) -> Value {
        match serde_json::from_value::<ToolCall>(request) {
            Ok(call) => self.call(call).await,
            Err(err) => {
                warn!("tool_call_rejected: error={}", err);
                to_json(ToolResponse::<()>::from(StorageError::MissingParameter(format!(
                    "invalid tool call: {}",
                    err
                ))))
            }
        }
    }

    fn region<'a>(&'a self, region: Option<&'a str>) -> &'a str {
        region
            .map(str::trim)
            .filter(|region| !region.is_empty())
            .unwrap_or(&self.default_region)
    }

    async fn gateway(&self, region: Option<&str>) -> StorageResult<Arc<dyn StorageGateway>> {
        self.provider.connect(self.region(region)).await
    }

    fn object_params(&self) -> RequestParams {
        RequestParams::with_encryption_key(self.policy.encryption_key.clone())
    }

    async fn try_create_bucket(
        &self,
        bucket: &str,
        region: Option<&str>,
    ) -> StorageResult<BucketCreated> {
        let bucket = require(bucket, "bucket")?;
        let region = self.region(region).to_string();
        let gateway = self.gateway(Some(region.as_str())).await?;

        let created = match gateway.head_bucket(bucket).await {
            Ok(()) => false,
            Err(StorageError::NotFound(_)) => {
                gateway.create_bucket(bucket, &region).await?;
                true
            }
            Err(err) => return Err(err),
        };

        let message = if created {
            format!("Bucket '{}' created successfully", bucket)
        } else {
            format!("Bucket '{}' already exists", bucket)
        };
        info!("create_bucket: bucket={} region={} created={}", bucket, region, created);
        Ok(BucketCreated {
            bucket: bucket.to_string(),
            region,
            created,
            message,
        })
    }

    async fn try_list_buckets(&self, region: Option<&str>) -> StorageResult<BucketList> {
        let buckets = self.gateway(region).await?.list_buckets().await?;
        info!("list_buckets: count={}", buckets.len());
        Ok(BucketList { buckets })
    }

    async fn try_list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        region: Option<&str>,
    ) -> StorageResult<ObjectList> {
        let bucket = require(bucket, "bucket")?;
        let objects = self.gateway(region).await?.list_objects(bucket, prefix).await?;
        info!(
            "list_objects: bucket={} prefix={:?} count={}",
            bucket,
            prefix,
            objects.len()
        );
        Ok(ObjectList {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            objects,
        })
    }

    async fn try_presigned_url(
        &self,
        bucket: &str,
        key: &str,
        expiration_seconds: Option<u64>,
        region: Option<&str>,
    ) -> StorageResult<PresignedUrl> {
        let bucket = require(bucket, "bucket")?;
        let key = require(key, "key")?;
        let expires_in = expiration_seconds.unwrap_or(DEFAULT_PRESIGNED_EXPIRATION_SECS);
        if expires_in == 0 || expires_in > MAX_PRESIGNED_EXPIRATION_SECS {
            return Err(StorageError::MissingParameter(format!(
                "'expirationSeconds' must be between 1 and {}",
                MAX_PRESIGNED_EXPIRATION_SECS
            )));
        }

        let url = self
            .gateway(region)
            .await?
            .generate_presigned_url(bucket, key, Duration::from_secs(expires_in))
            .await?;
        let expires_at = chrono::Utc::now() + chrono::Duration::seconds(expires_in as i64);

        info!(
            "generate_presigned_url: s3://{}/{} expires_in={}",
            bucket, key, expires_in
        );
        Ok(PresignedUrl {
            url,
            expires_in,
            expires_at: expires_at.to_rfc3339(),
            file_name: file_name_of(key).to_string(),
        })
    }

    async fn try_read_file(
        &self,
        bucket: &str,
        key: &str,
        region: Option<&str>,
    ) -> StorageResult<FileContents> {
        let bucket = require(bucket, "bucket")?;
        let key = require(key, "key")?;
        // Unsupported suffixes are refused without fetching anything.
        let format = Format::from_key(key)?;

        let bytes = self
            .gateway(region)
            .await?
            .get_object(bucket, key, &self.object_params())
            .await?;
        debug!(
            "read_file_fetched: s3://{}/{} bytes={} format={}",
            bucket,
            key,
            bytes.len(),
            format
        );

        let data = object_parse::parse_as(&bytes, format)?;
        info!("read_file: s3://{}/{} format={}", bucket, key, format);
        Ok(FileContents {
            bucket: bucket.to_string(),
            key: key.to_string(),
            format: format.suffix().to_string(),
            data,
        })
    }

    async fn upload_source(
        &self,
        tool: &str,
        source: UploadSource,
        file_name: &str,
        bucket: &str,
        key: &str,
        region: Option<&str>,
    ) -> ToolResponse<UploadReceipt> {
        let (bucket, key) = match upload_target(bucket, key, file_name) {
            Ok(target) => target,
            Err(err) => return respond(tool, Err(err)),
        };
        let gateway = match self.gateway(region).await {
            Ok(gateway) => gateway,
            Err(err) => return respond(tool, Err(err)),
        };

        let result = TransferEngine::new(gateway)
            .upload(source, bucket, &key, &self.policy)
            .await;
        match &result {
            TransferResult::Success { total_bytes, .. } => {
                info!("{}: s3://{}/{} bytes={}", tool, bucket, key, total_bytes)
            }
            TransferResult::Error { kind, message } => {
                warn!("tool_failed: tool={} kind={:?} error={}", tool, kind, message)
            }
        }
        let file_name = if file_name.trim().is_empty() {
            file_name_of(&key)
        } else {
            file_name.trim()
        };
        UploadReceipt::from_transfer(bucket, &key, file_name, result)
    }

    async fn try_download_object(
        &self,
        bucket: &str,
        key: &str,
        region: Option<&str>,
    ) -> StorageResult<DownloadedObject> {
        let bucket = require(bucket, "bucket")?;
        let key = require(key, "key")?;
        let gateway = self.gateway(region).await?;
        let params = self.object_params();

        let head = gateway.head_object(bucket, key, &params).await?;
        let bytes = gateway.get_object(bucket, key, &params).await?;
        info!("download_object: s3://{}/{} bytes={}", bucket, key, bytes.len());
        Ok(DownloadedObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            file_name: file_name_of(key).to_string(),
            content_type: head.content_type,
            file_size: bytes.len() as u64,
            data: BASE64.encode(&bytes),
        })
    }

    async fn try_delete_object(
        &self,
        bucket: &str,
        key: &str,
        region: Option<&str>,
    ) -> StorageResult<ObjectDeleted> {
        let bucket = require(bucket, "bucket")?;
        let key = require(key, "key")?;
        self.gateway(region).await?.delete_object(bucket, key).await?;
        info!("delete_object: s3://{}/{}", bucket, key);
        Ok(ObjectDeleted {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

fn respond<T>(tool: &str, result: StorageResult<T>) -> ToolResponse<T> {
    match result {
        Ok(payload) => ToolResponse::Success(payload),
        Err(err) => {
            warn!("tool_failed: tool={} kind={:?} error={}", tool, err.kind(), err);
            err.into()
        }
    }
}

fn to_json<T: Serialize>(response: ToolResponse<T>) -> Value {
    serde_json::to_value(&response).unwrap_or_else(|err| {
        json!({
            "status": "error",
            "kind": "internal_error",
            "message": format!("failed to encode response: {}", err),
        })
    })
}

/// Bucket plus the final key, filling a folder-like key with the file name.
fn upload_target<'a>(
    bucket: &'a str,
    key: &str,
    file_name: &str,
) -> StorageResult<(&'a str, String)> {
    let bucket = require(bucket, "bucket")?;
    if key.trim().is_empty() || key.ends_with('/') {
        let folder = if key.trim().is_empty() { "" } else { key };
        let file_name = require(file_name, "filename")?;
        return Ok((bucket, format!("{}{}", folder, file_name)));
    }
    Ok((bucket, key.to_string()))
}

fn decode_base64(data: &str) -> StorageResult<Vec<u8>> {
    let data = require(data, "base64Data")?;
    BASE64
        .decode(data.trim())
        .map_err(|e| StorageError::MalformedContent(format!("invalid base64 data: {}", e)))
}

fn file_name_of(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}
