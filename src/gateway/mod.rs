//! Object-store gateway
//!
//! This module is organized into submodules:
//! - `types`: request parameters, SSE-C key, object metadata
//! - `s3`: `aws-sdk-s3` backed gateway and its per-region provider
//! - `memory`: in-memory gateway for tests and offline use

mod memory;
mod s3;
mod types;

use crate::error::StorageResult;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use memory::MemoryGateway;
pub use s3::{S3Gateway, S3GatewayProvider};
pub use types::{CompletedPartInfo, ObjectHead, RequestParams, SseCustomerKey};

pub(crate) use types::DEFAULT_CONTENT_TYPE;

/// Parallel part workers used when a gateway does not say otherwise.
pub const DEFAULT_WORKER_COUNT: usize = 10;

/// Operations the transfer engine and the tools need from an object store.
///
/// Every call may fail with a provider error already translated into
/// [`crate::StorageError`]. Implementations do not retry beyond what their
/// SDK does internally.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    async fn head_bucket(&self, bucket: &str) -> StorageResult<()>;

    async fn create_bucket(&self, bucket: &str, region: &str) -> StorageResult<()>;

    async fn list_buckets(&self) -> StorageResult<Vec<String>>;

    /// Every key under `prefix`, in listing order.
    async fn list_objects(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<String>>;

    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        params: &RequestParams,
    ) -> StorageResult<ObjectHead>;

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        params: &RequestParams,
    ) -> StorageResult<Vec<u8>>;

    /// Bytes `start..=end` of the object.
    async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end: u64,
        params: &RequestParams,
    ) -> StorageResult<Vec<u8>>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        params: &RequestParams,
    ) -> StorageResult<()>;

    /// Returns the upload id.
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        params: &RequestParams,
    ) -> StorageResult<String>;

    /// Returns the part's ETag.
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
        params: &RequestParams,
    ) -> StorageResult<String>;

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPartInfo>,
        params: &RequestParams,
    ) -> StorageResult<()>;

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StorageResult<()>;

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()>;

    async fn generate_presigned_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Size of the worker pool for multipart transfers.
    fn worker_count(&self) -> usize {
        DEFAULT_WORKER_COUNT
    }

    /// Smallest size the store accepts for a part that is not the last one.
    fn min_part_size(&self) -> u64 {
        1
    }
}

/// Hands out a gateway for a region. Tool calls carry their own region, so
/// gateways are resolved per call.
#[async_trait]
pub trait GatewayProvider: Send + Sync {
    async fn connect(&self, region: &str) -> StorageResult<Arc<dyn StorageGateway>>;
}
