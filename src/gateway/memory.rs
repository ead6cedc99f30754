//! In-memory gateway
//!
//! Keeps buckets and objects in process memory, enforces the SSE-C contract
//! (an object written with a customer key can only be read back with the
//! same key, and every request of a multipart upload must carry the key it
//! was started with), counts calls per operation and can be told to fail an
//! operation. Used by the test suites and for offline runs.

use super::{
    CompletedPartInfo, GatewayProvider, ObjectHead, RequestParams, SseCustomerKey,
    StorageGateway, DEFAULT_CONTENT_TYPE,
};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const DEFAULT_MEMORY_WORKERS: usize = 4;

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
    metadata: HashMap<String, String>,
    encryption_key: Option<SseCustomerKey>,
}

#[derive(Debug)]
struct PendingUpload {
    bucket: String,
    key: String,
    params: RequestParams,
    parts: BTreeMap<i32, Vec<u8>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    buckets: BTreeMap<String, BTreeMap<String, StoredObject>>,
    uploads: HashMap<String, PendingUpload>,
    next_upload_id: u64,
    calls: HashMap<&'static str, usize>,
    keyed_calls: HashMap<&'static str, usize>,
    failures: HashMap<&'static str, StorageError>,
}

#[derive(Debug)]
pub struct MemoryGateway {
    state: Mutex<MemoryState>,
    worker_count: usize,
    min_part_size: u64,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            worker_count: DEFAULT_MEMORY_WORKERS,
            min_part_size: 1,
        }
    }

    /// Reject completion of uploads whose non-final parts are smaller than
    /// `min_part_size`, the way S3 answers EntityTooSmall.
    pub fn with_min_part_size(mut self, min_part_size: u64) -> Self {
        self.min_part_size = min_part_size.max(1);
        self
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.max(1);
        self
    }

    pub fn with_bucket(self, bucket: &str) -> Self {
        self.lock().buckets.entry(bucket.to_string()).or_default();
        self
    }

    /// Store an object directly, bypassing call counting.
    pub fn insert_object(&self, bucket: &str, key: &str, bytes: impl Into<Vec<u8>>) {
        self.lock().buckets.entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                bytes: bytes.into(),
                content_type: DEFAULT_CONTENT_TYPE.to_string(),
                metadata: HashMap::new(),
                encryption_key: None,
            },
        );
    }

    pub fn object_bytes(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.lock()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| object.bytes.clone())
    }

    pub fn object_metadata(&self, bucket: &str, key: &str) -> Option<HashMap<String, String>> {
        self.lock()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| object.metadata.clone())
    }

    /// Number of calls made to `operation` (trait method name).
    pub fn calls(&self, operation: &str) -> usize {
        self.lock().calls.get(operation).copied().unwrap_or(0)
    }

    /// Number of calls to `operation` that carried a customer encryption key.
    pub fn keyed_calls(&self, operation: &str) -> usize {
        self.lock().keyed_calls.get(operation).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    /// Make every later call to `operation` fail with `error`.
    pub fn fail_on(&self, operation: &'static str, error: StorageError) {
        self.lock().failures.insert(operation, error);
    }

    pub fn pending_uploads(&self) -> usize {
        self.lock().uploads.len()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call, surface an injected failure, hand out the state.
    fn enter(&self, operation: &'static str) -> StorageResult<MutexGuard<'_, MemoryState>> {
        self.enter_with(operation, None)
    }

    /// Like [`Self::enter`] for operations that take request parameters.
    fn enter_with(
        &self,
        operation: &'static str,
        params: Option<&RequestParams>,
    ) -> StorageResult<MutexGuard<'_, MemoryState>> {
        let mut state = self.lock();
        *state.calls.entry(operation).or_insert(0) += 1;
        if params.is_some_and(|params| params.encryption_key.is_some()) {
            *state.keyed_calls.entry(operation).or_insert(0) += 1;
        }
        if let Some(error) = state.failures.get(operation) {
            return Err(error.clone());
        }
        Ok(state)
    }
}

fn bucket_mut<'a>(
    state: &'a mut MemoryState,
    bucket: &str,
) -> StorageResult<&'a mut BTreeMap<String, StoredObject>> {
    state
        .buckets
        .get_mut(bucket)
        .ok_or_else(|| StorageError::NotFound(format!("Bucket '{}' not found", bucket)))
}

fn readable<'a>(
    state: &'a MemoryState,
    bucket: &str,
    key: &str,
    params: &RequestParams,
) -> StorageResult<&'a StoredObject> {
    let object = state
        .buckets
        .get(bucket)
        .ok_or_else(|| StorageError::NotFound(format!("Bucket '{}' not found", bucket)))?
        .get(key)
        .ok_or_else(|| {
            StorageError::NotFound(format!("File '{}' not found in bucket '{}'", key, bucket))
        })?;

    if object.encryption_key != params.encryption_key {
        return Err(StorageError::PermissionDenied(format!(
            "s3://{}/{}: customer encryption key does not match",
            bucket, key
        )));
    }
    Ok(object)
}

fn stored(bytes: Vec<u8>, params: &RequestParams) -> StoredObject {
    StoredObject {
        bytes,
        content_type: params
            .content_type
            .clone()
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        metadata: params.metadata.clone(),
        encryption_key: params.encryption_key.clone(),
    }
}

#[async_trait]
impl StorageGateway for MemoryGateway {
    async fn head_bucket(&self, bucket: &str) -> StorageResult<()> {
        let mut state = self.enter("head_bucket")?;
        bucket_mut(&mut state, bucket).map(|_| ())
    }

    async fn create_bucket(&self, bucket: &str, _region: &str) -> StorageResult<()> {
        let mut state = self.enter("create_bucket")?;
        state.buckets.entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn list_buckets(&self) -> StorageResult<Vec<String>> {
        let state = self.enter("list_buckets")?;
        Ok(state.buckets.keys().cloned().collect())
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<String>> {
        let mut state = self.enter("list_objects")?;
        let objects = bucket_mut(&mut state, bucket)?;
        Ok(objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        params: &RequestParams,
    ) -> StorageResult<ObjectHead> {
        let state = self.enter_with("head_object", Some(params))?;
        let object = readable(&state, bucket, key, params)?;
        Ok(ObjectHead {
            size: object.bytes.len() as u64,
            content_type: object.content_type.clone(),
        })
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        params: &RequestParams,
    ) -> StorageResult<Vec<u8>> {
        let state = self.enter_with("get_object", Some(params))?;
        readable(&state, bucket, key, params).map(|object| object.bytes.clone())
    }

    async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end: u64,
        params: &RequestParams,
    ) -> StorageResult<Vec<u8>> {
        let state = self.enter_with("get_object_range", Some(params))?;
        let bytes = &readable(&state, bucket, key, params)?.bytes;
        let len = bytes.len() as u64;
        if start > end || start >= len {
            return Err(StorageError::Internal(format!(
                "InvalidRange: bytes={}-{} of {}",
                start, end, len
            )));
        }
        let end = end.min(len - 1);
        Ok(bytes[start as usize..=end as usize].to_vec())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        params: &RequestParams,
    ) -> StorageResult<()> {
        let mut state = self.enter_with("put_object", Some(params))?;
        bucket_mut(&mut state, bucket)?.insert(key.to_string(), stored(body, params));
        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        params: &RequestParams,
    ) -> StorageResult<String> {
        let mut state = self.enter_with("create_multipart_upload", Some(params))?;
        bucket_mut(&mut state, bucket)?;
        state.next_upload_id += 1;
        let upload_id = format!("upload-{}", state.next_upload_id);
        state.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                params: params.clone(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
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
        let mut state = self.enter_with("upload_part", Some(params))?;
        let upload = state
            .uploads
            .get_mut(upload_id)
            .filter(|upload| upload.bucket == bucket && upload.key == key)
            .ok_or_else(|| StorageError::NotFound(format!("Upload '{}' not found", upload_id)))?;
        if upload.params.encryption_key != params.encryption_key {
            return Err(StorageError::PermissionDenied(format!(
                "part {} of upload '{}': customer encryption key does not match",
                part_number, upload_id
            )));
        }
        upload.parts.insert(part_number, body);
        Ok(format!("\"{}-{}\"", upload_id, part_number))
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPartInfo>,
        params: &RequestParams,
    ) -> StorageResult<()> {
        let mut state = self.enter_with("complete_multipart_upload", Some(params))?;
        let upload = state
            .uploads
            .get(upload_id)
            .filter(|upload| upload.bucket == bucket && upload.key == key)
            .ok_or_else(|| StorageError::NotFound(format!("Upload '{}' not found", upload_id)))?;
        if upload.params.encryption_key != params.encryption_key {
            return Err(StorageError::PermissionDenied(format!(
                "completing upload '{}': customer encryption key does not match",
                upload_id
            )));
        }

        let mut body = Vec::new();
        let mut previous = 0;
        for (position, part) in parts.iter().enumerate() {
            if part.part_number <= previous {
                return Err(StorageError::Internal(
                    "InvalidPartOrder: parts must be ascending".to_string(),
                ));
            }
            previous = part.part_number;
            let data = upload.parts.get(&part.part_number).ok_or_else(|| {
                StorageError::Internal(format!("InvalidPart: part {} was never uploaded", part.part_number))
            })?;
            if position + 1 < parts.len() && (data.len() as u64) < self.min_part_size {
                return Err(StorageError::Internal(format!(
                    "EntityTooSmall: part {} is {} bytes, minimum is {}",
                    part.part_number,
                    data.len(),
                    self.min_part_size
                )));
            }
            body.extend_from_slice(data);
        }

        let object = stored(body, &upload.params);
        state.uploads.remove(upload_id);
        bucket_mut(&mut state, bucket)?.insert(key.to_string(), object);
        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
    ) -> StorageResult<()> {
        let mut state = self.enter("abort_multipart_upload")?;
        state.uploads.remove(upload_id);
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let mut state = self.enter("delete_object")?;
        bucket_mut(&mut state, bucket)?.remove(key);
        Ok(())
    }

    async fn generate_presigned_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let _state = self.enter("generate_presigned_url")?;
        Ok(format!(
            "memory://{}/{}?expires={}",
            bucket,
            key,
            expires_in.as_secs()
        ))
    }

    fn worker_count(&self) -> usize {
        self.worker_count
    }

    fn min_part_size(&self) -> u64 {
        self.min_part_size
    }
}

#[async_trait]
impl GatewayProvider for Arc<MemoryGateway> {
    async fn connect(&self, _region: &str) -> StorageResult<Arc<dyn StorageGateway>> {
        let gateway: Arc<dyn StorageGateway> = self.clone();
        Ok(gateway)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_and_list_in_key_order() {
        let gateway = MemoryGateway::new().with_bucket("docs");
        let params = RequestParams::default();
        gateway.put_object("docs", "b.txt", b"b".to_vec(), &params).await.unwrap();
        gateway.put_object("docs", "a.txt", b"a".to_vec(), &params).await.unwrap();
        gateway.put_object("docs", "z/c.txt", b"c".to_vec(), &params).await.unwrap();

        assert_eq!(
            gateway.list_objects("docs", "").await.unwrap(),
            vec!["a.txt", "b.txt", "z/c.txt"]
        );
        assert_eq!(gateway.list_objects("docs", "z/").await.unwrap(), vec!["z/c.txt"]);
        assert_eq!(gateway.get_object("docs", "a.txt", &params).await.unwrap(), b"a");
        assert_eq!(gateway.calls("put_object"), 3);
    }

    #[tokio::test]
    async fn missing_bucket_and_key_are_not_found() {
        let gateway = MemoryGateway::new().with_bucket("docs");
        let params = RequestParams::default();
        assert!(matches!(
            gateway.get_object("nope", "a", &params).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            gateway.head_object("docs", "a", &params).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            gateway.head_bucket("nope").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn encrypted_object_needs_identical_key() {
        let gateway = MemoryGateway::new().with_bucket("vault");
        let key = SseCustomerKey::new(vec![9u8; 32]);
        let with_key = RequestParams::with_encryption_key(Some(key.clone()));
        gateway.put_object("vault", "s.bin", b"secret".to_vec(), &with_key).await.unwrap();

        let plain = RequestParams::default();
        let wrong = RequestParams::with_encryption_key(Some(SseCustomerKey::new(vec![1u8; 32])));
        assert!(matches!(
            gateway.get_object("vault", "s.bin", &plain).await,
            Err(StorageError::PermissionDenied(_))
        ));
        assert!(matches!(
            gateway.get_object("vault", "s.bin", &wrong).await,
            Err(StorageError::PermissionDenied(_))
        ));
        assert_eq!(gateway.get_object("vault", "s.bin", &with_key).await.unwrap(), b"secret");
    }

    #[tokio::test]
    async fn multipart_assembles_parts_in_order() {
        let gateway = MemoryGateway::new().with_bucket("big");
        let params = RequestParams::default();
        let upload_id = gateway.create_multipart_upload("big", "f", &params).await.unwrap();
        let e2 = gateway.upload_part("big", "f", &upload_id, 2, b"world".to_vec(), &params).await.unwrap();
        let e1 = gateway.upload_part("big", "f", &upload_id, 1, b"hello ".to_vec(), &params).await.unwrap();
        gateway
            .complete_multipart_upload(
                "big",
                "f",
                &upload_id,
                vec![
                    CompletedPartInfo { part_number: 1, etag: e1 },
                    CompletedPartInfo { part_number: 2, etag: e2 },
                ],
                &params,
            )
            .await
            .unwrap();

        assert_eq!(gateway.object_bytes("big", "f").unwrap(), b"hello world");
        assert_eq!(gateway.pending_uploads(), 0);
    }

    #[tokio::test]
    async fn completion_needs_the_upload_key() {
        let gateway = MemoryGateway::new().with_bucket("vault");
        let keyed = RequestParams::with_encryption_key(Some(SseCustomerKey::new(vec![3u8; 32])));
        let upload_id = gateway.create_multipart_upload("vault", "k", &keyed).await.unwrap();
        let etag = gateway.upload_part("vault", "k", &upload_id, 1, b"abc".to_vec(), &keyed).await.unwrap();
        let parts = vec![CompletedPartInfo { part_number: 1, etag }];

        let unkeyed = gateway
            .complete_multipart_upload("vault", "k", &upload_id, parts.clone(), &RequestParams::default())
            .await;
        assert!(matches!(unkeyed, Err(StorageError::PermissionDenied(_))));
        assert_eq!(gateway.pending_uploads(), 1);

        gateway.complete_multipart_upload("vault", "k", &upload_id, parts, &keyed).await.unwrap();
        assert_eq!(gateway.keyed_calls("complete_multipart_upload"), 1);
        assert_eq!(gateway.calls("complete_multipart_upload"), 2);
    }

    #[tokio::test]
    async fn small_inner_parts_are_rejected_on_completion() {
        let gateway = MemoryGateway::new().with_bucket("big").with_min_part_size(4);
        let params = RequestParams::default();
        let upload_id = gateway.create_multipart_upload("big", "f", &params).await.unwrap();
        let e1 = gateway.upload_part("big", "f", &upload_id, 1, b"ab".to_vec(), &params).await.unwrap();
        let e2 = gateway.upload_part("big", "f", &upload_id, 2, b"c".to_vec(), &params).await.unwrap();

        let err = gateway
            .complete_multipart_upload(
                "big",
                "f",
                &upload_id,
                vec![
                    CompletedPartInfo { part_number: 1, etag: e1 },
                    CompletedPartInfo { part_number: 2, etag: e2 },
                ],
                &params,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("EntityTooSmall"), "{err}");
        assert!(gateway.object_bytes("big", "f").is_none());
    }

    #[tokio::test]
    async fn range_reads_are_inclusive_and_clamped() {
        let gateway = MemoryGateway::new();
        gateway.insert_object("b", "k", b"0123456789".to_vec());
        let params = RequestParams::default();
        assert_eq!(gateway.get_object_range("b", "k", 2, 4, &params).await.unwrap(), b"234");
        assert_eq!(gateway.get_object_range("b", "k", 8, 100, &params).await.unwrap(), b"89");
        assert!(gateway.get_object_range("b", "k", 10, 12, &params).await.is_err());
    }

    #[tokio::test]
    async fn injected_failure_is_returned_and_counted() {
        let gateway = MemoryGateway::new().with_bucket("b");
        gateway.fail_on("list_buckets", StorageError::PermissionDenied("AccessDenied".into()));
        assert!(matches!(
            gateway.list_buckets().await,
            Err(StorageError::PermissionDenied(_))
        ));
        assert_eq!(gateway.calls("list_buckets"), 1);
        assert_eq!(gateway.total_calls(), 1);
    }
}
