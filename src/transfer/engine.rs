//! Upload and download of a single object under a [`TransferPolicy`]

use super::policy::{PartPlan, TransferPolicy, TransferStrategy};
use super::progress::{ProgressObserver, ProgressSnapshot, ProgressTracker, WorkerId};
use super::types::{SourceReader, TransferResult, UploadOptions, UploadSource};
use super::worker::run_parts;
use crate::error::{require, StorageError, StorageResult};
use crate::gateway::{CompletedPartInfo, RequestParams, StorageGateway};
use log::{debug, info, warn};
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

/// S3 accepts at most this many parts per multipart upload.
const MAX_PARTS: u64 = 10_000;

/// Tracker plus the optional observer told about every record.
struct ProgressSink {
    tracker: ProgressTracker,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl ProgressSink {
    fn new(target_bytes: u64, observer: Option<Arc<dyn ProgressObserver>>) -> Self {
        Self {
            tracker: ProgressTracker::new(target_bytes),
            observer,
        }
    }

    fn record(&self, worker: WorkerId, bytes: u64) {
        if bytes == 0 {
            return;
        }
        let snapshot = self.tracker.record(worker, bytes);
        if let Some(observer) = &self.observer {
            observer.on_progress(&snapshot);
        }
    }

    fn snapshot(&self) -> ProgressSnapshot {
        self.tracker.snapshot()
    }
}

#[derive(Clone)]
pub struct TransferEngine {
    gateway: Arc<dyn StorageGateway>,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl TransferEngine {
    pub fn new(gateway: Arc<dyn StorageGateway>) -> Self {
        Self {
            gateway,
            observer: None,
        }
    }

    pub fn with_observer<O>(mut self, observer: O) -> Self
    where
        O: ProgressObserver + 'static,
    {
        let observer: Arc<dyn ProgressObserver> = Arc::new(observer);
        self.observer = Some(observer);
        self
    }

    pub async fn upload(
        &self,
        source: UploadSource,
        bucket: &str,
        key: &str,
        policy: &TransferPolicy,
    ) -> TransferResult {
        self.upload_with_options(source, bucket, key, policy, UploadOptions::default())
            .await
    }

    pub async fn upload_with_options(
        &self,
        source: UploadSource,
        bucket: &str,
        key: &str,
        policy: &TransferPolicy,
        options: UploadOptions,
    ) -> TransferResult {
        match self.try_upload(source, bucket, key, policy, options).await {
            Ok(result) => result,
            Err(err) => {
                warn!("upload_failed: s3://{}/{} error={}", bucket, key, err);
                err.into()
            }
        }
    }

    pub async fn download(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
        policy: &TransferPolicy,
    ) -> TransferResult {
        match self.try_download(bucket, key, destination, policy).await {
            Ok(result) => result,
            Err(err) => {
                warn!(
                    "download_failed: s3://{}/{} -> {} error={}",
                    bucket,
                    key,
                    destination.display(),
                    err
                );
                err.into()
            }
        }
    }

    async fn try_upload(
        &self,
        source: UploadSource,
        bucket: &str,
        key: &str,
        policy: &TransferPolicy,
        options: UploadOptions,
    ) -> StorageResult<TransferResult> {
        let bucket = require(bucket, "bucket")?;
        let key = require(key, "key")?;
        policy.validate()?;

        let reader = SourceReader::open(source).await?;
        let size = reader.len();
        let strategy = policy.choose_strategy(size);
        let params = RequestParams {
            encryption_key: policy.encryption_key.clone(),
            metadata: options.metadata,
            content_type: options.content_type,
        };
        let progress = Arc::new(ProgressSink::new(size, self.observer.clone()));

        info!(
            "upload_start: s3://{}/{} size={} strategy={} sse_c={}",
            bucket,
            key,
            size,
            strategy,
            params.encryption_key.is_some()
        );

        match strategy {
            TransferStrategy::SingleWorker | TransferStrategy::Standard => {
                let body = reader.read_all().await?;
                self.gateway
                    .put_object(bucket, key, body, &params)
                    .await
                    .map_err(StorageError::into_transfer_failure)?;
                progress.record(0, size);
            }
            TransferStrategy::Multipart => {
                self.multipart_upload(reader, bucket, key, policy.chunk_size_bytes, params, &progress)
                    .await?;
            }
        }

        let result = finish(strategy, &progress.snapshot(), size)?;
        info!("upload_complete: s3://{}/{} bytes={}", bucket, key, size);
        Ok(result)
    }

    async fn multipart_upload(
        &self,
        reader: SourceReader,
        bucket: &str,
        key: &str,
        chunk_size: u64,
        params: RequestParams,
        progress: &Arc<ProgressSink>,
    ) -> StorageResult<()> {
        let min_part_size = self.gateway.min_part_size();
        if chunk_size < min_part_size {
            debug!(
                "multipart_chunk_raised: s3://{}/{} requested={} minimum={}",
                bucket, key, chunk_size, min_part_size
            );
        }
        let chunk_size = chunk_size.max(min_part_size);
        let plan = PartPlan::new(reader.len(), chunk_size);
        if plan.part_count > MAX_PARTS {
            return Err(StorageError::TransferFailure(format!(
                "{} parts of {} bytes exceed the {} part limit",
                plan.part_count, chunk_size, MAX_PARTS
            )));
        }

        let upload_id = self
            .gateway
            .create_multipart_upload(bucket, key, &params)
            .await
            .map_err(StorageError::into_transfer_failure)?;
        debug!(
            "multipart_upload_created: s3://{}/{} upload_id={} parts={}",
            bucket, key, upload_id, plan.part_count
        );

        let params = Arc::new(params);
        let job = {
            let gateway = Arc::clone(&self.gateway);
            let progress = Arc::clone(progress);
            let params = Arc::clone(&params);
            let bucket = bucket.to_string();
            let key = key.to_string();
            let upload_id = upload_id.clone();

            move |worker: WorkerId, index: u64| {
                let gateway = Arc::clone(&gateway);
                let progress = Arc::clone(&progress);
                let params = Arc::clone(&params);
                let reader = reader.clone();
                let bucket = bucket.clone();
                let key = key.clone();
                let upload_id = upload_id.clone();

                async move {
                    let (offset, length) = plan.range(index);
                    let part_number = index as i32 + 1;
                    let body = reader.read_range(offset, length).await?;
                    let etag = gateway
                        .upload_part(&bucket, &key, &upload_id, part_number, body, &params)
                        .await
                        .map_err(StorageError::into_transfer_failure)?;
                    progress.record(worker, length);
                    debug!(
                        "upload_part_done: upload_id={} part={} worker={} bytes={}",
                        upload_id, part_number, worker, length
                    );
                    Ok(CompletedPartInfo { part_number, etag })
                }
            }
        };

        let mut parts = match run_parts(self.gateway.worker_count(), plan, job).await {
            Ok(parts) => parts,
            Err(err) => {
                self.abort_upload(bucket, key, &upload_id).await;
                return Err(err);
            }
        };
        parts.sort_by_key(|part| part.part_number);

        if let Err(err) = self
            .gateway
            .complete_multipart_upload(bucket, key, &upload_id, parts, &params)
            .await
        {
            self.abort_upload(bucket, key, &upload_id).await;
            return Err(err.into_transfer_failure());
        }
        Ok(())
    }

    async fn abort_upload(&self, bucket: &str, key: &str, upload_id: &str) {
        match self.gateway.abort_multipart_upload(bucket, key, upload_id).await {
            Ok(()) => info!("multipart_upload_aborted: s3://{}/{} upload_id={}", bucket, key, upload_id),
            Err(err) => warn!(
                "multipart_abort_failed: s3://{}/{} upload_id={} error={}",
                bucket, key, upload_id, err
            ),
        }
    }

    async fn try_download(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
        policy: &TransferPolicy,
    ) -> StorageResult<TransferResult> {
        let bucket = require(bucket, "bucket")?;
        let key = require(key, "key")?;
        if destination.as_os_str().is_empty() {
            return Err(StorageError::MissingParameter("'destination' is required".to_string()));
        }
        policy.validate()?;

        let params = RequestParams::with_encryption_key(policy.encryption_key.clone());
        let head = self
            .gateway
            .head_object(bucket, key, &params)
            .await
            .map_err(StorageError::into_transfer_failure)?;
        let size = head.size;
        let strategy = policy.choose_strategy(size);
        let progress = Arc::new(ProgressSink::new(size, self.observer.clone()));

        info!(
            "download_start: s3://{}/{} -> {} size={} strategy={}",
            bucket,
            key,
            destination.display(),
            size,
            strategy
        );

        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        match strategy {
            TransferStrategy::SingleWorker | TransferStrategy::Standard => {
                let bytes = self
                    .gateway
                    .get_object(bucket, key, &params)
                    .await
                    .map_err(StorageError::into_transfer_failure)?;
                tokio::fs::write(destination, &bytes).await?;
                progress.record(0, bytes.len() as u64);
            }
            TransferStrategy::Multipart => {
                let downloaded = self
                    .multipart_download(bucket, key, destination, size, policy.chunk_size_bytes, params, &progress)
                    .await;
                if let Err(err) = downloaded {
                    if let Err(cleanup) = tokio::fs::remove_file(destination).await {
                        debug!(
                            "partial_file_cleanup_failed: {} error={}",
                            destination.display(),
                            cleanup
                        );
                    }
                    return Err(err);
                }
            }
        }

        let result = finish(strategy, &progress.snapshot(), size)?;
        info!("download_complete: s3://{}/{} bytes={}", bucket, key, size);
        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    async fn multipart_download(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
        size: u64,
        chunk_size: u64,
        params: RequestParams,
        progress: &Arc<ProgressSink>,
    ) -> StorageResult<()> {
        // Preallocate so every worker can write its parts in place.
        let file = tokio::fs::File::create(destination).await?;
        file.set_len(size).await?;
        drop(file);

        let plan = PartPlan::new(size, chunk_size);
        let job = {
            let gateway = Arc::clone(&self.gateway);
            let progress = Arc::clone(progress);
            let params = Arc::new(params);
            let bucket = bucket.to_string();
            let key = key.to_string();
            let destination = Arc::new(destination.to_path_buf());

            move |worker: WorkerId, index: u64| {
                let gateway = Arc::clone(&gateway);
                let progress = Arc::clone(&progress);
                let params = Arc::clone(&params);
                let bucket = bucket.clone();
                let key = key.clone();
                let destination = Arc::clone(&destination);

                async move {
                    let (offset, length) = plan.range(index);
                    let bytes = gateway
                        .get_object_range(&bucket, &key, offset, offset + length - 1, &params)
                        .await
                        .map_err(StorageError::into_transfer_failure)?;
                    if bytes.len() as u64 != length {
                        return Err(StorageError::TransferFailure(format!(
                            "range {}-{} returned {} bytes, expected {}",
                            offset,
                            offset + length - 1,
                            bytes.len(),
                            length
                        )));
                    }

                    let mut file = OpenOptions::new().write(true).open(destination.as_ref()).await?;
                    file.seek(SeekFrom::Start(offset)).await?;
                    file.write_all(&bytes).await?;
                    file.flush().await?;

                    progress.record(worker, length);
                    debug!(
                        "download_part_done: s3://{}/{} part={} worker={} bytes={}",
                        bucket,
                        key,
                        index + 1,
                        worker,
                        length
                    );
                    Ok(())
                }
            }
        };

        run_parts(self.gateway.worker_count(), plan, job).await?;
        Ok(())
    }
}

/// Turn the final snapshot into a result, refusing to report success for a
/// transfer whose counts do not add up to the object size.
fn finish(
    strategy: TransferStrategy,
    snapshot: &ProgressSnapshot,
    size: u64,
) -> StorageResult<TransferResult> {
    let summed: u64 = snapshot.per_worker_bytes.values().sum();
    if summed != snapshot.total_bytes_transferred || snapshot.total_bytes_transferred != size {
        return Err(StorageError::TransferFailure(format!(
            "transferred {} of {} bytes",
            snapshot.total_bytes_transferred, size
        )));
    }
    Ok(TransferResult::Success {
        strategy,
        total_bytes: snapshot.total_bytes_transferred,
        per_worker_bytes: snapshot.per_worker_bytes.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::gateway::{MemoryGateway, SseCustomerKey};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const MIB: u64 = 1024 * 1024;

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn gateway() -> Arc<MemoryGateway> {
        Arc::new(MemoryGateway::new().with_bucket("data"))
    }

    fn counting_engine(gateway: &Arc<MemoryGateway>) -> (TransferEngine, Arc<Mutex<Vec<ProgressSnapshot>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let engine = TransferEngine::new(gateway.clone())
            .with_observer(move |snapshot: &ProgressSnapshot| sink.lock().unwrap().push(snapshot.clone()));
        (engine, seen)
    }

    fn success_totals(result: &TransferResult) -> (TransferStrategy, u64, u64) {
        match result {
            TransferResult::Success {
                strategy,
                total_bytes,
                per_worker_bytes,
            } => (*strategy, *total_bytes, per_worker_bytes.values().sum()),
            TransferResult::Error { kind, message } => panic!("{:?}: {}", kind, message),
        }
    }

    fn error_kind(result: &TransferResult) -> ErrorKind {
        match result {
            TransferResult::Error { kind, .. } => *kind,
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn ten_mib_in_one_mib_chunks_records_ten_times() {
        let gateway = gateway();
        let (engine, seen) = counting_engine(&gateway);
        let policy = TransferPolicy::new(MIB, 5 * MIB, true).unwrap();
        let data = payload(10 * MIB as usize);

        let result = engine
            .upload(UploadSource::Bytes(data.clone()), "data", "big.bin", &policy)
            .await;

        let (strategy, total, summed) = success_totals(&result);
        assert_eq!(strategy, TransferStrategy::Multipart);
        assert_eq!(total, 10_485_760);
        assert_eq!(summed, 10_485_760);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 10);
        assert_eq!(seen.last().unwrap().total_bytes_transferred, 10_485_760);
        assert!(seen.iter().all(|s| s.per_worker_bytes.values().sum::<u64>() == s.total_bytes_transferred));

        assert_eq!(gateway.calls("upload_part"), 10);
        assert_eq!(gateway.object_bytes("data", "big.bin").unwrap(), data);
    }

    #[tokio::test]
    async fn threshold_above_size_uploads_in_one_request() {
        let gateway = gateway();
        let (engine, seen) = counting_engine(&gateway);
        let data = payload(300 * 1024);
        let policy = TransferPolicy::new(64 * 1024, 2 * data.len() as u64, true).unwrap();

        let result = engine
            .upload(UploadSource::Bytes(data.clone()), "data", "mid.bin", &policy)
            .await;

        let (strategy, total, _) = success_totals(&result);
        assert_eq!(strategy, TransferStrategy::Standard);
        assert_eq!(total, data.len() as u64);
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(gateway.calls("put_object"), 1);
        assert_eq!(gateway.calls("create_multipart_upload"), 0);
    }

    #[tokio::test]
    async fn workers_disabled_uses_single_request() {
        let gateway = gateway();
        let (engine, seen) = counting_engine(&gateway);
        let policy = TransferPolicy::new(1024, 1024, false).unwrap();

        let result = engine
            .upload(UploadSource::Bytes(payload(10_000)), "data", "one.bin", &policy)
            .await;

        let (strategy, _, _) = success_totals(&result);
        assert_eq!(strategy, TransferStrategy::SingleWorker);
        assert_eq!(seen.lock().unwrap()[0].per_worker_bytes.get(&0), Some(&10_000));
        assert_eq!(gateway.calls("upload_part"), 0);
    }

    #[tokio::test]
    async fn zero_byte_object_skips_multipart() {
        let gateway = gateway();
        let (engine, seen) = counting_engine(&gateway);
        let policy = TransferPolicy::new(1, 1, true).unwrap();

        let result = engine.upload(UploadSource::Bytes(Vec::new()), "data", "empty", &policy).await;

        let (strategy, total, _) = success_totals(&result);
        assert_eq!(strategy, TransferStrategy::Standard);
        assert_eq!(total, 0);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(gateway.object_bytes("data", "empty").unwrap(), Vec::<u8>::new());

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("empty");
        let result = engine.download("data", "empty", &target, &policy).await;
        assert!(result.is_success());
        assert_eq!(tokio::fs::read(&target).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn file_round_trip_through_multipart() {
        let gateway = gateway();
        let engine = TransferEngine::new(gateway.clone());
        let policy = TransferPolicy::new(100_000, 200_000, true).unwrap();
        let data = payload(1_000_003);

        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("upload.bin");
        tokio::fs::write(&source, &data).await.unwrap();

        let uploaded = engine
            .upload(UploadSource::File(source), "data", "copy.bin", &policy)
            .await;
        assert_eq!(success_totals(&uploaded), (TransferStrategy::Multipart, 1_000_003, 1_000_003));
        assert_eq!(gateway.calls("upload_part"), 11);

        let target = dir.path().join("nested").join("deeper").join("copy.bin");
        let downloaded = engine.download("data", "copy.bin", &target, &policy).await;
        assert_eq!(
            success_totals(&downloaded),
            (TransferStrategy::Multipart, 1_000_003, 1_000_003)
        );
        assert_eq!(gateway.calls("get_object_range"), 11);
        assert_eq!(tokio::fs::read(&target).await.unwrap(), data);
    }

    #[tokio::test]
    async fn customer_key_must_match_on_download() {
        let gateway = gateway();
        let engine = TransferEngine::new(gateway.clone());
        let key = SseCustomerKey::new(vec![42u8; 32]);
        let keyed = TransferPolicy::new(1024, 4096, true)
            .unwrap()
            .with_encryption_key(key);
        let plain = TransferPolicy::new(1024, 4096, true).unwrap();

        let uploaded = engine
            .upload(UploadSource::Bytes(payload(10_000)), "data", "secret.bin", &keyed)
            .await;
        assert!(uploaded.is_success());

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("secret.bin");
        let denied = engine.download("data", "secret.bin", &target, &plain).await;
        assert_eq!(error_kind(&denied), ErrorKind::PermissionDenied);

        let allowed = engine.download("data", "secret.bin", &target, &keyed).await;
        assert_eq!(success_totals(&allowed).1, 10_000);
    }

    #[tokio::test]
    async fn failed_part_aborts_the_upload() {
        let gateway = gateway();
        gateway.fail_on("upload_part", StorageError::Internal("SlowDown".into()));
        let engine = TransferEngine::new(gateway.clone());
        let policy = TransferPolicy::new(1024, 1024, true).unwrap();

        let result = engine
            .upload(UploadSource::Bytes(payload(8 * 1024)), "data", "broken.bin", &policy)
            .await;

        assert_eq!(error_kind(&result), ErrorKind::TransferFailure);
        assert_eq!(gateway.calls("abort_multipart_upload"), 1);
        assert_eq!(gateway.calls("complete_multipart_upload"), 0);
        assert_eq!(gateway.pending_uploads(), 0);
        assert!(gateway.object_bytes("data", "broken.bin").is_none());
    }

    #[tokio::test]
    async fn every_multipart_request_carries_the_customer_key() {
        let gateway = gateway();
        let engine = TransferEngine::new(gateway.clone());
        let policy = TransferPolicy::new(1024, 1024, true)
            .unwrap()
            .with_encryption_key(SseCustomerKey::new(vec![11u8; 32]));

        let result = engine
            .upload(UploadSource::Bytes(payload(3000)), "data", "keyed.bin", &policy)
            .await;
        assert!(result.is_success(), "{:?}", result);

        for operation in ["create_multipart_upload", "upload_part", "complete_multipart_upload"] {
            assert!(gateway.calls(operation) > 0, "{operation}");
            assert_eq!(gateway.keyed_calls(operation), gateway.calls(operation), "{operation}");
        }
        assert_eq!(gateway.calls("upload_part"), 3);
    }

    #[tokio::test]
    async fn upload_parts_grow_to_the_gateway_minimum() {
        let gateway = Arc::new(MemoryGateway::new().with_bucket("data").with_min_part_size(4096));
        let (engine, seen) = counting_engine(&gateway);
        let policy = TransferPolicy::new(1024, 1024, true).unwrap();
        let data = payload(10_000);

        let result = engine
            .upload(UploadSource::Bytes(data.clone()), "data", "grown.bin", &policy)
            .await;

        assert_eq!(success_totals(&result), (TransferStrategy::Multipart, 10_000, 10_000));
        assert_eq!(gateway.calls("upload_part"), 3);
        assert_eq!(seen.lock().unwrap().len(), 3);
        assert_eq!(gateway.object_bytes("data", "grown.bin").unwrap(), data);

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("grown.bin");
        let downloaded = engine.download("data", "grown.bin", &target, &policy).await;
        assert!(downloaded.is_success());
        assert_eq!(gateway.calls("get_object_range"), 10);
    }

    #[tokio::test]
    async fn failed_completion_aborts_the_upload() {
        let gateway = gateway();
        gateway.fail_on(
            "complete_multipart_upload",
            StorageError::Internal("InternalError".into()),
        );
        let engine = TransferEngine::new(gateway.clone());
        let policy = TransferPolicy::new(1024, 1024, true).unwrap();

        let result = engine
            .upload(UploadSource::Bytes(payload(4096)), "data", "unfinished.bin", &policy)
            .await;

        assert_eq!(error_kind(&result), ErrorKind::TransferFailure);
        assert_eq!(gateway.calls("upload_part"), 4);
        assert_eq!(gateway.calls("abort_multipart_upload"), 1);
        assert_eq!(gateway.pending_uploads(), 0);
        assert!(gateway.object_bytes("data", "unfinished.bin").is_none());
    }

    #[tokio::test]
    async fn failed_range_read_removes_the_partial_file() {
        let gateway = gateway();
        gateway.insert_object("data", "remote.bin", payload(8 * 1024));
        gateway.fail_on("get_object_range", StorageError::Internal("SlowDown".into()));
        let engine = TransferEngine::new(gateway.clone());
        let policy = TransferPolicy::new(1024, 1024, true).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("remote.bin");
        let result = engine.download("data", "remote.bin", &target, &policy).await;

        assert_eq!(error_kind(&result), ErrorKind::TransferFailure);
        assert!(gateway.calls("get_object_range") > 0);
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn missing_parameters_make_no_gateway_calls() {
        let gateway = gateway();
        let engine = TransferEngine::new(gateway.clone());
        let policy = TransferPolicy::new(1024, 1024, true).unwrap();

        let no_bucket = engine.upload(UploadSource::Bytes(payload(10)), "", "k", &policy).await;
        assert_eq!(error_kind(&no_bucket), ErrorKind::MissingParameter);

        let dir = tempfile::tempdir().unwrap();
        let no_key = engine.download("data", "  ", &dir.path().join("x"), &policy).await;
        assert_eq!(error_kind(&no_key), ErrorKind::MissingParameter);

        let zero_chunk: TransferPolicy = serde_json::from_str(
            r#"{"chunk_size_bytes": 0, "multipart_threshold_bytes": 10, "use_multiple_workers": true}"#,
        )
        .unwrap();
        let invalid = engine.upload(UploadSource::Bytes(payload(10)), "data", "k", &zero_chunk).await;
        assert_eq!(error_kind(&invalid), ErrorKind::MissingParameter);

        assert_eq!(gateway.total_calls(), 0);
    }

    #[tokio::test]
    async fn missing_object_and_bucket_are_not_found() {
        let gateway = gateway();
        let engine = TransferEngine::new(gateway.clone());
        let policy = TransferPolicy::new(1024, 1024, true).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let absent = engine.download("data", "nope", &dir.path().join("nope"), &policy).await;
        assert_eq!(error_kind(&absent), ErrorKind::NotFound);

        let no_bucket = engine
            .upload(UploadSource::Bytes(payload(10)), "elsewhere", "k", &policy)
            .await;
        assert_eq!(error_kind(&no_bucket), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn metadata_and_content_type_travel_with_multipart() {
        let gateway = gateway();
        let engine = TransferEngine::new(gateway.clone());
        let policy = TransferPolicy::new(1024, 1024, true).unwrap();
        let options = UploadOptions {
            metadata: HashMap::from([("origin".to_string(), "agent".to_string())]),
            content_type: Some("text/csv".to_string()),
        };

        let result = engine
            .upload_with_options(UploadSource::Bytes(payload(5000)), "data", "t.csv", &policy, options)
            .await;
        assert!(result.is_success());
        assert_eq!(
            gateway.object_metadata("data", "t.csv").unwrap().get("origin").map(String::as_str),
            Some("agent")
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_workers_share_the_load() {
        let gateway = Arc::new(MemoryGateway::new().with_bucket("data").with_worker_count(4));
        let records = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&records);
        let engine = TransferEngine::new(gateway.clone()).with_observer(move |_: &ProgressSnapshot| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let policy = TransferPolicy::new(4096, 4096, true).unwrap();

        let result = engine
            .upload(UploadSource::Bytes(payload(64 * 4096)), "data", "spread.bin", &policy)
            .await;

        let TransferResult::Success { per_worker_bytes, total_bytes, .. } = result else {
            panic!("upload failed");
        };
        assert_eq!(total_bytes, 64 * 4096);
        assert!(per_worker_bytes.keys().all(|&worker| worker < 4));
        assert_eq!(records.load(Ordering::SeqCst), 64);
    }
}
