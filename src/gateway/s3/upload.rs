//! S3 multipart upload primitives

use super::client::{metadata_of, SseHeaders};
use crate::error::{from_sdk_error, StorageError, StorageResult};
use crate::gateway::{CompletedPartInfo, RequestParams};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;

/// Initiate multipart upload
pub(super) async fn create_multipart_upload(
    client: &Client,
    bucket: &str,
    key: &str,
    params: &RequestParams,
) -> StorageResult<String> {
    let sse = SseHeaders::from_params(params);
    let response = client
        .create_multipart_upload()
        .bucket(bucket)
        .key(key)
        .set_content_type(params.content_type.clone())
        .set_metadata(metadata_of(params))
        .set_sse_customer_algorithm(sse.algorithm)
        .set_sse_customer_key(sse.key)
        .set_sse_customer_key_md5(sse.key_md5)
        .send()
        .await
        .map_err(|e| {
            from_sdk_error(
                &format!("Failed to start multipart upload to s3://{}/{}", bucket, key),
                e,
            )
        })?;

    let upload_id = response
        .upload_id()
        .ok_or_else(|| StorageError::Internal("No upload ID returned".to_string()))?
        .to_string();

    Ok(upload_id)
}

/// Upload a part in multipart upload
pub(super) async fn upload_part(
    client: &Client,
    bucket: &str,
    key: &str,
    upload_id: &str,
    part_number: i32,
    data: Vec<u8>,
    params: &RequestParams,
) -> StorageResult<String> {
    let sse = SseHeaders::from_params(params);
    let response = client
        .upload_part()
        .bucket(bucket)
        .key(key)
        .upload_id(upload_id)
        .part_number(part_number)
        .body(ByteStream::from(data))
        .set_sse_customer_algorithm(sse.algorithm)
        .set_sse_customer_key(sse.key)
        .set_sse_customer_key_md5(sse.key_md5)
        .send()
        .await
        .map_err(|e| {
            from_sdk_error(
                &format!("Failed to upload part {} of s3://{}/{}", part_number, bucket, key),
                e,
            )
        })?;

    Ok(response.e_tag().unwrap_or_default().to_string())
}

/// Complete multipart upload; `parts` must be sorted by part number.
pub(super) async fn complete_multipart_upload(
    client: &Client,
    bucket: &str,
    key: &str,
    upload_id: &str,
    parts: Vec<CompletedPartInfo>,
    params: &RequestParams,
) -> StorageResult<()> {
    let sse = SseHeaders::from_params(params);
    let completed_parts: Vec<CompletedPart> = parts
        .into_iter()
        .map(|part| {
            CompletedPart::builder()
                .part_number(part.part_number)
                .e_tag(part.etag)
                .build()
        })
        .collect();

    let completed_upload = CompletedMultipartUpload::builder()
        .set_parts(Some(completed_parts))
        .build();

    client
        .complete_multipart_upload()
        .bucket(bucket)
        .key(key)
        .upload_id(upload_id)
        .multipart_upload(completed_upload)
        .set_sse_customer_algorithm(sse.algorithm)
        .set_sse_customer_key(sse.key)
        .set_sse_customer_key_md5(sse.key_md5)
        .send()
        .await
        .map_err(|e| {
            from_sdk_error(
                &format!("Failed to complete multipart upload to s3://{}/{}", bucket, key),
                e,
            )
        })?;

    Ok(())
}

/// Abort multipart upload
pub(super) async fn abort_multipart_upload(
    client: &Client,
    bucket: &str,
    key: &str,
    upload_id: &str,
) -> StorageResult<()> {
    client
        .abort_multipart_upload()
        .bucket(bucket)
        .key(key)
        .upload_id(upload_id)
        .send()
        .await
        .map_err(|e| {
            from_sdk_error(
                &format!("Failed to abort multipart upload to s3://{}/{}", bucket, key),
                e,
            )
        })?;

    Ok(())
}
