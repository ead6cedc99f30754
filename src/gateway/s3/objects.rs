//! S3 bucket and object operations (head, create, get, put, delete)

use super::client::{metadata_of, SseHeaders};
use crate::error::{from_sdk_error, StorageError, StorageResult};
use crate::gateway::{ObjectHead, RequestParams, DEFAULT_CONTENT_TYPE};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;

pub(super) async fn head_bucket(client: &Client, bucket: &str) -> StorageResult<()> {
    client
        .head_bucket()
        .bucket(bucket)
        .send()
        .await
        .map_err(|e| from_sdk_error(&format!("Bucket '{}' is not accessible", bucket), e))?;
    Ok(())
}

/// `us-east-1` rejects an explicit location constraint, every other region needs one.
pub(super) async fn create_bucket(client: &Client, bucket: &str, region: &str) -> StorageResult<()> {
    let mut request = client.create_bucket().bucket(bucket);

    if region != "us-east-1" {
        let configuration = CreateBucketConfiguration::builder()
            .location_constraint(BucketLocationConstraint::from(region))
            .build();
        request = request.create_bucket_configuration(configuration);
    }

    request
        .send()
        .await
        .map_err(|e| from_sdk_error(&format!("Failed to create bucket '{}'", bucket), e))?;
    Ok(())
}

pub(super) async fn head_object(
    client: &Client,
    bucket: &str,
    key: &str,
    params: &RequestParams,
) -> StorageResult<ObjectHead> {
    let sse = SseHeaders::from_params(params);
    let response = client
        .head_object()
        .bucket(bucket)
        .key(key)
        .set_sse_customer_algorithm(sse.algorithm)
        .set_sse_customer_key(sse.key)
        .set_sse_customer_key_md5(sse.key_md5)
        .send()
        .await
        .map_err(|e| from_sdk_error(&format!("Failed to stat s3://{}/{}", bucket, key), e))?;

    Ok(ObjectHead {
        size: response.content_length().unwrap_or(0).max(0) as u64,
        content_type: response
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string(),
    })
}

pub(super) async fn get_object(
    client: &Client,
    bucket: &str,
    key: &str,
    range: Option<(u64, u64)>,
    params: &RequestParams,
) -> StorageResult<Vec<u8>> {
    let sse = SseHeaders::from_params(params);
    let response = client
        .get_object()
        .bucket(bucket)
        .key(key)
        .set_range(range.map(|(start, end)| format!("bytes={}-{}", start, end)))
        .set_sse_customer_algorithm(sse.algorithm)
        .set_sse_customer_key(sse.key)
        .set_sse_customer_key_md5(sse.key_md5)
        .send()
        .await
        .map_err(|e| from_sdk_error(&format!("Failed to get s3://{}/{}", bucket, key), e))?;

    let body = response.body.collect().await.map_err(|e| {
        StorageError::TransferFailure(format!("Failed to read s3://{}/{}: {}", bucket, key, e))
    })?;

    Ok(body.into_bytes().to_vec())
}

pub(super) async fn put_object(
    client: &Client,
    bucket: &str,
    key: &str,
    body: Vec<u8>,
    params: &RequestParams,
) -> StorageResult<()> {
    let sse = SseHeaders::from_params(params);
    client
        .put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(body))
        .set_content_type(params.content_type.clone())
        .set_metadata(metadata_of(params))
        .set_sse_customer_algorithm(sse.algorithm)
        .set_sse_customer_key(sse.key)
        .set_sse_customer_key_md5(sse.key_md5)
        .send()
        .await
        .map_err(|e| from_sdk_error(&format!("Failed to put s3://{}/{}", bucket, key), e))?;
    Ok(())
}

pub(super) async fn delete_object(client: &Client, bucket: &str, key: &str) -> StorageResult<()> {
    client
        .delete_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| from_sdk_error(&format!("Failed to delete s3://{}/{}", bucket, key), e))?;
    Ok(())
}
