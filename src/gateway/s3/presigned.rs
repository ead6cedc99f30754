use crate::error::{from_sdk_error, StorageError, StorageResult};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use std::time::Duration;

pub(super) async fn generate_presigned_url(
    client: &Client,
    bucket: &str,
    key: &str,
    expires_in: Duration,
) -> StorageResult<String> {
    let presigning_config = PresigningConfig::builder()
        .expires_in(expires_in)
        .build()
        .map_err(|e| StorageError::Internal(format!("Invalid presigning config: {}", e)))?;

    let presigned_request = client
        .get_object()
        .bucket(bucket)
        .key(key)
        .presigned(presigning_config)
        .await
        .map_err(|e| {
            from_sdk_error(
                &format!("Failed to generate download URL for s3://{}/{}", bucket, key),
                e,
            )
        })?;

    Ok(presigned_request.uri().to_string())
}
