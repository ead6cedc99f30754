//! S3 list operations (buckets, objects)

use crate::error::{from_sdk_error, StorageResult};
use aws_sdk_s3::Client;
use log::debug;

pub(super) async fn list_buckets(client: &Client) -> StorageResult<Vec<String>> {
    let response = client
        .list_buckets()
        .send()
        .await
        .map_err(|e| from_sdk_error("Failed to list buckets", e))?;

    let buckets = response
        .buckets()
        .iter()
        .filter_map(|bucket| bucket.name().map(|name| name.to_string()))
        .collect();

    Ok(buckets)
}

/// Follows continuation tokens until the listing is exhausted.
pub(super) async fn list_objects(
    client: &Client,
    bucket: &str,
    prefix: &str,
) -> StorageResult<Vec<String>> {
    let mut keys: Vec<String> = Vec::new();
    let mut continuation_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let mut request = client.list_objects_v2().bucket(bucket).max_keys(1000);

        if !prefix.is_empty() {
            request = request.prefix(prefix);
        }
        if let Some(token) = &continuation_token {
            request = request.continuation_token(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| from_sdk_error(&format!("Failed to list objects in '{}'", bucket), e))?;
        pages += 1;

        keys.extend(
            response
                .contents()
                .iter()
                .filter_map(|obj| obj.key().map(|key| key.to_string())),
        );

        let is_truncated = response.is_truncated().unwrap_or(false);
        continuation_token = response.next_continuation_token().map(|s| s.to_string());
        if !is_truncated || continuation_token.is_none() {
            break;
        }
    }

    debug!(
        "list_objects: bucket={} prefix={} pages={} keys={}",
        bucket,
        prefix,
        pages,
        keys.len()
    );
    Ok(keys)
}
