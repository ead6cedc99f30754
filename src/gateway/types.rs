//! Request and response types shared by every gateway

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Customer-supplied server-side encryption key (SSE-C).
///
/// Opaque bytes; serialized as base64. Debug output never shows the key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SseCustomerKey(Vec<u8>);

impl SseCustomerKey {
    pub const ALGORITHM: &'static str = "AES256";

    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn from_base64(encoded: &str) -> Result<Self, base64::DecodeError> {
        BASE64.decode(encoded.trim()).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn key_base64(&self) -> String {
        BASE64.encode(&self.0)
    }

    /// Base64 of the key's MD5 digest, sent alongside the key.
    pub fn key_md5_base64(&self) -> String {
        BASE64.encode(md5::compute(&self.0).0)
    }
}

impl fmt::Debug for SseCustomerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SseCustomerKey(<{} bytes>)", self.0.len())
    }
}

impl TryFrom<String> for SseCustomerKey {
    type Error = base64::DecodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_base64(&value)
    }
}

impl From<SseCustomerKey> for String {
    fn from(key: SseCustomerKey) -> Self {
        key.key_base64()
    }
}

/// Per-request extras: SSE-C key, user metadata, content type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    pub encryption_key: Option<SseCustomerKey>,
    pub metadata: HashMap<String, String>,
    pub content_type: Option<String>,
}

impl RequestParams {
    pub fn with_encryption_key(encryption_key: Option<SseCustomerKey>) -> Self {
        Self {
            encryption_key,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectHead {
    pub size: u64,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPartInfo {
    pub part_number: i32,
    pub etag: String,
}

pub(crate) const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
