use crate::error::{ErrorKind, StorageError};
use crate::transfer::{TransferResult, TransferStrategy, WorkerId};
use object_parse::ParsedContent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status-tagged reply of every tool: `{"status":"success", ...payload}` or
/// `{"status":"error","kind":..,"message":..}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolResponse<T> {
    Success(T),
    Error { kind: ErrorKind, message: String },
}

impl<T> ToolResponse<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolResponse::Success(_))
    }

    pub fn success(self) -> Option<T> {
        match self {
            ToolResponse::Success(payload) => Some(payload),
            ToolResponse::Error { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ToolResponse::Success(_) => None,
            ToolResponse::Error { kind, .. } => Some(*kind),
        }
    }
}

impl<T> From<StorageError> for ToolResponse<T> {
    fn from(err: StorageError) -> Self {
        ToolResponse::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketCreated {
    pub bucket: String,
    pub region: String,
    pub created: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketList {
    pub buckets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectList {
    pub bucket: String,
    pub prefix: String,
    pub objects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrl {
    pub url: String,
    pub expires_in: u64,
    /// RFC 3339 timestamp.
    pub expires_at: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileContents {
    pub bucket: String,
    pub key: String,
    pub format: String,
    pub data: ParsedContent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub bucket: String,
    pub key: String,
    pub message: String,
    pub strategy: TransferStrategy,
    pub size_bytes: u64,
    pub per_worker_bytes: BTreeMap<WorkerId, u64>,
}

impl UploadReceipt {
    pub(crate) fn from_transfer(
        bucket: &str,
        key: &str,
        file_name: &str,
        result: TransferResult,
    ) -> ToolResponse<Self> {
        match result {
            TransferResult::Success {
                strategy,
                total_bytes,
                per_worker_bytes,
            } => ToolResponse::Success(Self {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: format!("File '{}' uploaded to '{}/{}'", file_name, bucket, key),
                strategy,
                size_bytes: total_bytes,
                per_worker_bytes,
            }),
            TransferResult::Error { kind, message } => ToolResponse::Error { kind, message },
        }
    }
}

/// Object bytes returned inline, base64 encoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadedObject {
    pub bucket: String,
    pub key: String,
    pub file_name: String,
    pub content_type: String,
    pub file_size: u64,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectDeleted {
    pub bucket: String,
    pub key: String,
}

/// One tool invocation as the agent layer sends it, e.g.
/// `{"tool":"readFile","bucket":"docs","key":"a.csv"}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(
    tag = "tool",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ToolCall {
    CreateBucket {
        bucket: String,
        #[serde(default)]
        region: Option<String>,
    },
    ListBuckets {
        #[serde(default)]
        region: Option<String>,
    },
    ListObjects {
        bucket: String,
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        region: Option<String>,
    },
    GeneratePresignedUrl {
        bucket: String,
        key: String,
        #[serde(default)]
        expiration_seconds: Option<u64>,
        #[serde(default)]
        region: Option<String>,
    },
    ReadFile {
        bucket: String,
        key: String,
        #[serde(default)]
        region: Option<String>,
    },
    UploadBase64 {
        base64_data: String,
        #[serde(default)]
        filename: String,
        bucket: String,
        #[serde(default)]
        key: String,
        #[serde(default)]
        region: Option<String>,
    },
    UploadFile {
        local_path: String,
        bucket: String,
        #[serde(default)]
        key: Option<String>,
        #[serde(default)]
        region: Option<String>,
    },
    DownloadObject {
        bucket: String,
        key: String,
        #[serde(default)]
        region: Option<String>,
    },
    DeleteObject {
        bucket: String,
        key: String,
        #[serde(default)]
        region: Option<String>,
    },
}
