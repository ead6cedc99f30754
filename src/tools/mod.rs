//! Agent-facing tools: bucket and object operations with status-tagged replies

mod service;
mod types;

pub use service::{S3Tools, DEFAULT_PRESIGNED_EXPIRATION_SECS, MAX_PRESIGNED_EXPIRATION_SECS};
pub use types::{
    BucketCreated, BucketList, DownloadedObject, FileContents, ObjectDeleted, ObjectList,
    PresignedUrl, ToolCall, ToolResponse, UploadReceipt,
};
