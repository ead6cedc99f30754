//! Object-storage tools for chat agents.
//!
//! Buckets and objects on any S3-compatible store, multipart transfers with
//! per-worker progress tracking, and content-aware reads that decode CSV,
//! JSON, JSON Lines, text, Markdown and PDF objects.

pub mod config;
pub mod error;
pub mod gateway;
pub mod tools;
pub mod transfer;

pub use config::GatewayConfig;
pub use error::{ErrorKind, StorageError, StorageResult};
pub use gateway::{
    GatewayProvider, MemoryGateway, RequestParams, S3Gateway, S3GatewayProvider, SseCustomerKey,
    StorageGateway,
};
pub use object_parse::{parse, Format, ParseError, ParsedContent};
pub use tools::{S3Tools, ToolCall, ToolResponse};
pub use transfer::{
    ProgressObserver, ProgressSnapshot, ProgressTracker, TransferEngine, TransferPolicy,
    TransferResult, TransferStrategy, UploadOptions, UploadSource,
};
