//! Transfer policy and strategy selection

use crate::error::{StorageError, StorageResult};
use crate::gateway::SseCustomerKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a single object is moved.
///
/// There are no built-in size defaults: callers supply chunk size and
/// threshold explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPolicy {
    pub chunk_size_bytes: u64,
    pub multipart_threshold_bytes: u64,
    pub use_multiple_workers: bool,
    #[serde(default)]
    pub encryption_key: Option<SseCustomerKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStrategy {
    /// Workers disabled: one request, no chunking.
    SingleWorker,
    /// Below the multipart threshold (or empty): one request.
    Standard,
    /// Split into `chunk_size_bytes` parts moved by a worker pool.
    Multipart,
}

impl fmt::Display for TransferStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStrategy::SingleWorker => write!(f, "single_worker"),
            TransferStrategy::Standard => write!(f, "standard"),
            TransferStrategy::Multipart => write!(f, "multipart"),
        }
    }
}

impl TransferPolicy {
    pub fn new(
        chunk_size_bytes: u64,
        multipart_threshold_bytes: u64,
        use_multiple_workers: bool,
    ) -> StorageResult<Self> {
        let policy = Self {
            chunk_size_bytes,
            multipart_threshold_bytes,
            use_multiple_workers,
            encryption_key: None,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn with_encryption_key(mut self, key: SseCustomerKey) -> Self {
        self.encryption_key = Some(key);
        self
    }

    /// Fields are public and deserializable, so the engine re-checks them.
    pub fn validate(&self) -> StorageResult<()> {
        if self.chunk_size_bytes == 0 {
            return Err(StorageError::MissingParameter(
                "chunk_size_bytes must be positive".to_string(),
            ));
        }
        if self.multipart_threshold_bytes == 0 {
            return Err(StorageError::MissingParameter(
                "multipart_threshold_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn choose_strategy(&self, object_size: u64) -> TransferStrategy {
        if !self.use_multiple_workers {
            TransferStrategy::SingleWorker
        } else if object_size == 0 || object_size < self.multipart_threshold_bytes {
            TransferStrategy::Standard
        } else {
            TransferStrategy::Multipart
        }
    }
}

/// Byte ranges of a multipart transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PartPlan {
    pub total_bytes: u64,
    pub chunk_size: u64,
    pub part_count: u64,
}

impl PartPlan {
    pub fn new(total_bytes: u64, chunk_size: u64) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            total_bytes,
            chunk_size,
            part_count: total_bytes.div_ceil(chunk_size),
        }
    }

    /// `(offset, length)` of zero-based part `index`.
    pub fn range(&self, index: u64) -> (u64, u64) {
        let start = index * self.chunk_size;
        let end = (start + self.chunk_size).min(self.total_bytes);
        (start, end - start)
    }
}
