use super::policy::TransferStrategy;
use super::progress::WorkerId;
use crate::error::{ErrorKind, StorageError, StorageResult};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Bytes to upload: held in memory or read from a local file.
#[derive(Debug, Clone)]
pub enum UploadSource {
    Bytes(Vec<u8>),
    File(PathBuf),
}

impl From<Vec<u8>> for UploadSource {
    fn from(bytes: Vec<u8>) -> Self {
        UploadSource::Bytes(bytes)
    }
}

impl From<PathBuf> for UploadSource {
    fn from(path: PathBuf) -> Self {
        UploadSource::File(path)
    }
}

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub metadata: HashMap<String, String>,
    pub content_type: Option<String>,
}

/// Outcome of one transfer, tagged `"success"` / `"error"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TransferResult {
    Success {
        strategy: TransferStrategy,
        total_bytes: u64,
        per_worker_bytes: BTreeMap<WorkerId, u64>,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl TransferResult {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferResult::Success { .. })
    }
}

impl From<StorageError> for TransferResult {
    fn from(err: StorageError) -> Self {
        TransferResult::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Shareable view of an [`UploadSource`] handed to part workers.
#[derive(Debug, Clone)]
pub(crate) enum SourceReader {
    Bytes(Arc<Vec<u8>>),
    File { path: Arc<PathBuf>, len: u64 },
}

impl SourceReader {
    pub async fn open(source: UploadSource) -> StorageResult<Self> {
        match source {
            UploadSource::Bytes(bytes) => Ok(SourceReader::Bytes(Arc::new(bytes))),
            UploadSource::File(path) => {
                let metadata = tokio::fs::metadata(&path).await?;
                if !metadata.is_file() {
                    return Err(StorageError::NotFound(format!(
                        "'{}' is not a file",
                        path.display()
                    )));
                }
                Ok(SourceReader::File {
                    path: Arc::new(path),
                    len: metadata.len(),
                })
            }
        }
    }

    pub fn len(&self) -> u64 {
        match self {
            SourceReader::Bytes(bytes) => bytes.len() as u64,
            SourceReader::File { len, .. } => *len,
        }
    }

    pub async fn read_all(&self) -> StorageResult<Vec<u8>> {
        match self {
            SourceReader::Bytes(bytes) => Ok(bytes.as_ref().clone()),
            SourceReader::File { path, .. } => Ok(tokio::fs::read(path.as_ref()).await?),
        }
    }

    pub async fn read_range(&self, offset: u64, length: u64) -> StorageResult<Vec<u8>> {
        match self {
            SourceReader::Bytes(bytes) => {
                let start = offset as usize;
                let end = (offset + length) as usize;
                bytes.get(start..end).map(<[u8]>::to_vec).ok_or_else(|| {
                    StorageError::Internal(format!(
                        "range {}..{} outside {} source bytes",
                        start,
                        end,
                        bytes.len()
                    ))
                })
            }
            SourceReader::File { path, .. } => {
                let mut file = File::open(path.as_ref()).await?;
                file.seek(SeekFrom::Start(offset)).await?;
                let mut buffer = vec![0u8; length as usize];
                file.read_exact(&mut buffer).await?;
                Ok(buffer)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_serializes_with_status_tag() {
        let ok = TransferResult::Success {
            strategy: TransferStrategy::Multipart,
            total_bytes: 3,
            per_worker_bytes: BTreeMap::from([(0, 2), (1, 1)]),
        };
        let value = serde_json::to_value(&ok).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["strategy"], "multipart");
        assert_eq!(value["per_worker_bytes"]["1"], 1);

        let err: TransferResult = StorageError::NotFound("gone".into()).into();
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["kind"], "not_found");
        assert_eq!(value["message"], "not found: gone");
    }

    #[tokio::test]
    async fn reads_file_ranges() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.bin");
        tokio::fs::write(&path, b"abcdefghij").await.unwrap();

        let reader = SourceReader::open(UploadSource::File(path)).await.unwrap();
        assert_eq!(reader.len(), 10);
        assert_eq!(reader.read_range(3, 4).await.unwrap(), b"defg");
        assert_eq!(reader.read_all().await.unwrap(), b"abcdefghij");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = SourceReader::open(UploadSource::File(dir.path().join("absent")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn byte_ranges_past_end_fail() {
        let reader = SourceReader::open(UploadSource::Bytes(b"abc".to_vec())).await.unwrap();
        assert_eq!(reader.read_range(1, 2).await.unwrap(), b"bc");
        assert!(reader.read_range(2, 5).await.is_err());
    }
}
