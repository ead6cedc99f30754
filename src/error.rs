//! Error taxonomy shared by the gateway, the transfer engine and the tools

use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use object_parse::ParseError;
use serde::{Deserialize, Serialize};

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("unsupported file type: {suffix}")]
    UnsupportedFormat { suffix: String },

    #[error("malformed content: {0}")]
    MalformedContent(String),

    #[error("transfer failed: {0}")]
    TransferFailure(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Serializable discriminant of [`StorageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingParameter,
    NotFound,
    PermissionDenied,
    UnsupportedFormat,
    MalformedContent,
    TransferFailure,
    InternalError,
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::MissingParameter(_) => ErrorKind::MissingParameter,
            StorageError::NotFound(_) => ErrorKind::NotFound,
            StorageError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            StorageError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            StorageError::MalformedContent(_) => ErrorKind::MalformedContent,
            StorageError::TransferFailure(_) => ErrorKind::TransferFailure,
            StorageError::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Uncategorized gateway faults seen mid-transfer are transfer failures.
    pub(crate) fn into_transfer_failure(self) -> Self {
        match self {
            StorageError::Internal(message) => StorageError::TransferFailure(message),
            other => other,
        }
    }
}

impl From<ParseError> for StorageError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::UnsupportedFormat { suffix } => StorageError::UnsupportedFormat { suffix },
            malformed @ ParseError::Malformed { .. } => {
                StorageError::MalformedContent(malformed.to_string())
            }
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(err.to_string()),
            std::io::ErrorKind::PermissionDenied => StorageError::PermissionDenied(err.to_string()),
            _ => StorageError::TransferFailure(err.to_string()),
        }
    }
}

/// Reject blank required parameters before any gateway call. The value
/// itself is returned untouched: S3 keys may start or end with spaces.
pub(crate) fn require<'a>(value: &'a str, name: &str) -> StorageResult<&'a str> {
    if value.trim().is_empty() {
        return Err(StorageError::MissingParameter(format!("'{}' is required", name)));
    }
    Ok(value)
}

/// Translate an S3 SDK error into the taxonomy.
pub(crate) fn from_sdk_error<E>(context: &str, err: SdkError<E, HttpResponse>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = format!("{}: {}", context, DisplayErrorContext(&err));
    if matches!(
        err,
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_)
    ) {
        return StorageError::TransferFailure(message);
    }

    let status = err.raw_response().map(|response| response.status().as_u16());
    classify(err.code(), status, message)
}

fn classify(code: Option<&str>, status: Option<u16>, message: String) -> StorageError {
    match (code, status) {
        (Some("NoSuchKey" | "NoSuchBucket" | "NoSuchUpload" | "NotFound"), _) | (_, Some(404)) => {
            StorageError::NotFound(message)
        }
        (
            Some(
                "AccessDenied" | "Forbidden" | "InvalidAccessKeyId" | "SignatureDoesNotMatch"
                | "AllAccessDisabled",
            ),
            _,
        )
        | (_, Some(403)) => StorageError::PermissionDenied(message),
        _ => StorageError::Internal(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_code_and_status() {
        assert!(matches!(
            classify(Some("NoSuchKey"), Some(404), "m".into()),
            StorageError::NotFound(_)
        ));
        assert!(matches!(
            classify(None, Some(404), "m".into()),
            StorageError::NotFound(_)
        ));
        assert!(matches!(
            classify(Some("AccessDenied"), None, "m".into()),
            StorageError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify(Some("Whatever"), Some(403), "m".into()),
            StorageError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify(Some("InternalError"), Some(500), "m".into()),
            StorageError::Internal(_)
        ));
    }

    #[test]
    fn parse_errors_map_to_taxonomy() {
        let unsupported: StorageError = ParseError::UnsupportedFormat {
            suffix: "xyz".into(),
        }
        .into();
        assert_eq!(
            unsupported,
            StorageError::UnsupportedFormat {
                suffix: "xyz".into()
            }
        );

        let malformed: StorageError = object_parse::parse(b"{", "a.json").unwrap_err().into();
        assert_eq!(malformed.kind(), ErrorKind::MalformedContent);
    }

    #[test]
    fn internal_becomes_transfer_failure_only() {
        assert_eq!(
            StorageError::Internal("x".into()).into_transfer_failure(),
            StorageError::TransferFailure("x".into())
        );
        assert_eq!(
            StorageError::NotFound("x".into()).into_transfer_failure(),
            StorageError::NotFound("x".into())
        );
    }

    #[test]
    fn require_rejects_blank() {
        assert_eq!(require("bucket", "bucket").unwrap(), "bucket");
        assert_eq!(require(" notes.txt ", "key").unwrap(), " notes.txt ");
        assert_eq!(
            require("  ", "key").unwrap_err().kind(),
            ErrorKind::MissingParameter
        );
    }

    #[test]
    fn kind_serializes_snake_case() {
        let value = serde_json::to_value(ErrorKind::UnsupportedFormat).unwrap();
        assert_eq!(value, serde_json::json!("unsupported_format"));
    }
}
