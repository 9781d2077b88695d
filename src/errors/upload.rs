use serde::Serialize;
use std::{fmt, io};
use thiserror::Error;
use super::StorageError;

/// Stable, machine-readable classification of an upload failure.
///
/// Failure messages embed free text from the OS or the storage service, so
/// clients should match on the code instead.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    DirectoryNotFound,
    NotADirectory,
    EmptyPrefix,
    OpenFailed,
    ReadFailed,
    StorageError,
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ErrorCode::DirectoryNotFound => "directory_not_found",
            ErrorCode::NotADirectory => "not_a_directory",
            ErrorCode::EmptyPrefix => "empty_prefix",
            ErrorCode::OpenFailed => "open_failed",
            ErrorCode::ReadFailed => "read_failed",
            ErrorCode::StorageError => "storage_error",
            ErrorCode::Internal => "internal",
        };
        f.write_str(code)
    }
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Directory '{0}' does not exist")]
    DirectoryNotFound(String),

    #[error("'{0}' is not a directory")]
    NotADirectory(String),

    #[error("Cannot derive an upload prefix from '{0}'")]
    EmptyPrefix(String),

    #[error("Failed to open '{path}': {source}")]
    Open { path: String, source: io::Error },

    #[error("Failed to read '{path}': {source}")]
    Read { path: String, source: io::Error },

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Task panicked: {0}")]
    TaskPanic(String),
}

impl UploadError {
    pub fn code(&self) -> ErrorCode {
        match self {
            UploadError::DirectoryNotFound(_) => ErrorCode::DirectoryNotFound,
            UploadError::NotADirectory(_) => ErrorCode::NotADirectory,
            UploadError::EmptyPrefix(_) => ErrorCode::EmptyPrefix,
            UploadError::Open { .. } => ErrorCode::OpenFailed,
            UploadError::Read { .. } => ErrorCode::ReadFailed,
            UploadError::Storage(StorageError::Io(_)) => ErrorCode::ReadFailed,
            UploadError::Storage(_) => ErrorCode::StorageError,
            UploadError::TaskPanic(_) => ErrorCode::Internal,
        }
    }
}

impl From<StorageError> for UploadError {
    fn from(err: StorageError) -> Self {
        UploadError::Storage(err)
    }
}
