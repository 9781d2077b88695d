// Error types for each layer, built on thiserror.
use thiserror::Error;

pub mod response;
pub mod storage;
pub mod upload;

pub use storage::{StorageError, StorageResult};
pub use upload::{ErrorCode, UploadError};

#[derive(Error, Debug)]
pub enum AppError {
    // The #[from] attribute lets handlers use `?` on storage calls directly.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

// Custom result type
pub type AppResult<T> = Result<T, AppError>;
