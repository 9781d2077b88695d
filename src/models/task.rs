use serde::{Serialize, Serializer};
use chrono::{DateTime, Utc};
use std::fmt;
use crate::errors::{ErrorCode, UploadError};

// Task lifecycle: Pending -> Processing -> Completed | Failed
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed { code: ErrorCode, message: String },
}

impl TaskStatus {
    pub fn failed(err: &UploadError) -> Self {
        TaskStatus::Failed { code: err.code(), message: err.to_string() }
    }

    fn stage(&self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Processing => 1,
            TaskStatus::Completed | TaskStatus::Failed { .. } => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage() == 2
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            TaskStatus::Failed { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => f.write_str("pending"),
            TaskStatus::Processing => f.write_str("processing"),
            TaskStatus::Completed => f.write_str("completed"),
            TaskStatus::Failed { message, .. } => write!(f, "failed: {}", message),
        }
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileStatus {
    Uploaded,
    Failed { code: ErrorCode, message: String },
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Uploaded => f.write_str("uploaded"),
            FileStatus::Failed { message, .. } => write!(f, "failed: {}", message),
        }
    }
}

impl Serialize for FileStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Result of uploading one discovered file. Never modified once appended.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub filename: String,
    pub file_type: String,
    pub status: FileStatus,
    pub gcs_path: Option<String>,
}

impl FileOutcome {
    pub fn uploaded(filename: String, file_type: String, gcs_path: String) -> Self {
        Self {
            filename,
            file_type,
            status: FileStatus::Uploaded,
            gcs_path: Some(gcs_path),
        }
    }

    pub fn failed(filename: String, file_type: String, err: &UploadError) -> Self {
        Self {
            filename,
            file_type,
            status: FileStatus::Failed { code: err.code(), message: err.to_string() },
            gcs_path: None,
        }
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match &self.status {
            FileStatus::Failed { code, .. } => Some(*code),
            FileStatus::Uploaded => None,
        }
    }
}

#[derive(Serialize)]
struct FileOutcomeView<'a> {
    filename: &'a str,
    file_type: &'a str,
    status: &'a FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<ErrorCode>,
    gcs_path: Option<&'a str>,
}

impl Serialize for FileOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        FileOutcomeView {
            filename: &self.filename,
            file_type: &self.file_type,
            status: &self.status,
            error_code: self.error_code(),
            gcs_path: self.gcs_path.as_deref(),
        }
        .serialize(serializer)
    }
}

#[derive(Debug, Clone)]
pub struct Task {
    pub task_id: String,
    pub bucket: String,
    pub directory_path: String,
    pub status: TaskStatus,
    pub files: Vec<FileOutcome>,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(task_id: String, bucket: String, directory_path: String) -> Self {
        Self {
            task_id,
            bucket,
            directory_path,
            status: TaskStatus::Pending,
            files: Vec::new(),
            submitted_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Moves the task forward. Returns false, leaving the task untouched, if
    /// `next` is not strictly later than the current stage.
    pub fn advance(&mut self, next: TaskStatus) -> bool {
        if next.stage() <= self.status.stage() {
            tracing::warn!(
                "Rejected status change for task {} from {} to {}",
                self.task_id,
                self.status,
                next
            );
            return false;
        }

        if next == TaskStatus::Processing {
            self.files.clear();
        }
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        self.status = next;
        true
    }

    /// Appends a file outcome; only a processing task accepts new files.
    pub fn push_file(&mut self, outcome: FileOutcome) -> bool {
        if self.status != TaskStatus::Processing {
            tracing::warn!(
                "Dropped file outcome for {} on task {} in status {}",
                outcome.filename,
                self.task_id,
                self.status
            );
            return false;
        }
        self.files.push(outcome);
        true
    }
}

#[derive(Serialize)]
struct TaskView<'a> {
    task_id: &'a str,
    bucket: &'a str,
    directory_path: &'a str,
    status: &'a TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<ErrorCode>,
    files: &'a [FileOutcome],
    submitted_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl Serialize for Task {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TaskView {
            task_id: &self.task_id,
            bucket: &self.bucket,
            directory_path: &self.directory_path,
            status: &self.status,
            error_code: self.status.error_code(),
            files: &self.files,
            submitted_at: self.submitted_at,
            completed_at: self.completed_at,
        }
        .serialize(serializer)
    }
}
