use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use crate::errors::{StorageError, UploadError};
use crate::models::{FileOutcome, Task, TaskStatus};
use crate::services::{ObjectStorage, TaskRegistry};
use super::walker::{object_key, root_name, DirectoryWalker, WalkEntry};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Runs directory uploads in the background and records their progress in
/// the task registry.
#[derive(Clone)]
pub struct UploadEngine {
    registry: TaskRegistry,
    storage: Arc<dyn ObjectStorage>,
    chunk_size: usize,
}

impl UploadEngine {
    pub fn new(registry: TaskRegistry, storage: Arc<dyn ObjectStorage>, chunk_size: usize) -> Self {
        Self { registry, storage, chunk_size }
    }

    /// Registers a pending task and spawns its run. The returned id can be
    /// polled immediately; nothing here waits on a transfer.
    pub async fn submit(&self, bucket: String, directory_path: String) -> String {
        let task_id = uuid::Uuid::new_v4().to_string();

        self.registry
            .create(Task::new(task_id.clone(), bucket.clone(), directory_path.clone()))
            .await;

        tracing::info!(
            "Submitted task {} for {} into bucket {}",
            task_id,
            directory_path,
            bucket
        );

        let engine = self.clone();
        let id = task_id.clone();
        tokio::spawn(async move {
            engine.supervise(id, bucket, directory_path).await;
        });

        task_id
    }

    pub async fn task_status(&self, task_id: &str) -> Option<Task> {
        self.registry.read(task_id).await
    }

    pub async fn all_tasks(&self) -> HashMap<String, Task> {
        self.registry.read_all().await
    }

    // Runs the upload in its own task so that a panic surfaces here as a
    // JoinError and is recorded instead of killing the run silently.
    async fn supervise(self, task_id: String, bucket: String, directory_path: String) {
        let engine = self.clone();
        let id = task_id.clone();
        let result = tokio::spawn(async move {
            engine.run(&id, &bucket, Path::new(&directory_path)).await
        })
        .await;

        let status = match result {
            Ok(Ok(count)) => {
                tracing::info!("Task {} completed, {} files processed", task_id, count);
                TaskStatus::Completed
            }
            Ok(Err(e)) => {
                tracing::error!("Task {} failed [{}]: {}", task_id, e.code(), e);
                TaskStatus::failed(&e)
            }
            Err(e) => {
                tracing::error!("Task {} panicked: {}", task_id, e);
                TaskStatus::failed(&UploadError::TaskPanic(e.to_string()))
            }
        };

        self.registry
            .mutate(&task_id, |task| task.advance(status))
            .await;
    }

    async fn run(&self, task_id: &str, bucket: &str, root: &Path) -> Result<usize, UploadError> {
        self.registry
            .mutate(task_id, |task| task.advance(TaskStatus::Processing))
            .await;

        let mut walker = DirectoryWalker::open(root).await?;
        let prefix = root_name(root).await?;
        tracing::debug!("Task {} uploading {} under prefix {}", task_id, root.display(), prefix);

        let mut processed = 0;
        loop {
            let (next_walker, entry) = walker.next_entry().await?;
            walker = next_walker;
            let Some(entry) = entry else { break };

            let outcome = self.upload_file(bucket, &prefix, &entry).await;
            self.registry
                .mutate(task_id, |task| task.push_file(outcome))
                .await;
            processed += 1;
        }

        Ok(processed)
    }

    async fn upload_file(&self, bucket: &str, prefix: &str, entry: &WalkEntry) -> FileOutcome {
        let filename = entry
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_type = mime_guess::from_path(&entry.path)
            .first_raw()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let key = object_key(prefix, &entry.relative);

        match self.transfer(bucket, &key, &entry.path, &file_type).await {
            Ok(()) => {
                tracing::debug!("Uploaded {} as {}", entry.path.display(), key);
                FileOutcome::uploaded(filename, file_type, key)
            }
            Err(e) => {
                tracing::warn!("Failed to upload {} [{}]: {}", entry.path.display(), e.code(), e);
                FileOutcome::failed(filename, file_type, &e)
            }
        }
    }

    async fn transfer(&self, bucket: &str, key: &str, path: &Path, content_type: &str) -> Result<(), UploadError> {
        let mut file = File::open(path).await.map_err(|source| UploadError::Open {
            path: path.display().to_string(),
            source,
        })?;

        self.storage
            .upload_streamed(bucket, key, &mut file, content_type, self.chunk_size)
            .await
            .map_err(|e| match e {
                StorageError::Io(source) => UploadError::Read {
                    path: path.display().to_string(),
                    source,
                },
                other => other.into(),
            })
    }
}
