// Shared fixtures for unit tests.
use async_trait::async_trait;
use axum::response::Response;
use std::sync::Arc;
use std::time::Duration;
use crate::config::test_config;
use crate::errors::{StorageError, StorageResult};
use crate::models::Task;
use crate::services::storage::{BucketInfo, ByteStream, ObjectInfo, ObjectReader};
use crate::services::{InMemoryStorage, ObjectStorage, TaskRegistry};
use crate::state::{ActiveBucket, AppState};
use crate::worker::UploadEngine;

/// Wraps an in-memory store and runs `before_upload` with each upload key.
/// An error from the hook fails that upload.
pub struct HookedStorage<F> {
    pub inner: InMemoryStorage,
    pub before_upload: F,
}

/// Rejects uploads whose key ends with `suffix`, as a storage outage would.
pub fn failing_storage(
    inner: InMemoryStorage,
    suffix: &str,
) -> HookedStorage<impl Fn(&str) -> StorageResult<()> + Send + Sync + 'static> {
    let suffix = suffix.to_string();
    HookedStorage {
        inner,
        before_upload: move |key: &str| {
            if key.ends_with(&suffix) {
                return Err(StorageError::Api {
                    status: 503,
                    message: "simulated outage".into(),
                });
            }
            Ok(())
        },
    }
}

#[async_trait]
impl<F> ObjectStorage for HookedStorage<F>
where
    F: Fn(&str) -> StorageResult<()> + Send + Sync + 'static,
{
    async fn list_buckets(&self) -> StorageResult<Vec<String>> {
        self.inner.list_buckets().await
    }

    async fn get_bucket(&self, name: &str) -> StorageResult<BucketInfo> {
        self.inner.get_bucket(name).await
    }

    async fn create_bucket(&self, name: &str) -> StorageResult<BucketInfo> {
        self.inner.create_bucket(name).await
    }

    async fn delete_bucket(&self, name: &str) -> StorageResult<()> {
        self.inner.delete_bucket(name).await
    }

    async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<ObjectInfo>> {
        self.inner.list_objects(bucket).await
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        self.inner.object_exists(bucket, key).await
    }

    async fn upload_streamed(
        &self,
        bucket: &str,
        key: &str,
        reader: ObjectReader<'_>,
        content_type: &str,
        chunk_size: usize,
    ) -> StorageResult<()> {
        (self.before_upload)(key)?;
        self.inner
            .upload_streamed(bucket, key, reader, content_type, chunk_size)
            .await
    }

    async fn download_stream(&self, bucket: &str, key: &str) -> StorageResult<ByteStream> {
        self.inner.download_stream(bucket, key).await
    }
}

pub const TEST_CHUNK_SIZE: usize = 256 * 1024;

pub fn engine_with(storage: Arc<dyn ObjectStorage>) -> UploadEngine {
    UploadEngine::new(TaskRegistry::new(), storage, TEST_CHUNK_SIZE)
}

/// Polls until the task reaches a terminal status.
pub async fn wait_for_task(engine: &UploadEngine, task_id: &str) -> Task {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Some(task) = engine.task_status(task_id).await {
                if task.status.is_terminal() {
                    return task;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("task did not finish in time")
}

/// App state over `storage` with "test-bucket" active and the repo templates.
pub fn test_state(storage: Arc<dyn ObjectStorage>) -> AppState {
    let config = test_config();
    AppState {
        engine: engine_with(storage.clone()),
        storage,
        active_bucket: ActiveBucket::new(config.storage.default_bucket.clone()),
        config: Arc::new(config),
    }
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
