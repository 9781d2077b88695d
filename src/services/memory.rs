// Process-local object store, used by the "memory" backend and in tests.
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use crate::errors::{StorageError, StorageResult};
use super::storage::{read_chunk, BucketInfo, ByteStream, ObjectInfo, ObjectReader, ObjectStorage};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
}

type Buckets = BTreeMap<String, BTreeMap<String, StoredObject>>;

#[derive(Clone, Default)]
pub struct InMemoryStorage {
    buckets: Arc<RwLock<Buckets>>,
}

impl InMemoryStorage {
    pub fn with_buckets(names: &[&str]) -> Self {
        let buckets = names
            .iter()
            .map(|name| (name.to_string(), BTreeMap::new()))
            .collect();
        Self {
            buckets: Arc::new(RwLock::new(buckets)),
        }
    }

    #[cfg(test)]
    pub async fn object(&self, bucket: &str, key: &str) -> Option<(Bytes, String)> {
        let buckets = self.buckets.read().await;
        buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| (object.data.clone(), object.content_type.clone()))
    }
}

fn bucket_not_found(name: &str) -> StorageError {
    StorageError::NotFound(format!("Bucket '{}' not found", name))
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn list_buckets(&self) -> StorageResult<Vec<String>> {
        Ok(self.buckets.read().await.keys().cloned().collect())
    }

    async fn get_bucket(&self, name: &str) -> StorageResult<BucketInfo> {
        if self.buckets.read().await.contains_key(name) {
            Ok(BucketInfo { name: name.to_string() })
        } else {
            Err(bucket_not_found(name))
        }
    }

    async fn create_bucket(&self, name: &str) -> StorageResult<BucketInfo> {
        let mut buckets = self.buckets.write().await;
        if buckets.contains_key(name) {
            return Err(StorageError::Conflict(format!("Bucket '{}' already exists", name)));
        }
        buckets.insert(name.to_string(), BTreeMap::new());
        Ok(BucketInfo { name: name.to_string() })
    }

    async fn delete_bucket(&self, name: &str) -> StorageResult<()> {
        let mut buckets = self.buckets.write().await;
        match buckets.get(name) {
            None => Err(bucket_not_found(name)),
            Some(objects) if !objects.is_empty() => {
                Err(StorageError::Conflict(format!("Bucket '{}' is not empty", name)))
            }
            Some(_) => {
                buckets.remove(name);
                Ok(())
            }
        }
    }

    async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<ObjectInfo>> {
        let buckets = self.buckets.read().await;
        let objects = buckets.get(bucket).ok_or_else(|| bucket_not_found(bucket))?;
        Ok(objects
            .iter()
            .map(|(name, object)| ObjectInfo {
                name: name.clone(),
                size: object.data.len() as u64,
            })
            .collect())
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        let buckets = self.buckets.read().await;
        let objects = buckets.get(bucket).ok_or_else(|| bucket_not_found(bucket))?;
        Ok(objects.contains_key(key))
    }

    async fn upload_streamed(
        &self,
        bucket: &str,
        key: &str,
        reader: ObjectReader<'_>,
        content_type: &str,
        chunk_size: usize,
    ) -> StorageResult<()> {
        // Fail before consuming the reader
        self.get_bucket(bucket).await?;

        let mut data = BytesMut::new();
        loop {
            let chunk = read_chunk(&mut *reader, chunk_size).await?;
            let done = chunk.len() < chunk_size;
            data.extend_from_slice(&chunk);
            if done {
                break;
            }
        }

        let mut buckets = self.buckets.write().await;
        let objects = buckets.get_mut(bucket).ok_or_else(|| bucket_not_found(bucket))?;
        objects.insert(
            key.to_string(),
            StoredObject {
                data: data.freeze(),
                content_type: content_type.to_string(),
            },
        );
        tracing::debug!("Stored {} in memory bucket {}", key, bucket);
        Ok(())
    }

    async fn download_stream(&self, bucket: &str, key: &str) -> StorageResult<ByteStream> {
        let buckets = self.buckets.read().await;
        let object = buckets
            .get(bucket)
            .ok_or_else(|| bucket_not_found(bucket))?
            .get(key)
            .ok_or_else(|| StorageError::NotFound(format!("Object '{}' not found in bucket '{}'", key, bucket)))?;

        tracing::debug!("Streaming {} ({}) from memory bucket {}", key, object.content_type, bucket);
        let data = object.data.clone();
        Ok(futures::stream::once(async move { Ok(data) }).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_bucket_lifecycle() {
        let storage = InMemoryStorage::default();
        storage.create_bucket("alpha").await.unwrap();
        assert!(matches!(
            storage.create_bucket("alpha").await,
            Err(StorageError::Conflict(_))
        ));
        assert_eq!(storage.list_buckets().await.unwrap(), vec!["alpha".to_string()]);

        storage.delete_bucket("alpha").await.unwrap();
        assert!(matches!(
            storage.delete_bucket("alpha").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.get_bucket("alpha").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_and_download() {
        let storage = InMemoryStorage::with_buckets(&["b"]);
        let payload = vec![7u8; 1000];
        let mut reader: &[u8] = &payload;

        storage
            .upload_streamed("b", "dir/blob.bin", &mut reader, "application/octet-stream", 256)
            .await
            .unwrap();

        assert!(storage.object_exists("b", "dir/blob.bin").await.unwrap());
        let objects = storage.list_objects("b").await.unwrap();
        assert_eq!(objects, vec![ObjectInfo { name: "dir/blob.bin".into(), size: 1000 }]);

        let chunks: Vec<Bytes> = storage
            .download_stream("b", "dir/blob.bin")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let downloaded: Vec<u8> = chunks.concat();
        assert_eq!(downloaded, payload);
    }

    #[tokio::test]
    async fn test_upload_to_missing_bucket() {
        let storage = InMemoryStorage::default();
        let mut reader: &[u8] = b"hello";
        let result = storage
            .upload_streamed("nope", "k", &mut reader, "text/plain", 256)
            .await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_non_empty_bucket_conflicts() {
        let storage = InMemoryStorage::with_buckets(&["b"]);
        let mut reader: &[u8] = b"hello";
        storage.upload_streamed("b", "k", &mut reader, "text/plain", 256).await.unwrap();

        assert!(matches!(storage.delete_bucket("b").await, Err(StorageError::Conflict(_))));
    }
}
