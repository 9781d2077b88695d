use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};
use crate::errors::StorageResult;

/// Streamed object body, as returned by [`ObjectStorage::download_stream`].
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// Source of bytes for [`ObjectStorage::upload_streamed`].
pub type ObjectReader<'a> = &'a mut (dyn AsyncRead + Send + Unpin);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketInfo {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub name: String,
    pub size: u64,
}

/// The object-storage operations the front-end relies on.
///
/// Buckets are addressed by name. Implementations report a missing bucket or
/// object as `StorageError::NotFound` and a taken bucket name as
/// `StorageError::Conflict`.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn list_buckets(&self) -> StorageResult<Vec<String>>;

    async fn get_bucket(&self, name: &str) -> StorageResult<BucketInfo>;

    async fn create_bucket(&self, name: &str) -> StorageResult<BucketInfo>;

    async fn delete_bucket(&self, name: &str) -> StorageResult<()>;

    async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<ObjectInfo>>;

    async fn object_exists(&self, bucket: &str, key: &str) -> StorageResult<bool>;

    /// Uploads everything `reader` yields, holding at most a couple of
    /// `chunk_size` buffers in memory at once.
    async fn upload_streamed(
        &self,
        bucket: &str,
        key: &str,
        reader: ObjectReader<'_>,
        content_type: &str,
        chunk_size: usize,
    ) -> StorageResult<()>;

    async fn download_stream(&self, bucket: &str, key: &str) -> StorageResult<ByteStream>;
}

/// Reads until `chunk_size` bytes are buffered or the reader is exhausted.
/// A chunk shorter than `chunk_size` therefore means end of input.
pub async fn read_chunk(reader: ObjectReader<'_>, chunk_size: usize) -> io::Result<Bytes> {
    let mut buf = vec![0u8; chunk_size];
    let mut filled = 0;
    while filled < chunk_size {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(Bytes::from(buf))
}
