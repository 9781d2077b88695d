// Google Cloud Storage backend over the JSON API.
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{header, redirect, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use urlencoding::encode;
use crate::config::StorageConfig;
use crate::errors::{StorageError, StorageResult};
use super::storage::{read_chunk, BucketInfo, ByteStream, ObjectInfo, ObjectReader, ObjectStorage};

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

// Refresh cached tokens this long before they actually expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct BucketResource {
    name: String,
}

#[derive(Deserialize)]
struct ObjectResource {
    name: String,
    // The JSON API encodes uint64 values as strings
    #[serde(default)]
    size: Option<String>,
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

struct TokenSource {
    fixed: Option<String>,
    cached: Mutex<Option<CachedToken>>,
}

#[derive(Clone)]
pub struct GcsStorage {
    client: Client,
    base_url: String,
    project_id: String,
    tokens: Arc<TokenSource>,
}

impl GcsStorage {
    pub fn new(config: &StorageConfig) -> StorageResult<Self> {
        // Resumable uploads answer 308 without a Location header; never follow it
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            tokens: Arc::new(TokenSource {
                fixed: config.access_token.clone().filter(|t| !t.is_empty()),
                cached: Mutex::new(None),
            }),
        })
    }

    fn buckets_url(&self) -> String {
        format!("{}/storage/v1/b", self.base_url)
    }

    fn bucket_url(&self, bucket: &str) -> String {
        format!("{}/storage/v1/b/{}", self.base_url, encode(bucket))
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/storage/v1/b/{}/o/{}", self.base_url, encode(bucket), encode(key))
    }

    fn upload_url(&self, bucket: &str) -> String {
        format!("{}/upload/storage/v1/b/{}/o", self.base_url, encode(bucket))
    }

    async fn access_token(&self) -> StorageResult<String> {
        if let Some(token) = &self.tokens.fixed {
            return Ok(token.clone());
        }

        let mut cached = self.tokens.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_EXPIRY_MARGIN {
                return Ok(token.value.clone());
            }
        }

        tracing::debug!("Fetching access token from metadata server");
        let response = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| StorageError::Auth(format!("Metadata server unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(StorageError::Auth(format!(
                "Metadata server returned {}",
                response.status()
            )));
        }

        let token: MetadataToken = response
            .json()
            .await
            .map_err(|e| StorageError::Auth(format!("Invalid token response: {}", e)))?;

        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(value)
    }

    async fn send(&self, request: RequestBuilder) -> StorageResult<Response> {
        let token = self.access_token().await?;
        Ok(request.bearer_auth(token).send().await?)
    }

    async fn list_pages<T>(&self, url: &str, query: &[(&str, &str)]) -> StorageResult<Vec<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.get(url).query(query);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = check(self.send(request).await?, url).await?;
            let page: ListResponse<T> = response.json().await?;
            items.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn start_resumable(&self, bucket: &str, key: &str, content_type: &str) -> StorageResult<String> {
        let request = self
            .client
            .post(self.upload_url(bucket))
            .query(&[("uploadType", "resumable"), ("name", key)])
            .header("X-Upload-Content-Type", content_type)
            .json(&json!({ "contentType": content_type }));

        let response = check(self.send(request).await?, &format!("Bucket '{}'", bucket)).await?;
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| StorageError::Api {
                status: response.status().as_u16(),
                message: "Resumable upload session has no Location header".into(),
            })
    }
}

// Maps non-success statuses onto StorageError. `what` names the resource.
async fn check(response: Response, what: &str) -> StorageResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND => StorageError::NotFound(format!("{} not found", what)),
        StatusCode::CONFLICT => StorageError::Conflict(format!("{} conflicts with existing state", what)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageError::Auth(message),
        _ => StorageError::Api { status: status.as_u16(), message },
    })
}

/// `Content-Range` value for one chunk of a resumable upload. The total size
/// is only known, and only sent, with the final chunk.
fn content_range(offset: u64, len: u64, last: bool) -> String {
    match (len, last) {
        (0, true) => format!("bytes */{}", offset),
        (_, true) => format!("bytes {}-{}/{}", offset, offset + len - 1, offset + len),
        (_, false) => format!("bytes {}-{}/*", offset, offset + len - 1),
    }
}

// Last byte the session has stored, from the `Range: bytes=0-<end>` header of a 308.
fn persisted_end(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(header::RANGE)?
        .to_str()
        .ok()?
        .strip_prefix("bytes=0-")?
        .parse()
        .ok()
}

#[async_trait]
impl ObjectStorage for GcsStorage {
    async fn list_buckets(&self) -> StorageResult<Vec<String>> {
        let buckets: Vec<BucketResource> = self
            .list_pages(&self.buckets_url(), &[("project", self.project_id.as_str())])
            .await?;
        Ok(buckets.into_iter().map(|b| b.name).collect())
    }

    async fn get_bucket(&self, name: &str) -> StorageResult<BucketInfo> {
        let request = self.client.get(self.bucket_url(name));
        let response = check(self.send(request).await?, &format!("Bucket '{}'", name)).await?;
        let bucket: BucketResource = response.json().await?;
        Ok(BucketInfo { name: bucket.name })
    }

    async fn create_bucket(&self, name: &str) -> StorageResult<BucketInfo> {
        let request = self
            .client
            .post(self.buckets_url())
            .query(&[("project", self.project_id.as_str())])
            .json(&json!({ "name": name }));
        let response = check(self.send(request).await?, &format!("Bucket '{}'", name)).await?;
        let bucket: BucketResource = response.json().await?;
        tracing::info!("Created bucket {}", bucket.name);
        Ok(BucketInfo { name: bucket.name })
    }

    async fn delete_bucket(&self, name: &str) -> StorageResult<()> {
        let request = self.client.delete(self.bucket_url(name));
        check(self.send(request).await?, &format!("Bucket '{}'", name)).await?;
        tracing::info!("Deleted bucket {}", name);
        Ok(())
    }

    async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<ObjectInfo>> {
        let url = format!("{}/o", self.bucket_url(bucket));
        let objects: Vec<ObjectResource> = self.list_pages(&url, &[]).await?;
        Ok(objects
            .into_iter()
            .map(|o| ObjectInfo {
                size: o.size.and_then(|s| s.parse().ok()).unwrap_or(0),
                name: o.name,
            })
            .collect())
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        let request = self.client.get(self.object_url(bucket, key));
        match check(self.send(request).await?, &format!("Object '{}'", key)).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn upload_streamed(
        &self,
        bucket: &str,
        key: &str,
        reader: ObjectReader<'_>,
        content_type: &str,
        chunk_size: usize,
    ) -> StorageResult<()> {
        let session = self.start_resumable(bucket, key, content_type).await?;
        tracing::debug!("Opened resumable session for {}/{}", bucket, key);

        // Read one chunk ahead so the final chunk can carry the total size
        let mut offset: u64 = 0;
        let mut current = read_chunk(&mut *reader, chunk_size).await?;
        loop {
            let next = if current.len() == chunk_size {
                read_chunk(&mut *reader, chunk_size).await?
            } else {
                bytes::Bytes::new()
            };
            let last = next.is_empty();
            let len = current.len() as u64;

            let request = self
                .client
                .put(&session)
                .header(header::CONTENT_RANGE, content_range(offset, len, last))
                .body(current);
            let response = self.send(request).await?;
            let status = response.status();

            if last {
                check(response, &format!("Object '{}'", key)).await?;
                break;
            }
            if status != StatusCode::PERMANENT_REDIRECT {
                let message = response.text().await.unwrap_or_default();
                return Err(StorageError::Api { status: status.as_u16(), message });
            }

            let expected = offset + len - 1;
            match persisted_end(&response) {
                Some(end) if end == expected => {}
                persisted => {
                    return Err(StorageError::Api {
                        status: status.as_u16(),
                        message: format!(
                            "Upload of '{}' persisted up to byte {:?}, expected {}",
                            key, persisted, expected
                        ),
                    });
                }
            }

            tracing::trace!("Uploaded {} bytes of {}", offset + len, key);
            offset += len;
            current = next;
        }

        tracing::info!("Uploaded {}/{}", bucket, key);
        Ok(())
    }

    async fn download_stream(&self, bucket: &str, key: &str) -> StorageResult<ByteStream> {
        let request = self
            .client
            .get(self.object_url(bucket, key))
            .query(&[("alt", "media")]);
        let response = check(self.send(request).await?, &format!("Object '{}'", key)).await?;

        Ok(response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
            .boxed())
    }
}
