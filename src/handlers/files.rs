use axum::{
    extract::{Multipart, Path, State},
    response::{Html, IntoResponse, Response},
    http::{StatusCode, header},
    body::Body,
};
use futures::TryStreamExt;
use std::io;
use tokio_util::io::StreamReader;
use urlencoding::encode;
use crate::errors::{AppError, AppResult, StorageError};
use crate::state::AppState;
use crate::templates::{escape_html, render};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let bucket = state.active_bucket.get().await;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to read multipart field: {}", e);
        AppError::Upload(format!("Failed to process form field: {}", e))
    })? {
        if field.name() != Some("file") {
            tracing::warn!("Unexpected form field: {:?}", field.name());
            continue;
        }

        let filename = field
            .file_name()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::Upload("Missing filename in upload".into()))?
            .to_string();
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        tracing::info!("Uploading {} ({}) to bucket {}", filename, content_type, bucket);

        // Stream the body straight through; it is never buffered whole
        let body = field.map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        let mut reader = StreamReader::new(Box::pin(body));
        state
            .storage
            .upload_streamed(&bucket, &filename, &mut reader, &content_type, state.config.upload.chunk_size)
            .await?;

        return Ok(Html(format!(
            "<h2>File '{}' uploaded successfully in chunks.</h2><p><a href='/'>Back to Home</a></p>",
            escape_html(&filename)
        ))
        .into_response());
    }

    Err(AppError::Upload("No file uploaded".into()))
}

pub async fn retrieve_files(State(state): State<AppState>) -> AppResult<Response> {
    let bucket = state.active_bucket.get().await;
    let objects = state.storage.list_objects(&bucket).await?;

    if objects.is_empty() {
        return Ok(Html(
            "<h2>No files found in the active bucket.</h2><p><a href='/'>Back to Home</a></p>",
        )
        .into_response());
    }

    let rows = objects
        .iter()
        .map(|object| {
            format!(
                r#"<li><a href="/download-file/{}">{}</a> ({} bytes)</li>"#,
                encode(&object.name),
                escape_html(&object.name),
                object.size
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let bucket = escape_html(&bucket);
    let html = render(
        state.templates_dir(),
        "retrieve_files.html",
        &[("bucket_name", bucket.as_str()), ("files", rows.as_str())],
    )
    .await?;
    Ok(Html(html).into_response())
}

pub async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> AppResult<Response> {
    let bucket = state.active_bucket.get().await;
    tracing::info!("Starting download of {} from bucket {}", filename, bucket);

    if !state.storage.object_exists(&bucket, &filename).await? {
        return Err(AppError::Storage(StorageError::NotFound(format!(
            "File '{}' not found in the bucket",
            filename
        ))));
    }

    let stream = state.storage.download_stream(&bucket, &filename).await?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, DEFAULT_CONTENT_TYPE)
        // Tell browser to download file instead of displaying it
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename*=utf-8''{}", encode(&filename)),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            AppError::Upload(format!("Failed to build download response: {}", e))
        })?;

    Ok(response)
}
