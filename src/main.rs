mod models;
mod handlers;
mod services;
mod state;
mod templates;
mod worker;
mod config;
mod errors;
#[cfg(test)]
mod test_support;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
    extract::DefaultBodyLimit,
};
use tower_http::{
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;
use std::sync::Arc;
use crate::{
    config::{Config, StorageBackend},
    services::{GcsStorage, InMemoryStorage, ObjectStorage, TaskRegistry},
    state::{ActiveBucket, AppState},
    worker::UploadEngine,
};

// Create router with all routes
pub(crate) fn build_router(state: AppState) -> Router {
    let max_file_size = state.config.upload.max_file_size;

    Router::new()
        .route("/", get(handlers::serve_index))

        // Bucket routes
        .route("/select-active-bucket", get(handlers::select_active_bucket))
        .route("/set-active-bucket", post(handlers::set_active_bucket))
        .route("/create-bucket-form", get(handlers::serve_create_bucket_form))
        .route("/create-bucket", post(handlers::create_bucket))
        .route("/list-buckets", get(handlers::list_buckets))
        .route("/delete-bucket-form", get(handlers::serve_delete_bucket_form))
        .route("/delete-bucket", post(handlers::delete_bucket))

        // File routes
        .route("/upload-form", get(handlers::serve_upload_form))
        .route("/upload", post(handlers::upload_file))
        .route("/retrieve-files", get(handlers::retrieve_files))
        .route("/download-file/*filename", get(handlers::download_file))

        // Directory upload task routes
        .route("/upload-directory-form", get(handlers::serve_upload_directory_form))
        .route("/upload-directory", post(handlers::upload_directory))
        .route("/task-status/:task_id", get(handlers::get_task_status))
        .route("/tasks", get(handlers::list_tasks))

        // File upload limits from config
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_file_size))
        .layer(TraceLayer::new_for_http())

        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    let storage: Arc<dyn ObjectStorage> = match config.storage.backend {
        StorageBackend::Gcs => Arc::new(
            GcsStorage::new(&config.storage).context("Failed to create storage client")?,
        ),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; objects are lost on restart");
            Arc::new(InMemoryStorage::with_buckets(&[config.storage.default_bucket.as_str()]))
        }
    };

    let engine = UploadEngine::new(TaskRegistry::new(), storage.clone(), config.upload.chunk_size);
    let state = AppState {
        storage,
        engine,
        active_bucket: ActiveBucket::new(config.storage.default_bucket.clone()),
        config: Arc::new(config.clone()),
    };

    let app = build_router(state);

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    tracing::info!("Server running on {}", address);
    axum::serve(listener, app.into_make_service())
        .await
        .context("Server error")?;

    Ok(())
}
