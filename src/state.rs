use std::sync::Arc;
use tokio::sync::RwLock;
use crate::config::Config;
use crate::services::ObjectStorage;
use crate::worker::UploadEngine;

/// Bucket that new uploads go to.
///
/// Handlers read it once per request and hand the name to whatever they
/// start, so switching buckets never redirects an upload already running.
#[derive(Clone)]
pub struct ActiveBucket(Arc<RwLock<String>>);

impl ActiveBucket {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::new(RwLock::new(name.into())))
    }

    pub async fn get(&self) -> String {
        self.0.read().await.clone()
    }

    pub async fn set(&self, name: String) {
        *self.0.write().await = name;
    }
}

// Application state shared between handlers
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn ObjectStorage>,
    pub engine: UploadEngine,
    pub active_bucket: ActiveBucket,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn templates_dir(&self) -> &str {
        &self.config.server.templates_dir
    }
}
