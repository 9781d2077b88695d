use serde::Deserialize;

// GCS resumable uploads require every non-final chunk to be a multiple of this.
const CHUNK_GRANULARITY: usize = 256 * 1024;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub templates_dir: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Gcs,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub default_bucket: String,
    #[serde(default)]
    pub project_id: String,
    pub api_base_url: String,
    // Falls back to the GCE metadata server when unset
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    pub max_file_size: usize,  // in bytes
    pub chunk_size: usize,     // in bytes, 10MiB by default
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        let chunk_size = self.upload.chunk_size;
        if chunk_size == 0 || chunk_size % CHUNK_GRANULARITY != 0 {
            return Err(config::ConfigError::Message(format!(
                "upload.chunk_size must be a non-zero multiple of {} bytes, got {}",
                CHUNK_GRANULARITY, chunk_size
            )));
        }

        if self.storage.backend == StorageBackend::Gcs && self.storage.project_id.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "storage.project_id is required for the gcs backend".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            templates_dir: "templates".into(),
        },
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            default_bucket: "test-bucket".into(),
            project_id: String::new(),
            api_base_url: "http://localhost".into(),
            access_token: None,
        },
        upload: UploadConfig {
            max_file_size: 64 * 1024 * 1024,
            chunk_size: CHUNK_GRANULARITY,
        },
    }
}
