use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::storage::template::ObjectStore;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendConfigs {
    /// Any S3 compatible blob storage.
    Blob {
        /// The bucket name.
        name: String,

        /// The bucket region, when `endpoint` is set this may be any name.
        #[serde(default = "default_region")]
        region: String,

        /// A custom endpoint URL, e.g. a MinIO instance.
        #[serde(default)]
        endpoint: Option<String>,

        /// The access key id, uses the default credential chain if missing.
        #[serde(default)]
        access_key: Option<String>,

        /// The secret access key, uses the default credential chain if missing.
        #[serde(default)]
        secret_key: Option<String>,

        /// The request timeout in seconds.
        #[serde(default)]
        request_timeout: Option<u64>,
    },
    FileSystem {
        directory: PathBuf,
    },
    Memory,
}

impl BackendConfigs {
    pub async fn connect(&self) -> anyhow::Result<Arc<dyn ObjectStore>> {
        match self {
            Self::Blob {
                name,
                region,
                endpoint,
                access_key,
                secret_key,
                request_timeout,
            } => {
                let backend = super::blob_storage::BlobStorageBackend::new(
                    name.clone(),
                    region.clone(),
                    endpoint.clone(),
                    access_key.as_deref(),
                    secret_key.as_deref(),
                    request_timeout.map(Duration::from_secs),
                )?;

                Ok(Arc::new(backend))
            },
            Self::FileSystem { directory } => {
                Ok(Arc::new(super::filesystem::FileSystemBackend::new(directory.clone())))
            },
            Self::Memory => Ok(Arc::new(super::memory::MemoryBackend::new())),
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}
