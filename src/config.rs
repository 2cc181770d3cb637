use std::path::Path;

use serde::Deserialize;

use crate::path::RootPath;
use crate::storage::backends::BackendConfigs;

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// The set storage backend configuration.
    pub backend: BackendConfigs,

    #[serde(default)]
    /// How results are laid out and expired within the backend.
    pub result_storage: ResultStorageConfig,

    #[serde(default)]
    /// The maximum size of an uploaded result in bytes.
    ///
    /// Defaults to no limit.
    pub max_upload_size: Option<usize>,
}

impl RuntimeConfig {
    pub fn from_yaml(data: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(data)?)
    }

    pub async fn from_file(file: &Path) -> anyhow::Result<Self> {
        let data = tokio::fs::read_to_string(file).await?;
        Self::from_yaml(&data)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultStorageConfig {
    #[serde(default)]
    /// The prefix all results are stored under.
    ///
    /// Any trailing `/` is ignored.
    pub root_path: RootPath,

    #[serde(default = "default_acl")]
    /// The canned ACL applied to stored results.
    ///
    /// Defaults to `public-read`.
    pub acl: String,

    #[serde(default)]
    /// How long a stored result can be served for in seconds.
    ///
    /// `0` or less disables expiry. Defaults to `0`.
    pub ttl: i64,

    #[serde(default)]
    /// Store results converted to webp because the client accepted it
    /// separately from the default results.
    ///
    /// Defaults to `false`.
    pub auto_webp: bool,
}

impl Default for ResultStorageConfig {
    fn default() -> Self {
        Self {
            root_path: RootPath::default(),
            acl: default_acl(),
            ttl: 0,
            auto_webp: false,
        }
    }
}

fn default_acl() -> String {
    "public-read".to_string()
}
