use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::storage::template::{ObjectStore, StoredObject};

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct FileSystemBackend {
    directory: PathBuf,
}

impl FileSystemBackend {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            directory: dir,
        }
    }

    /// Maps a key onto a path within the backend's directory.
    ///
    /// Keys may not escape the directory.
    fn format_path(&self, key: &str) -> anyhow::Result<PathBuf> {
        let relative = Path::new(key.trim_start_matches('/'));

        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {},
                _ => return Err(anyhow!("Key {:?} is not a valid relative path", key)),
            }
        }

        Ok(self.directory.join(relative))
    }

    /// A unique sibling path to stage a write in before it is renamed
    /// over `path`.
    fn staging_path(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let staged = format!(
            ".{}.{}-{}.tmp",
            name,
            std::process::id(),
            STAGING_COUNTER.fetch_add(1, Ordering::Relaxed),
        );

        path.with_file_name(staged)
    }

    async fn write_staged(staging: &Path, path: &Path, body: &[u8]) -> std::io::Result<()> {
        tokio::fs::write(staging, body).await?;
        tokio::fs::rename(staging, path).await
    }

    async fn modified_at(path: &Path) -> std::io::Result<Option<DateTime<Utc>>> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Ok(Some(DateTime::<Utc>::from(meta.modified()?))),
            Ok(_) => Ok(None),
            Err(ref e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(other) => Err(other),
        }
    }
}

#[async_trait]
impl ObjectStore for FileSystemBackend {
    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        let path = self.format_path(key)?;

        Ok(Self::modified_at(&path).await?.is_some())
    }

    async fn get_object(&self, key: &str) -> anyhow::Result<StoredObject> {
        let path = self.format_path(key)?;

        debug!("Retrieving object @ {:?}", &path);
        let body = match tokio::fs::read(&path).await {
            Ok(data) => Bytes::from(data),
            Err(ref e) if e.kind() == ErrorKind::NotFound => return Ok(StoredObject::missing(404)),
            Err(other) => return Err(other.into()),
        };

        let last_modified = match Self::modified_at(&path).await? {
            Some(modified) => modified,
            None => return Ok(StoredObject::missing(404)),
        };

        Ok(StoredObject {
            status: 200,
            body,
            last_modified,
        })
    }

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        _content_type: &str,
        _acl: &str,
    ) -> anyhow::Result<String> {
        let path = self.format_path(key)?;

        debug!("Storing object @ {:?}", &path);

        // Readers only ever see the old or the new object, never a partial one.
        let staging = Self::staging_path(&path);
        let result = match Self::write_staged(&staging, &path, &body).await {
            Err(ref e) if e.kind() == ErrorKind::NotFound => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                Self::write_staged(&staging, &path, &body).await
            },
            other => other,
        };

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        Ok(path.to_string_lossy().into_owned())
    }

    async fn head_object(&self, key: &str) -> anyhow::Result<Option<DateTime<Utc>>> {
        let path = self.format_path(key)?;

        Ok(Self::modified_at(&path).await?)
    }
}
