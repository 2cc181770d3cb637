use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use tokio::sync::RwLock;

use crate::storage::template::{ObjectStore, StoredObject};

#[derive(Debug, Clone)]
struct Entry {
    body: Bytes,
    content_type: String,
    last_modified: DateTime<Utc>,
}

/// A process-local store, nothing survives a restart.
#[derive(Default)]
pub struct MemoryBackend {
    objects: RwLock<HashMap<String, Entry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an object with an explicit modification time.
    pub async fn insert_with_timestamp(
        &self,
        key: impl Into<String>,
        body: Bytes,
        last_modified: DateTime<Utc>,
    ) {
        let entry = Entry {
            content_type: crate::mimetype::guess_content_type(&body).to_string(),
            body,
            last_modified,
        };

        self.objects.write().await.insert(key.into(), entry);
    }

    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|entry| entry.content_type.clone())
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn get_object(&self, key: &str) -> anyhow::Result<StoredObject> {
        let objects = self.objects.read().await;

        let obj = match objects.get(key) {
            Some(entry) => StoredObject {
                status: 200,
                body: entry.body.clone(),
                last_modified: entry.last_modified,
            },
            None => StoredObject::missing(404),
        };

        Ok(obj)
    }

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        _acl: &str,
    ) -> anyhow::Result<String> {
        let entry = Entry {
            body,
            content_type: content_type.to_string(),
            last_modified: Utc::now(),
        };

        self.objects.write().await.insert(key.to_string(), entry);

        Ok(format!("memory://{}", key))
    }

    async fn head_object(&self, key: &str) -> anyhow::Result<Option<DateTime<Utc>>> {
        Ok(self
            .objects
            .read()
            .await
            .get(key)
            .map(|entry| entry.last_modified))
    }
}
