use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

/// A single object as returned by the backing store.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// The HTTP-like status of the fetch, `200` on success.
    pub status: u16,

    /// The raw object body.
    pub body: Bytes,

    /// When the object was last written.
    pub last_modified: DateTime<Utc>,
}

impl StoredObject {
    pub fn missing(status: u16) -> Self {
        Self {
            status,
            body: Bytes::new(),
            last_modified: Utc::now(),
        }
    }
}

#[async_trait]
pub trait ObjectStore: Sync + Send + 'static {
    /// Checks whether an object exists, a missing object is not an error.
    async fn exists(&self, key: &str) -> anyhow::Result<bool>;

    /// Fetches the object.
    ///
    /// Failures reported by the store itself (e.g. a 404 after the object
    /// was removed) are returned via `StoredObject::status`, an `Err` is
    /// reserved for transport failures.
    async fn get_object(&self, key: &str) -> anyhow::Result<StoredObject>;

    /// Writes the object and returns a locator for it.
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        acl: &str,
    ) -> anyhow::Result<String>;

    /// Fetches just the last-modified timestamp of an object.
    async fn head_object(&self, key: &str) -> anyhow::Result<Option<DateTime<Utc>>>;
}
