use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ResultStorageConfig;
use crate::error::{CacheError, Result};
use crate::freshness::FreshnessPolicy;
use crate::mimetype::guess_content_type;
use crate::path::{normalize_path, RootPath, Variant};
use crate::storage::ObjectStore;

/// Describes a cached result in the shape response builders expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultMetadata {
    pub last_modified: DateTime<Utc>,
    pub content_length: usize,
    pub content_type: &'static str,
}

#[derive(Debug, Clone)]
pub struct CachedResult {
    pub buffer: Bytes,
    pub metadata: ResultMetadata,
}

#[derive(Debug, Clone)]
pub enum CacheResult {
    /// Nothing usable is stored, the result should be recomputed.
    Miss,
    Hit(CachedResult),
}

impl CacheResult {
    #[inline]
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    pub fn into_hit(self) -> Option<CachedResult> {
        match self {
            Self::Hit(result) => Some(result),
            Self::Miss => None,
        }
    }
}

/// Persists processed results in an object store.
///
/// The cache itself holds no runtime state besides its configuration,
/// any number of requests may share it.
pub struct ResultCache {
    store: Arc<dyn ObjectStore>,
    root_path: RootPath,
    acl: String,
    freshness: FreshnessPolicy,
    auto_webp: bool,
}

impl ResultCache {
    pub fn new(cfg: &ResultStorageConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            root_path: cfg.root_path.clone(),
            acl: cfg.acl.clone(),
            freshness: FreshnessPolicy::new(cfg.ttl),
            auto_webp: cfg.auto_webp,
        }
    }

    /// Selects the variant for a request that may or may not accept webp.
    #[inline]
    pub fn variant_for(&self, accepts_webp: bool) -> Variant {
        Variant::from_flag(self.auto_webp && accepts_webp)
    }

    #[inline]
    pub fn key_for(&self, identity: &str, variant: Variant) -> String {
        normalize_path(identity, variant, &self.root_path)
    }

    /// Stores a result and returns the key it was stored under.
    pub async fn put(&self, identity: &str, variant: Variant, data: Bytes) -> Result<String> {
        let key = self.key_for(identity, variant);
        debug!("[RESULT_STORAGE] putting at {}", &key);

        let content_type = guess_content_type(&data);
        let locator = self
            .store
            .put_object(&key, data, content_type, &self.acl)
            .await
            .map_err(|source| CacheError::StorageWrite {
                key: key.clone(),
                source,
            })?;

        info!("[RESULT_STORAGE] Image uploaded successfully to {}", locator);
        Ok(key)
    }

    /// Fetches a stored result if it exists and is still fresh.
    pub async fn get(&self, identity: &str, variant: Variant) -> Result<CacheResult> {
        let key = self.key_for(identity, variant);
        debug!("[RESULT_STORAGE] getting from {}", &key);

        let exists = self
            .store
            .exists(&key)
            .await
            .map_err(|source| CacheError::StorageRead {
                key: key.clone(),
                source,
            })?;

        if !exists {
            debug!("[RESULT_STORAGE] image not found at {}", &key);
            return Ok(CacheResult::Miss);
        }

        let obj = self
            .store
            .get_object(&key)
            .await
            .map_err(|source| CacheError::StorageRead {
                key: key.clone(),
                source,
            })?;

        // The object can vanish between the existence check and the fetch.
        if obj.status != 200 {
            debug!("[RESULT_STORAGE] cached image could not be fetched (status {})", obj.status);
            return Ok(CacheResult::Miss);
        }

        if self.freshness.is_expired(obj.last_modified, Utc::now()) {
            debug!(
                "[RESULT_STORAGE] cached image at {} has expired (last modified {})",
                &key,
                obj.last_modified,
            );
            return Ok(CacheResult::Miss);
        }

        info!("[RESULT_STORAGE] Image retrieved successfully at {}", &key);

        let metadata = ResultMetadata {
            last_modified: obj.last_modified,
            content_length: obj.body.len(),
            content_type: guess_content_type(&obj.body),
        };

        Ok(CacheResult::Hit(CachedResult {
            buffer: obj.body,
            metadata,
        }))
    }

    /// Gets when a result was last stored without fetching its body.
    ///
    /// Expiry is not taken into account.
    pub async fn last_updated(
        &self,
        identity: &str,
        variant: Variant,
    ) -> Result<Option<DateTime<Utc>>> {
        let key = self.key_for(identity, variant);
        debug!("[RESULT_STORAGE] getting last modified of {}", &key);

        self.store
            .head_object(&key)
            .await
            .map_err(|source| CacheError::StorageRead { key, source })
    }
}
