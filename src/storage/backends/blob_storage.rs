use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use rusoto_core::credential::{DefaultCredentialsProvider, StaticProvider};
use rusoto_core::{HttpClient, Region, RusotoError};
use rusoto_s3::{
    GetObjectError,
    GetObjectRequest,
    HeadObjectError,
    HeadObjectRequest,
    PutObjectRequest,
    S3Client,
    S3,
};
use tracing::instrument;

use crate::freshness::parse_http_date;
use crate::storage::template::{ObjectStore, StoredObject};

pub struct BlobStorageBackend {
    client: S3Client,
    bucket: String,
    endpoint: String,
    request_timeout: Option<Duration>,
}

impl BlobStorageBackend {
    pub fn new(
        name: String,
        region: String,
        endpoint: Option<String>,
        access_key: Option<&str>,
        secret_key: Option<&str>,
        request_timeout: Option<Duration>,
    ) -> Result<Self> {
        let region = match endpoint.clone() {
            Some(endpoint) => Region::Custom {
                name: region,
                endpoint: endpoint.trim_end_matches('/').to_string(),
            },
            None => region.parse::<Region>()?,
        };

        let endpoint = match &region {
            Region::Custom { endpoint, .. } => endpoint.clone(),
            other => format!("https://s3.{}.amazonaws.com", other.name()),
        };

        let dispatcher = HttpClient::new()?;
        let client = match (access_key, secret_key) {
            (Some(access_key), Some(secret_key)) => {
                let creds = StaticProvider::new_minimal(
                    access_key.to_string(),
                    secret_key.to_string(),
                );
                S3Client::new_with(dispatcher, creds, region)
            },
            _ => {
                debug!("No static credentials given, using the default provider chain");
                S3Client::new_with(dispatcher, DefaultCredentialsProvider::new()?, region)
            },
        };

        Ok(Self::with_client(client, name, endpoint, request_timeout))
    }

    /// Wraps an already configured client.
    pub fn with_client(
        client: S3Client,
        bucket: String,
        endpoint: String,
        request_timeout: Option<Duration>,
    ) -> Self {
        Self {
            client,
            bucket,
            endpoint,
            request_timeout,
        }
    }

    #[inline]
    fn locator(&self, key: &str) -> String {
        object_locator(&self.endpoint, &self.bucket, key)
    }

    async fn with_timeout<T, E, F>(&self, fut: F) -> Result<std::result::Result<T, E>>
    where
        F: Future<Output = std::result::Result<T, E>>,
    {
        match self.request_timeout {
            None => Ok(fut.await),
            Some(timeout) => tokio::time::timeout(timeout, fut)
                .await
                .map_err(|_| anyhow!("Remote storage bucket did not respond within {:?}", timeout)),
        }
    }
}

#[async_trait]
impl ObjectStore for BlobStorageBackend {
    #[instrument(skip(self), level = "debug")]
    async fn exists(&self, key: &str) -> Result<bool> {
        let request = HeadObjectRequest {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            ..Default::default()
        };

        match self.with_timeout(self.client.head_object(request)).await? {
            Ok(_) => Ok(true),
            Err(RusotoError::Service(HeadObjectError::NoSuchKey(_))) => Ok(false),
            Err(RusotoError::Unknown(ref resp)) if resp.status.as_u16() == 404 => Ok(false),
            Err(other) => Err(other.into()),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_object(&self, key: &str) -> Result<StoredObject> {
        let request = GetObjectRequest {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            ..Default::default()
        };

        debug!("Retrieving object in bucket @ {}", key);
        let output = match self.with_timeout(self.client.get_object(request)).await? {
            Ok(output) => output,
            Err(RusotoError::Service(GetObjectError::NoSuchKey(_))) => {
                return Ok(StoredObject::missing(404))
            },
            Err(RusotoError::Unknown(resp)) => {
                return Ok(StoredObject::missing(resp.status.as_u16()))
            },
            Err(other) => return Err(other.into()),
        };

        let last_modified = output
            .last_modified
            .as_deref()
            .and_then(parse_http_date)
            .unwrap_or_else(|| {
                warn!("Object @ {} has no readable last-modified date, assuming now", key);
                Utc::now()
            });

        let body = match output.body {
            None => Bytes::new(),
            Some(stream) => {
                let collect = stream.try_fold(BytesMut::new(), |mut acc, chunk| async move {
                    acc.extend_from_slice(&chunk);
                    Ok(acc)
                });

                self.with_timeout(collect).await??.freeze()
            },
        };

        Ok(StoredObject {
            status: 200,
            body,
            last_modified,
        })
    }

    #[instrument(skip(self, body), level = "debug")]
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        acl: &str,
    ) -> Result<String> {
        let request = PutObjectRequest {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            content_length: Some(body.len() as i64),
            body: Some(body.to_vec().into()),
            content_type: Some(content_type.to_string()),
            acl: if acl.is_empty() { None } else { Some(acl.to_string()) },
            ..Default::default()
        };

        debug!("Storing object in bucket @ {}", key);
        self.with_timeout(self.client.put_object(request)).await??;

        Ok(self.locator(key))
    }

    #[instrument(skip(self), level = "debug")]
    async fn head_object(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let request = HeadObjectRequest {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            ..Default::default()
        };

        match self.with_timeout(self.client.head_object(request)).await? {
            Ok(output) => Ok(output.last_modified.as_deref().and_then(parse_http_date)),
            Err(RusotoError::Service(HeadObjectError::NoSuchKey(_))) => Ok(None),
            Err(RusotoError::Unknown(ref resp)) if resp.status.as_u16() == 404 => Ok(None),
            Err(other) => Err(other.into()),
        }
    }
}

fn object_locator(endpoint: &str, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", endpoint, bucket, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rusoto_core::request::HttpDispatchError;
    use rusoto_mock::{MockCredentialsProvider, MockRequestDispatcher};

    const NO_SUCH_KEY: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
        <Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message>\
        <Key>rs/default/a.png</Key></Error>";

    fn mocked(dispatcher: MockRequestDispatcher) -> BlobStorageBackend {
        let client = S3Client::new_with(dispatcher, MockCredentialsProvider, Region::UsEast1);
        BlobStorageBackend::with_client(
            client,
            "results".to_string(),
            "http://localhost:9000".to_string(),
            None,
        )
    }

    #[tokio::test]
    async fn test_existing_object() -> anyhow::Result<()> {
        let backend = mocked(
            MockRequestDispatcher::with_status(200)
                .with_header("Last-Modified", "Wed, 21 Oct 2015 07:28:00 GMT"),
        );

        assert!(backend.exists("rs/default/a.png").await?);
        assert_eq!(
            backend.head_object("rs/default/a.png").await?,
            Some(Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap()),
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_get_parses_body_and_last_modified() -> anyhow::Result<()> {
        let backend = mocked(
            MockRequestDispatcher::with_status(200)
                .with_body("result-bytes")
                .with_header("Last-Modified", "Wed, 21 Oct 2015 07:28:00 GMT"),
        );

        let obj = backend.get_object("rs/default/a.png").await?;
        assert_eq!(obj.status, 200);
        assert_eq!(obj.body.as_ref(), b"result-bytes");
        assert_eq!(obj.last_modified, Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap());

        Ok(())
    }

    #[tokio::test]
    async fn test_not_found_is_absent() -> anyhow::Result<()> {
        let backend = mocked(MockRequestDispatcher::with_status(404));

        assert!(!backend.exists("rs/default/a.png").await?);
        assert_eq!(backend.head_object("rs/default/a.png").await?, None);
        assert_eq!(backend.get_object("rs/default/a.png").await?.status, 404);

        Ok(())
    }

    #[tokio::test]
    async fn test_no_such_key_on_get() -> anyhow::Result<()> {
        let backend = mocked(MockRequestDispatcher::with_status(404).with_body(NO_SUCH_KEY));

        assert_eq!(backend.get_object("rs/default/a.png").await?.status, 404);

        Ok(())
    }

    #[tokio::test]
    async fn test_other_statuses_are_carried() -> anyhow::Result<()> {
        let backend = mocked(MockRequestDispatcher::with_status(500));
        assert_eq!(backend.get_object("rs/default/a.png").await?.status, 500);
        assert!(backend.exists("rs/default/a.png").await.is_err());
        assert!(backend.head_object("rs/default/a.png").await.is_err());

        let backend = mocked(MockRequestDispatcher::with_status(403));
        assert_eq!(backend.get_object("rs/default/a.png").await?.status, 403);

        Ok(())
    }

    #[tokio::test]
    async fn test_dispatch_failures_are_errors() {
        let failing = || {
            MockRequestDispatcher::with_dispatch_error(HttpDispatchError::new(
                "connection refused".to_string(),
            ))
        };

        assert!(mocked(failing()).exists("rs/default/a.png").await.is_err());
        assert!(mocked(failing()).get_object("rs/default/a.png").await.is_err());
        assert!(mocked(failing()).head_object("rs/default/a.png").await.is_err());
        assert!(mocked(failing())
            .put_object("rs/default/a.png", Bytes::from_static(b"x"), "image/png", "public-read")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_put_returns_locator() -> anyhow::Result<()> {
        let backend = mocked(MockRequestDispatcher::with_status(200));

        let locator = backend
            .put_object("rs/default/a.png", Bytes::from_static(b"x"), "image/png", "public-read")
            .await?;
        assert_eq!(locator, "http://localhost:9000/results/rs/default/a.png");

        Ok(())
    }

    #[test]
    fn test_locator_format() {
        assert_eq!(
            object_locator("http://localhost:9000", "results", "rs/default/a.png"),
            "http://localhost:9000/results/rs/default/a.png",
        );
    }

    #[tokio::test]
    async fn test_custom_endpoint_locator() -> anyhow::Result<()> {
        let backend = BlobStorageBackend::new(
            "results".to_string(),
            "us-east-1".to_string(),
            Some("http://localhost:9000/".to_string()),
            Some("access"),
            Some("secret"),
            None,
        )?;

        assert_eq!(backend.locator("a/b.png"), "http://localhost:9000/results/a/b.png");
        Ok(())
    }

    #[tokio::test]
    async fn test_named_region_locator() -> anyhow::Result<()> {
        let backend = BlobStorageBackend::new(
            "results".to_string(),
            "eu-west-1".to_string(),
            None,
            Some("access"),
            Some("secret"),
            None,
        )?;

        assert_eq!(
            backend.locator("a.png"),
            "https://s3.eu-west-1.amazonaws.com/results/a.png",
        );
        Ok(())
    }

    #[test]
    fn test_unknown_region_rejected() {
        let backend = BlobStorageBackend::new(
            "results".to_string(),
            "not-a-region".to_string(),
            None,
            Some("access"),
            Some("secret"),
            None,
        );

        assert!(backend.is_err());
    }
}
