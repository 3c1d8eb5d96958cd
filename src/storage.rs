use anyhow::Context;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use axum::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::StorageConfig;

/// Opaque blob store holding recipe images.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    async fn presign_get(&self, key: &str, seconds: u64) -> anyhow::Result<String>;
}

/// SigV4 presigned URLs cannot outlive a week.
pub const MAX_PRESIGN_SECS: u64 = 7 * 24 * 60 * 60;

fn presign_window(seconds: u64) -> Duration {
    Duration::from_secs(seconds.clamp(1, MAX_PRESIGN_SECS))
}

/// S3 / MinIO bucket addressed path-style.
#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    pub async fn new(cfg: &StorageConfig) -> anyhow::Result<Self> {
        let credentials = Credentials::new(
            cfg.access_key.as_str(),
            cfg.secret_key.as_str(),
            None,
            None,
            "recipebox-env",
        );
        let sdk = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(cfg.endpoint.as_str())
            .load()
            .await;

        let client = Client::from_conf(
            S3ConfigBuilder::from(&sdk)
                .endpoint_url(cfg.endpoint.as_str())
                .force_path_style(true)
                .build(),
        );
        info!(endpoint = %cfg.endpoint, bucket = %cfg.bucket, "blob store configured");
        Ok(Self {
            client,
            bucket: cfg.bucket.clone(),
        })
    }
}

#[async_trait]
impl StorageClient for Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_length(size as i64)
            .body(ByteStream::from(body))
            .send()
            .await
            .with_context(|| format!("upload {key} to {}", self.bucket))?;
        debug!(key, size, "blob stored");
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("delete {key} from {}", self.bucket))?;
        debug!(key, "blob deleted");
        Ok(())
    }

    async fn presign_get(&self, key: &str, seconds: u64) -> anyhow::Result<String> {
        let window = PresigningConfig::expires_in(presign_window(seconds))
            .context("presign window")?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(window)
            .await
            .with_context(|| format!("presign {key}"))?;
        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
pub use fake::FakeStorage;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presign_window_is_clamped() {
        assert_eq!(presign_window(0), Duration::from_secs(1));
        assert_eq!(presign_window(1800), Duration::from_secs(1800));
        assert_eq!(presign_window(u64::MAX), Duration::from_secs(MAX_PRESIGN_SECS));
    }

    #[tokio::test]
    async fn fake_storage_tracks_objects() {
        let store = FakeStorage::default();
        store
            .put_object("uploads/recipe/a.png", Bytes::from_static(b"x"), "image/png")
            .await
            .unwrap();
        assert_eq!(store.keys(), vec!["uploads/recipe/a.png".to_string()]);
        assert_eq!(store.content_type("uploads/recipe/a.png").as_deref(), Some("image/png"));
        let url = store.presign_get("uploads/recipe/a.png", 60).await.unwrap();
        assert!(url.ends_with("uploads/recipe/a.png"));
        store.delete_object("uploads/recipe/a.png").await.unwrap();
        assert!(store.keys().is_empty());
    }
}
