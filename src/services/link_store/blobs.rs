use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::{BlobArea, BlobStore};
use crate::services::storage::StorageService;
use crate::services::uploads::FileUpload;

/// Keeps file bytes inside the record itself as a `data:` URL.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct InlineBlobs;

#[async_trait]
impl BlobStore for InlineBlobs {
    fn name(&self) -> &'static str {
        "inline"
    }

    async fn put(
        &self,
        _area: BlobArea,
        _stored_name: &str,
        file: &FileUpload,
    ) -> anyhow::Result<String> {
        Ok(format!("data:{};base64,{}", file.mime(), STANDARD.encode(&file.bytes)))
    }

    async fn resolve(&self, reference: &str) -> anyhow::Result<String> {
        Ok(reference.to_string())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct S3Blobs {
    storage: StorageService,
    read_link_ttl: Duration,
}

impl S3Blobs {
    pub(crate) fn new(storage: StorageService, read_link_ttl: Duration) -> Self {
        Self { storage, read_link_ttl }
    }
}

#[async_trait]
impl BlobStore for S3Blobs {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn put(
        &self,
        area: BlobArea,
        stored_name: &str,
        file: &FileUpload,
    ) -> anyhow::Result<String> {
        let key = format!("{}/{stored_name}", area.prefix());
        let stored = self.storage.upload_bytes(&key, &file.mime(), file.bytes.clone()).await?;
        tracing::debug!(
            key = %stored.key,
            size = stored.size,
            sha256 = %stored.sha256,
            "Object stored"
        );
        Ok(stored.key)
    }

    async fn resolve(&self, reference: &str) -> anyhow::Result<String> {
        self.storage.presign_get(reference, self.read_link_ttl).await
    }
}
