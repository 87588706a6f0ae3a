use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::core::config::{LinkStoreBackend, Settings};
use crate::core::redis::RedisHandle;
use crate::core::time::SystemClock;
use crate::db;
use crate::services::link_store::{
    InlineBlobs, LinkStore, LocalRecords, MemoryKeyValue, PgRecords, S3Blobs,
};
use crate::services::storage::StorageService;
use crate::services::uploads::UploadPolicy;

/// The configured link store plus whatever connections it needs closed on shutdown.
pub(crate) struct Backends {
    pub(crate) links: LinkStore,
    pub(crate) redis: Option<RedisHandle>,
}

impl Backends {
    pub(crate) async fn close(&self) {
        if let Some(redis) = &self.redis {
            redis.disconnect().await;
            tracing::info!("Redis disconnected");
        }
    }
}

pub(crate) async fn build_link_store(settings: &Settings) -> anyhow::Result<Backends> {
    let policy = UploadPolicy::from_settings(settings);
    let clock = Arc::new(SystemClock);
    let backend = settings.links().backend;

    let backends = match backend {
        LinkStoreBackend::Memory => Backends {
            links: LinkStore::new(
                Arc::new(LocalRecords::new(MemoryKeyValue::new())),
                Arc::new(InlineBlobs),
                clock,
                policy,
            ),
            redis: None,
        },
        LinkStoreBackend::Redis => {
            let redis = RedisHandle::new(settings.redis().redis_url());
            redis.connect().await.context("failed to connect to Redis")?;
            tracing::info!("Redis connected successfully");

            Backends {
                links: LinkStore::new(
                    Arc::new(LocalRecords::new(redis.clone())),
                    Arc::new(InlineBlobs),
                    clock,
                    policy,
                ),
                redis: Some(redis),
            }
        }
        LinkStoreBackend::Durable => {
            let pool = db::init_pool(settings).await.context("failed to connect to Postgres")?;
            db::run_migrations(&pool).await.context("failed to run migrations")?;

            let storage = StorageService::from_settings(settings).await?;
            if let Err(err) = storage.check_bucket().await {
                tracing::warn!(error = %err, "S3 bucket check failed; uploads may fail");
            }
            let read_link_ttl =
                Duration::from_secs(settings.storage().presigned_url_expire_minutes * 60);

            Backends {
                links: LinkStore::new(
                    Arc::new(PgRecords::new(pool)),
                    Arc::new(S3Blobs::new(storage, read_link_ttl)),
                    clock,
                    policy,
                ),
                redis: None,
            }
        }
    };

    tracing::info!(backend = backend.as_str(), "Link store ready");
    Ok(backends)
}
