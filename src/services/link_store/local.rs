use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{AnswerFileRecord, RecordStore, SubmissionRecord, TestRecord};
use crate::core::redis::{RedisHandle, RedisHealth};

/// Minimal string key/value surface shared by the in-process map and Redis.
#[async_trait]
pub(crate) trait KeyValue: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> anyhow::Result<()>;

    async fn delete(&self, key: &str) -> anyhow::Result<()>;

    async fn health(&self) -> anyhow::Result<()>;
}

/// Process-local entries; nothing survives a restart. TTLs are ignored and
/// expiry relies on lazy eviction.
#[derive(Debug, Default)]
pub(crate) struct MemoryKeyValue {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValue {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValue for MemoryKeyValue {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String, _ttl: Option<Duration>) -> anyhow::Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn health(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl KeyValue for RedisHandle {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(RedisHandle::get(self, key).await?)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> anyhow::Result<()> {
        let ttl_seconds = ttl.map(|ttl| ttl.as_secs().max(1));
        Ok(RedisHandle::set(self, key, &value, ttl_seconds).await?)
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        Ok(RedisHandle::delete(self, key).await?)
    }

    async fn health(&self) -> anyhow::Result<()> {
        match RedisHandle::health(self).await {
            RedisHealth::Healthy => Ok(()),
            RedisHealth::Disconnected => anyhow::bail!("disconnected"),
            RedisHealth::Unhealthy(error) => anyhow::bail!("unhealthy: {error}"),
        }
    }
}

/// Records laid out as JSON entries: `test_<id>`, `submission_<id>` and
/// `answers_<submission id>`.
pub(crate) struct LocalRecords<K> {
    kv: K,
}

impl<K: KeyValue> LocalRecords<K> {
    pub(crate) fn new(kv: K) -> Self {
        Self { kv }
    }

    pub(crate) fn test_key(id: &str) -> String {
        format!("test_{id}")
    }

    fn submission_key(id: &str) -> String {
        format!("submission_{id}")
    }

    fn answers_key(submission_id: &str) -> String {
        format!("answers_{submission_id}")
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> anyhow::Result<Option<T>> {
        let Some(raw) = self.kv.get(key).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                tracing::warn!(error = %err, key = %key, "Dropping unreadable entry");
                self.kv.delete(key).await?;
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl<K: KeyValue> RecordStore for LocalRecords<K> {
    fn name(&self) -> &'static str {
        self.kv.name()
    }

    async fn insert_test(&self, record: &TestRecord) -> anyhow::Result<()> {
        let value = serde_json::to_string(record).context("serialize test record")?;
        let ttl = (record.expires_at - record.created_at).unsigned_abs();
        self.kv.set(&Self::test_key(&record.id), value, Some(ttl)).await
    }

    async fn find_test(&self, id: &str) -> anyhow::Result<Option<TestRecord>> {
        self.read_json(&Self::test_key(id)).await
    }

    async fn evict_test(&self, id: &str) -> anyhow::Result<()> {
        self.kv.delete(&Self::test_key(id)).await
    }

    async fn insert_submission(&self, submission: &SubmissionRecord) -> anyhow::Result<()> {
        let value = serde_json::to_string(submission).context("serialize submission")?;
        self.kv.set(&Self::submission_key(&submission.id), value, None).await
    }

    async fn insert_answer_files(&self, files: &[AnswerFileRecord]) -> anyhow::Result<()> {
        let mut grouped: BTreeMap<&str, Vec<AnswerFileRecord>> = BTreeMap::new();
        for file in files {
            grouped.entry(file.submission_id.as_str()).or_default().push(file.clone());
        }

        for (submission_id, batch) in grouped {
            let key = Self::answers_key(submission_id);
            let mut existing: Vec<AnswerFileRecord> =
                self.read_json(&key).await?.unwrap_or_default();
            existing.extend(batch);
            let value = serde_json::to_string(&existing).context("serialize answer files")?;
            self.kv.set(&key, value, None).await?;
        }

        Ok(())
    }

    async fn find_submission(&self, id: &str) -> anyhow::Result<Option<SubmissionRecord>> {
        self.read_json(&Self::submission_key(id)).await
    }

    async fn list_answer_files(
        &self,
        submission_id: &str,
    ) -> anyhow::Result<Vec<AnswerFileRecord>> {
        Ok(self.read_json(&Self::answers_key(submission_id)).await?.unwrap_or_default())
    }

    async fn health(&self) -> anyhow::Result<()> {
        self.kv.health().await
    }
}
