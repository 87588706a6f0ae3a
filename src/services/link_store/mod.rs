//! Persistence for timed tests and the answers turned in against them.
//!
//! [`LinkStore`] owns the rules (duration policy, the fixed validity window,
//! treating expired tests as absent, the all-or-nothing submission report)
//! and delegates rows to a [`RecordStore`] and file bytes to a [`BlobStore`].
//! Which pair is plugged in is decided once at startup.

mod blobs;
mod durable;
mod local;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;
use validator::Validate;

use crate::core::metrics;
use crate::core::time::Clock;
use crate::services::uploads::{generate_file_name, FileUpload, UploadPolicy, UploadRejection};

pub(crate) use blobs::{InlineBlobs, S3Blobs};
pub(crate) use durable::PgRecords;
pub(crate) use local::{LocalRecords, MemoryKeyValue};

pub(crate) const MIN_DURATION_MINUTES: u32 = 5;
pub(crate) const MAX_DURATION_MINUTES: u32 = 180;
pub(crate) const VALIDITY_WINDOW: Duration = Duration::hours(24);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TestRecord {
    pub(crate) id: String,
    pub(crate) file_name: String,
    /// Data URL for inline storage, object key for S3.
    pub(crate) file_url: String,
    pub(crate) duration_minutes: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) expires_at: OffsetDateTime,
    #[serde(default)]
    pub(crate) created_by: Option<String>,
}

impl TestRecord {
    pub(crate) fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmissionRecord {
    pub(crate) id: String,
    pub(crate) test_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) submitted_at: OffsetDateTime,
    #[serde(default)]
    pub(crate) submitted_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnswerFileRecord {
    pub(crate) id: String,
    pub(crate) submission_id: String,
    pub(crate) file_name: String,
    pub(crate) file_url: String,
}

/// A submission together with the answer files recorded for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SubmissionReceipt {
    pub(crate) submission: SubmissionRecord,
    pub(crate) answers: Vec<AnswerFileRecord>,
}

#[derive(Debug, Validate)]
pub(crate) struct NewTest {
    pub(crate) document: Option<FileUpload>,
    #[validate(range(
        min = MIN_DURATION_MINUTES,
        max = MAX_DURATION_MINUTES,
        message = "Test duration must be between 5 and 180 minutes"
    ))]
    pub(crate) duration_minutes: u32,
    pub(crate) created_by: Option<String>,
}

#[derive(Debug, Error)]
pub(crate) enum LinkStoreError {
    #[error("{0}")]
    Validation(String),
    /// Never-created and expired tests are reported identically.
    #[error("Test not found or has expired")]
    NotFoundOrExpired,
    #[error("storage is unavailable: {0:#}")]
    Transient(anyhow::Error),
}

impl From<UploadRejection> for LinkStoreError {
    fn from(rejection: UploadRejection) -> Self {
        Self::Validation(rejection.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlobArea {
    TestDocuments,
    AnswerDocuments,
}

impl BlobArea {
    pub(crate) fn prefix(self) -> &'static str {
        match self {
            Self::TestDocuments => "test-documents",
            Self::AnswerDocuments => "answer-documents",
        }
    }
}

#[async_trait]
pub(crate) trait RecordStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn insert_test(&self, record: &TestRecord) -> anyhow::Result<()>;

    async fn find_test(&self, id: &str) -> anyhow::Result<Option<TestRecord>>;

    /// Best-effort removal of an expired test; backends that keep history may decline.
    async fn evict_test(&self, id: &str) -> anyhow::Result<()>;

    async fn insert_submission(&self, submission: &SubmissionRecord) -> anyhow::Result<()>;

    async fn insert_answer_files(&self, files: &[AnswerFileRecord]) -> anyhow::Result<()>;

    async fn find_submission(&self, id: &str) -> anyhow::Result<Option<SubmissionRecord>>;

    async fn list_answer_files(&self, submission_id: &str)
        -> anyhow::Result<Vec<AnswerFileRecord>>;

    async fn health(&self) -> anyhow::Result<()>;
}

#[async_trait]
pub(crate) trait BlobStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Stores the file under `stored_name` and returns the reference to persist.
    async fn put(
        &self,
        area: BlobArea,
        stored_name: &str,
        file: &FileUpload,
    ) -> anyhow::Result<String>;

    /// Turns a persisted reference into something a reader can open.
    async fn resolve(&self, reference: &str) -> anyhow::Result<String>;
}

#[derive(Clone)]
pub(crate) struct LinkStore {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    policy: UploadPolicy,
}

impl LinkStore {
    pub(crate) fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
        policy: UploadPolicy,
    ) -> Self {
        Self { records, blobs, clock, policy }
    }

    pub(crate) fn backend_name(&self) -> &'static str {
        self.records.name()
    }

    pub(crate) fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub(crate) async fn create_test(&self, new_test: NewTest) -> Result<TestRecord, LinkStoreError> {
        new_test.validate().map_err(|errors| {
            LinkStoreError::Validation(first_validation_message(&errors))
        })?;
        self.policy.validate_document(new_test.document.as_ref())?;
        let NewTest { document: Some(document), duration_minutes, created_by } = new_test else {
            return Err(UploadRejection::MissingDocument.into());
        };

        let created_at = self.clock.now();
        let stored_name = generate_file_name(&document.file_name, created_at);
        let file_url = self
            .blobs
            .put(BlobArea::TestDocuments, &stored_name, &document)
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, blobs = self.blobs.name(), "Test document upload failed");
                LinkStoreError::Transient(err)
            })?;

        let record = TestRecord {
            id: Uuid::new_v4().to_string(),
            file_name: document.file_name,
            file_url,
            duration_minutes,
            created_at,
            expires_at: created_at + VALIDITY_WINDOW,
            created_by,
        };

        self.records.insert_test(&record).await.map_err(|err| {
            tracing::warn!(error = %err, records = self.records.name(), "Failed to persist test");
            LinkStoreError::Transient(err)
        })?;

        metrics::record_test_created(self.records.name());
        tracing::info!(
            test_id = %record.id,
            duration_minutes = record.duration_minutes,
            expires_at = %record.expires_at,
            "Timed test created"
        );
        Ok(record)
    }

    /// `Ok(None)` both for ids that never existed and for expired tests.
    pub(crate) async fn get_test(&self, id: &str) -> Result<Option<TestRecord>, LinkStoreError> {
        let found = self.records.find_test(id).await.map_err(LinkStoreError::Transient)?;

        let record = match found {
            Some(record) if record.is_expired_at(self.clock.now()) => {
                tracing::debug!(test_id = %id, "Test expired; treating as absent");
                if let Err(err) = self.records.evict_test(id).await {
                    tracing::warn!(error = %err, test_id = %id, "Failed to evict expired test");
                }
                None
            }
            other => other,
        };

        metrics::record_lookup(record.is_some());
        Ok(record)
    }

    pub(crate) async fn resolve_document(&self, record: &TestRecord) -> Result<String, LinkStoreError> {
        self.blobs.resolve(&record.file_url).await.map_err(LinkStoreError::Transient)
    }

    /// Uploads every file concurrently, then writes one submission and one
    /// answer batch. Any failed upload fails the whole call even though other
    /// files may already be stored.
    pub(crate) async fn record_submission(
        &self,
        test_id: &str,
        files: Vec<FileUpload>,
        submitted_by: Option<String>,
    ) -> Result<SubmissionReceipt, LinkStoreError> {
        self.policy.validate_answers(&files)?;

        let submitted_at = self.clock.now();
        let uploads = files.iter().map(|file| {
            let stored_name = generate_file_name(&file.file_name, submitted_at);
            async move { self.blobs.put(BlobArea::AnswerDocuments, &stored_name, file).await }
        });
        let results = join_all(uploads).await;

        let mut references = Vec::with_capacity(results.len());
        let mut first_failure = None;
        for (file, result) in files.iter().zip(results) {
            match result {
                Ok(reference) => references.push(reference),
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        test_id = %test_id,
                        file_name = %file.file_name,
                        "Answer upload failed"
                    );
                    first_failure.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_failure {
            metrics::record_submission(false, 0);
            return Err(LinkStoreError::Transient(err.context("failed to upload answer files")));
        }

        let submission = SubmissionRecord {
            id: Uuid::new_v4().to_string(),
            test_id: test_id.to_string(),
            submitted_at,
            submitted_by,
        };
        let answers: Vec<AnswerFileRecord> = files
            .into_iter()
            .zip(references)
            .map(|(file, file_url)| AnswerFileRecord {
                id: Uuid::new_v4().to_string(),
                submission_id: submission.id.clone(),
                file_name: file.file_name,
                file_url,
            })
            .collect();

        let persisted = async {
            self.records.insert_submission(&submission).await?;
            self.records.insert_answer_files(&answers).await
        }
        .await;

        if let Err(err) = persisted {
            tracing::warn!(error = %err, test_id = %test_id, "Failed to persist submission");
            metrics::record_submission(false, 0);
            return Err(LinkStoreError::Transient(err));
        }

        metrics::record_submission(true, answers.len());
        tracing::info!(
            test_id = %test_id,
            submission_id = %submission.id,
            files = answers.len(),
            "Submission recorded"
        );
        Ok(SubmissionReceipt { submission, answers })
    }

    pub(crate) async fn get_submission(
        &self,
        id: &str,
    ) -> Result<Option<SubmissionReceipt>, LinkStoreError> {
        let Some(submission) =
            self.records.find_submission(id).await.map_err(LinkStoreError::Transient)?
        else {
            return Ok(None);
        };

        let answers =
            self.records.list_answer_files(id).await.map_err(LinkStoreError::Transient)?;
        Ok(Some(SubmissionReceipt { submission, answers }))
    }

    pub(crate) async fn health(&self) -> anyhow::Result<()> {
        self.records.health().await
    }
}

fn first_validation_message(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errors| errors.iter())
        .find_map(|error| error.message.as_ref().map(|message| message.to_string()))
        .unwrap_or_else(|| errors.to_string())
}
