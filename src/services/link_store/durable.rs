use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use super::{AnswerFileRecord, RecordStore, SubmissionRecord, TestRecord};
use crate::db::models::{AnswerFileRow, SubmissionRow, TestFileRow};
use crate::repositories;

/// Rows in the `test_files`, `test_submissions` and `answer_files` tables.
#[derive(Debug, Clone)]
pub(crate) struct PgRecords {
    pool: PgPool,
}

impl PgRecords {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecords {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn insert_test(&self, record: &TestRecord) -> anyhow::Result<()> {
        repositories::test_files::insert(&self.pool, &TestFileRow::from(record))
            .await
            .context("insert test_files row")
    }

    async fn find_test(&self, id: &str) -> anyhow::Result<Option<TestRecord>> {
        let row = repositories::test_files::find_by_id(&self.pool, id)
            .await
            .context("fetch test_files row")?;
        row.map(TestRecord::try_from).transpose()
    }

    /// Rows outlive their validity window; submissions reference them by key.
    async fn evict_test(&self, id: &str) -> anyhow::Result<()> {
        tracing::debug!(test_id = %id, "Keeping expired test row");
        Ok(())
    }

    async fn insert_submission(&self, submission: &SubmissionRecord) -> anyhow::Result<()> {
        repositories::submissions::insert(&self.pool, &SubmissionRow::from(submission))
            .await
            .context("insert test_submissions row")
    }

    async fn insert_answer_files(&self, files: &[AnswerFileRecord]) -> anyhow::Result<()> {
        let rows: Vec<AnswerFileRow> = files.iter().map(AnswerFileRow::from).collect();
        repositories::answer_files::insert_batch(&self.pool, &rows)
            .await
            .context("insert answer_files batch")
    }

    async fn find_submission(&self, id: &str) -> anyhow::Result<Option<SubmissionRecord>> {
        let row = repositories::submissions::find_by_id(&self.pool, id)
            .await
            .context("fetch test_submissions row")?;
        Ok(row.map(SubmissionRecord::from))
    }

    async fn list_answer_files(
        &self,
        submission_id: &str,
    ) -> anyhow::Result<Vec<AnswerFileRecord>> {
        let rows = repositories::answer_files::list_by_submission(&self.pool, submission_id)
            .await
            .context("fetch answer_files rows")?;
        Ok(rows.into_iter().map(AnswerFileRecord::from).collect())
    }

    async fn health(&self) -> anyhow::Result<()> {
        repositories::ping(&self.pool).await.context("database ping")
    }
}
