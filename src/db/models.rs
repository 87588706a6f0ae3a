use sqlx::FromRow;
use time::OffsetDateTime;

use crate::services::link_store::{AnswerFileRecord, SubmissionRecord, TestRecord};

#[derive(Debug, Clone, FromRow)]
pub(crate) struct TestFileRow {
    pub(crate) id: String,
    pub(crate) file_name: String,
    pub(crate) file_url: String,
    pub(crate) duration_minutes: i32,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) expires_at: OffsetDateTime,
    pub(crate) created_by: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct SubmissionRow {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) submitted_at: OffsetDateTime,
    pub(crate) submitted_by: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct AnswerFileRow {
    pub(crate) id: String,
    pub(crate) submission_id: String,
    pub(crate) file_name: String,
    pub(crate) file_url: String,
}

impl TryFrom<TestFileRow> for TestRecord {
    type Error = anyhow::Error;

    fn try_from(row: TestFileRow) -> Result<Self, Self::Error> {
        let duration_minutes = u32::try_from(row.duration_minutes).map_err(|_| {
            anyhow::anyhow!("test {} has invalid duration {}", row.id, row.duration_minutes)
        })?;

        Ok(Self {
            id: row.id,
            file_name: row.file_name,
            file_url: row.file_url,
            duration_minutes,
            created_at: row.created_at,
            expires_at: row.expires_at,
            created_by: row.created_by,
        })
    }
}

impl From<&TestRecord> for TestFileRow {
    fn from(record: &TestRecord) -> Self {
        Self {
            id: record.id.clone(),
            file_name: record.file_name.clone(),
            file_url: record.file_url.clone(),
            duration_minutes: record.duration_minutes as i32,
            created_at: record.created_at,
            expires_at: record.expires_at,
            created_by: record.created_by.clone(),
        }
    }
}

impl From<SubmissionRow> for SubmissionRecord {
    fn from(row: SubmissionRow) -> Self {
        Self {
            id: row.id,
            test_id: row.test_id,
            submitted_at: row.submitted_at,
            submitted_by: row.submitted_by,
        }
    }
}

impl From<&SubmissionRecord> for SubmissionRow {
    fn from(record: &SubmissionRecord) -> Self {
        Self {
            id: record.id.clone(),
            test_id: record.test_id.clone(),
            submitted_at: record.submitted_at,
            submitted_by: record.submitted_by.clone(),
        }
    }
}

impl From<AnswerFileRow> for AnswerFileRecord {
    fn from(row: AnswerFileRow) -> Self {
        Self {
            id: row.id,
            submission_id: row.submission_id,
            file_name: row.file_name,
            file_url: row.file_url,
        }
    }
}

impl From<&AnswerFileRecord> for AnswerFileRow {
    fn from(record: &AnswerFileRecord) -> Self {
        Self {
            id: record.id.clone(),
            submission_id: record.submission_id.clone(),
            file_name: record.file_name.clone(),
            file_url: record.file_url.clone(),
        }
    }
}
