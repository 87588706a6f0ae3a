use sqlx::PgPool;

use crate::db::models::SubmissionRow;

pub(crate) const COLUMNS: &str = "id, test_id, submitted_at, submitted_by";

pub(crate) async fn insert(pool: &PgPool, row: &SubmissionRow) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO test_submissions (id, test_id, submitted_at, submitted_by)
         VALUES ($1,$2,$3,$4)",
    )
    .bind(&row.id)
    .bind(&row.test_id)
    .bind(row.submitted_at)
    .bind(&row.submitted_by)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<SubmissionRow>, sqlx::Error> {
    sqlx::query_as::<_, SubmissionRow>(&format!(
        "SELECT {COLUMNS}
         FROM test_submissions
         WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}
