use sqlx::PgPool;

use crate::db::models::AnswerFileRow;

pub(crate) const COLUMNS: &str = "id, submission_id, file_name, file_url";

pub(crate) async fn insert_with_executor(
    executor: impl sqlx::PgExecutor<'_>,
    row: &AnswerFileRow,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO answer_files (id, submission_id, file_name, file_url)
         VALUES ($1,$2,$3,$4)",
    )
    .bind(&row.id)
    .bind(&row.submission_id)
    .bind(&row.file_name)
    .bind(&row.file_url)
    .execute(executor)
    .await?;
    Ok(())
}

/// All rows land in one transaction so a batch is either fully visible or absent.
pub(crate) async fn insert_batch(pool: &PgPool, rows: &[AnswerFileRow]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for row in rows {
        insert_with_executor(&mut *tx, row).await?;
    }
    tx.commit().await
}

pub(crate) async fn list_by_submission(
    pool: &PgPool,
    submission_id: &str,
) -> Result<Vec<AnswerFileRow>, sqlx::Error> {
    sqlx::query_as::<_, AnswerFileRow>(&format!(
        "SELECT {COLUMNS}
         FROM answer_files
         WHERE submission_id = $1
         ORDER BY position"
    ))
    .bind(submission_id)
    .fetch_all(pool)
    .await
}
