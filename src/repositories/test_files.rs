use sqlx::PgPool;

use crate::db::models::TestFileRow;

pub(crate) const COLUMNS: &str =
    "id, file_name, file_url, duration_minutes, created_at, expires_at, created_by";

pub(crate) async fn insert(pool: &PgPool, row: &TestFileRow) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO test_files (
            id, file_name, file_url, duration_minutes, created_at, expires_at, created_by
        ) VALUES ($1,$2,$3,$4,$5,$6,$7)",
    )
    .bind(&row.id)
    .bind(&row.file_name)
    .bind(&row.file_url)
    .bind(row.duration_minutes)
    .bind(row.created_at)
    .bind(row.expires_at)
    .bind(&row.created_by)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<TestFileRow>, sqlx::Error> {
    sqlx::query_as::<_, TestFileRow>(&format!(
        "SELECT {COLUMNS}
         FROM test_files
         WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}
