use sqlx::PgPool;

use crate::db::models::AnswerFile;

const COLUMNS: &str =
    "id, answer_id, file_name, relative_path, size_bytes, sha256, position, uploaded_at";

pub(crate) async fn list_by_answer(
    pool: &PgPool,
    answer_id: &str,
) -> Result<Vec<AnswerFile>, sqlx::Error> {
    sqlx::query_as::<_, AnswerFile>(&format!(
        "SELECT {COLUMNS} FROM answer_files WHERE answer_id = $1 ORDER BY position, uploaded_at"
    ))
    .bind(answer_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_task(
    pool: &PgPool,
    task_id: &str,
) -> Result<Vec<AnswerFile>, sqlx::Error> {
    sqlx::query_as::<_, AnswerFile>(&format!(
        "SELECT {COLUMNS}
         FROM answer_files
         WHERE answer_id IN (SELECT id FROM answers WHERE task_id = $1)"
    ))
    .bind(task_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_student(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<AnswerFile>, sqlx::Error> {
    sqlx::query_as::<_, AnswerFile>(&format!(
        "SELECT {COLUMNS}
         FROM answer_files
         WHERE answer_id IN (SELECT id FROM answers WHERE student_id = $1)"
    ))
    .bind(student_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn create_many(pool: &PgPool, files: &[AnswerFile]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for file in files {
        sqlx::query(
            "INSERT INTO answer_files (
                id, answer_id, file_name, relative_path, size_bytes, sha256, position, uploaded_at
             ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
        )
        .bind(&file.id)
        .bind(&file.answer_id)
        .bind(&file.file_name)
        .bind(&file.relative_path)
        .bind(file.size_bytes)
        .bind(&file.sha256)
        .bind(file.position)
        .bind(file.uploaded_at)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await
}

pub(crate) async fn delete_many(pool: &PgPool, ids: &[String]) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM answer_files WHERE id = ANY($1)")
        .bind(ids)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
