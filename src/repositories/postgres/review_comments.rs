use sqlx::PgPool;

use crate::db::models::ReviewComment;

const COLUMNS: &str = "id, answer_id, reviewer_id, file_name, line_number, text, created_at";

pub(crate) async fn create(pool: &PgPool, comment: &ReviewComment) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO review_comments (
            id, answer_id, reviewer_id, file_name, line_number, text, created_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7)",
    )
    .bind(&comment.id)
    .bind(&comment.answer_id)
    .bind(&comment.reviewer_id)
    .bind(&comment.file_name)
    .bind(comment.line_number)
    .bind(&comment.text)
    .bind(comment.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn list_by_answer(
    pool: &PgPool,
    answer_id: &str,
) -> Result<Vec<ReviewComment>, sqlx::Error> {
    sqlx::query_as::<_, ReviewComment>(&format!(
        "SELECT {COLUMNS} FROM review_comments WHERE answer_id = $1 ORDER BY created_at DESC"
    ))
    .bind(answer_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_course(
    pool: &PgPool,
    course_id: &str,
) -> Result<Vec<ReviewComment>, sqlx::Error> {
    sqlx::query_as::<_, ReviewComment>(&format!(
        "SELECT {COLUMNS}
         FROM review_comments
         WHERE answer_id IN (
            SELECT a.id FROM answers a JOIN tasks t ON t.id = a.task_id WHERE t.course_id = $1
         )"
    ))
    .bind(course_id)
    .fetch_all(pool)
    .await
}
