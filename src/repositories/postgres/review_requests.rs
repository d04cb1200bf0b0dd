use sqlx::PgPool;

use crate::db::models::ReviewRequest;

const COLUMNS: &str = "id, answer_id, reviewer_id, created_at, completed";

pub(crate) async fn list_by_answer(
    pool: &PgPool,
    answer_id: &str,
) -> Result<Vec<ReviewRequest>, sqlx::Error> {
    sqlx::query_as::<_, ReviewRequest>(&format!(
        "SELECT {COLUMNS} FROM review_requests WHERE answer_id = $1 ORDER BY created_at, id"
    ))
    .bind(answer_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_reviewer(
    pool: &PgPool,
    reviewer_id: &str,
) -> Result<Vec<ReviewRequest>, sqlx::Error> {
    sqlx::query_as::<_, ReviewRequest>(&format!(
        "SELECT {COLUMNS} FROM review_requests WHERE reviewer_id = $1 ORDER BY created_at DESC"
    ))
    .bind(reviewer_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_course(
    pool: &PgPool,
    course_id: &str,
) -> Result<Vec<ReviewRequest>, sqlx::Error> {
    sqlx::query_as::<_, ReviewRequest>(&format!(
        "SELECT {COLUMNS}
         FROM review_requests
         WHERE answer_id IN (
            SELECT a.id FROM answers a JOIN tasks t ON t.id = a.task_id WHERE t.course_id = $1
         )"
    ))
    .bind(course_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn create(pool: &PgPool, request: &ReviewRequest) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO review_requests (id, answer_id, reviewer_id, created_at, completed)
         VALUES ($1,$2,$3,$4,$5)
         ON CONFLICT (answer_id, reviewer_id) DO NOTHING",
    )
    .bind(&request.id)
    .bind(&request.answer_id)
    .bind(&request.reviewer_id)
    .bind(request.created_at)
    .bind(request.completed)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn set_completed(
    pool: &PgPool,
    answer_id: &str,
    completed: bool,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE review_requests SET completed = $1 WHERE answer_id = $2")
        .bind(completed)
        .bind(answer_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM review_requests WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
