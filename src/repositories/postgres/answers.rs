use sqlx::PgPool;

use crate::db::models::Answer;

const COLUMNS: &str = "\
    id, task_id, student_id, text, grade, status, review_requested, allow_resubmit, \
    version, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!("SELECT {COLUMNS} FROM answers WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_by_task(pool: &PgPool, task_id: &str) -> Result<Vec<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "SELECT {COLUMNS} FROM answers WHERE task_id = $1 ORDER BY created_at, id"
    ))
    .bind(task_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_course(
    pool: &PgPool,
    course_id: &str,
) -> Result<Vec<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "SELECT {COLUMNS}
         FROM answers
         WHERE task_id IN (SELECT id FROM tasks WHERE course_id = $1)
         ORDER BY created_at, id"
    ))
    .bind(course_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn create(pool: &PgPool, answer: &Answer) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO answers (
            id, task_id, student_id, text, grade, status, review_requested,
            allow_resubmit, version, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)",
    )
    .bind(&answer.id)
    .bind(&answer.task_id)
    .bind(&answer.student_id)
    .bind(&answer.text)
    .bind(answer.grade)
    .bind(answer.status)
    .bind(answer.review_requested)
    .bind(answer.allow_resubmit)
    .bind(answer.version)
    .bind(answer.created_at)
    .bind(answer.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Compare-and-swap on `version`; `None` when the stored row moved on.
pub(crate) async fn update_versioned(
    pool: &PgPool,
    answer: &Answer,
    expected_version: i32,
) -> Result<Option<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "UPDATE answers
         SET text = $1,
             grade = $2,
             status = $3,
             review_requested = $4,
             allow_resubmit = $5,
             updated_at = $6,
             version = version + 1
         WHERE id = $7 AND version = $8
         RETURNING {COLUMNS}"
    ))
    .bind(&answer.text)
    .bind(answer.grade)
    .bind(answer.status)
    .bind(answer.review_requested)
    .bind(answer.allow_resubmit)
    .bind(answer.updated_at)
    .bind(&answer.id)
    .bind(expected_version)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM answers WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
