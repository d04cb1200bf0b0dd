use sqlx::PgPool;

use crate::db::models::Task;

const COLUMNS: &str = "id, course_id, name, description, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!("SELECT {COLUMNS} FROM tasks WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_by_course(
    pool: &PgPool,
    course_id: &str,
) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!(
        "SELECT {COLUMNS} FROM tasks WHERE course_id = $1 ORDER BY created_at, id"
    ))
    .bind(course_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn create(pool: &PgPool, task: &Task) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO tasks (id, course_id, name, description, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$5,$6)",
    )
    .bind(&task.id)
    .bind(&task.course_id)
    .bind(&task.name)
    .bind(&task.description)
    .bind(task.created_at)
    .bind(task.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn update(pool: &PgPool, task: &Task) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE tasks SET name = $1, description = $2, updated_at = $3 WHERE id = $4")
            .bind(&task.name)
            .bind(&task.description)
            .bind(task.updated_at)
            .bind(&task.id)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// Answers, files, requests and comments go with it through `ON DELETE CASCADE`.
pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
