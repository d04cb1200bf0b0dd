use sqlx::PgPool;

use crate::db::models::{Course, User};
use crate::db::types::CourseRole;

const COURSE_COLUMNS: &str = "id, name, description, created_by, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list(pool: &PgPool) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!("SELECT {COURSE_COLUMNS} FROM courses ORDER BY name"))
        .fetch_all(pool)
        .await
}

pub(crate) async fn list_for_member(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "SELECT {COURSE_COLUMNS}
         FROM courses
         WHERE id IN (
            SELECT course_id FROM course_authors WHERE user_id = $1
            UNION
            SELECT course_id FROM course_participants WHERE user_id = $1
         )
         ORDER BY name"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn create(pool: &PgPool, course: &Course) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO courses (id, name, description, created_by, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$5,$6)",
    )
    .bind(&course.id)
    .bind(&course.name)
    .bind(&course.description)
    .bind(&course.created_by)
    .bind(course.created_at)
    .bind(course.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn update(pool: &PgPool, course: &Course) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE courses SET name = $1, description = $2, updated_at = $3 WHERE id = $4",
    )
    .bind(&course.name)
    .bind(&course.description)
    .bind(course.updated_at)
    .bind(&course.id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

fn member_table(role: CourseRole) -> &'static str {
    match role {
        CourseRole::Author => "course_authors",
        CourseRole::Participant => "course_participants",
    }
}

pub(crate) async fn list_members(
    pool: &PgPool,
    course_id: &str,
    role: CourseRole,
) -> Result<Vec<User>, sqlx::Error> {
    let table = member_table(role);
    sqlx::query_as::<_, User>(&format!(
        "SELECT u.id, u.login, u.email, u.full_name, u.hashed_password, u.is_admin,
                u.is_active, u.created_at, u.updated_at
         FROM users u
         JOIN {table} m ON m.user_id = u.id
         WHERE m.course_id = $1
         ORDER BY u.login"
    ))
    .bind(course_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn add_member(
    pool: &PgPool,
    course_id: &str,
    user_id: &str,
    role: CourseRole,
) -> Result<bool, sqlx::Error> {
    let table = member_table(role);
    let result = sqlx::query(&format!(
        "INSERT INTO {table} (course_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING"
    ))
    .bind(course_id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn remove_member(
    pool: &PgPool,
    course_id: &str,
    user_id: &str,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut removed = 0;
    for role in [CourseRole::Author, CourseRole::Participant] {
        let table = member_table(role);
        removed += sqlx::query(&format!(
            "DELETE FROM {table} WHERE course_id = $1 AND user_id = $2"
        ))
        .bind(course_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }
    tx.commit().await?;
    Ok(removed > 0)
}
