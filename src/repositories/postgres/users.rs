use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::User;

const COLUMNS: &str =
    "id, login, email, full_name, hashed_password, is_admin, is_active, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_by_login(pool: &PgPool, login: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE login = $1"))
        .bind(login)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list(pool: &PgPool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users ORDER BY login"))
        .fetch_all(pool)
        .await
}

pub(crate) async fn create(pool: &PgPool, user: &User) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO users (
            id, login, email, full_name, hashed_password, is_admin, is_active,
            created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
         ON CONFLICT (login) DO NOTHING",
    )
    .bind(&user.id)
    .bind(&user.login)
    .bind(&user.email)
    .bind(&user.full_name)
    .bind(&user.hashed_password)
    .bind(user.is_admin)
    .bind(user.is_active)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn update(pool: &PgPool, user: &User) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users
         SET login = $1,
             email = $2,
             full_name = $3,
             hashed_password = $4,
             is_admin = $5,
             is_active = $6,
             updated_at = $7
         WHERE id = $8",
    )
    .bind(&user.login)
    .bind(&user.email)
    .bind(&user.full_name)
    .bind(&user.hashed_password)
    .bind(user.is_admin)
    .bind(user.is_active)
    .bind(user.updated_at)
    .bind(&user.id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn set_active(
    pool: &PgPool,
    id: &str,
    is_active: bool,
    updated_at: PrimitiveDateTime,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET is_active = $1, updated_at = $2 WHERE id = $3 RETURNING {COLUMNS}"
    ))
    .bind(is_active)
    .bind(updated_at)
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Memberships, answers, requests and notifications go with the row through
/// the foreign keys; authored comments keep a NULL reviewer.
pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
