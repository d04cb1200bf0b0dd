use sqlx::PgPool;

use crate::db::models::Notification;

const COLUMNS: &str = "id, user_id, answer_id, title, message, created_at, is_read";

pub(crate) async fn create(pool: &PgPool, notification: &Notification) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO notifications (id, user_id, answer_id, title, message, created_at, is_read)
         VALUES ($1,$2,$3,$4,$5,$6,$7)",
    )
    .bind(&notification.id)
    .bind(&notification.user_id)
    .bind(&notification.answer_id)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(notification.created_at)
    .bind(notification.is_read)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn list_for_user(
    pool: &PgPool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<Notification>, sqlx::Error> {
    sqlx::query_as::<_, Notification>(&format!(
        "SELECT {COLUMNS} FROM notifications WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2"
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub(crate) async fn mark_read(pool: &PgPool, ids: &[String]) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = ANY($1) AND NOT is_read")
            .bind(ids)
            .execute(pool)
            .await?;
    Ok(result.rows_affected())
}
