use serde::Serialize;

use crate::core::time::format_primitive;
use crate::db::models::Notification;

#[derive(Debug, Serialize)]
pub(crate) struct NotificationResponse {
    pub(crate) id: String,
    pub(crate) answer_id: Option<String>,
    pub(crate) title: String,
    pub(crate) message: String,
    pub(crate) created_at: String,
    pub(crate) is_read: bool,
}

impl NotificationResponse {
    pub(crate) fn from_db(notification: Notification) -> Self {
        Self {
            id: notification.id,
            answer_id: notification.answer_id,
            title: notification.title,
            message: notification.message,
            created_at: format_primitive(notification.created_at),
            is_read: notification.is_read,
        }
    }
}
