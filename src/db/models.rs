use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::AnswerStatus;

/// Stored marker for an answer that carries no grade.
pub(crate) const UNGRADED: i32 = -1;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) login: String,
    pub(crate) email: Option<String>,
    pub(crate) full_name: String,
    pub(crate) hashed_password: String,
    pub(crate) is_admin: bool,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Course {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) created_by: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Task {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Answer {
    pub(crate) id: String,
    pub(crate) task_id: String,
    pub(crate) student_id: String,
    pub(crate) text: String,
    pub(crate) grade: i32,
    pub(crate) status: AnswerStatus,
    pub(crate) review_requested: bool,
    pub(crate) allow_resubmit: bool,
    /// Optimistic concurrency token, bumped by every successful update.
    pub(crate) version: i32,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

impl Answer {
    pub(crate) fn graded_value(&self) -> Option<i32> {
        (self.grade != UNGRADED).then_some(self.grade)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AnswerFile {
    pub(crate) id: String,
    pub(crate) answer_id: String,
    pub(crate) file_name: String,
    pub(crate) relative_path: String,
    pub(crate) size_bytes: i64,
    pub(crate) sha256: String,
    pub(crate) position: i32,
    pub(crate) uploaded_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ReviewRequest {
    pub(crate) id: String,
    pub(crate) answer_id: String,
    pub(crate) reviewer_id: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ReviewComment {
    pub(crate) id: String,
    pub(crate) answer_id: String,
    pub(crate) reviewer_id: Option<String>,
    pub(crate) file_name: Option<String>,
    pub(crate) line_number: Option<i32>,
    pub(crate) text: String,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Notification {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) answer_id: Option<String>,
    pub(crate) title: String,
    pub(crate) message: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) is_read: bool,
}
