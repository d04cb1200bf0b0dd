use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{ReviewComment, ReviewRequest};
use crate::db::types::AnswerStatus;
use crate::services::review_assignments::AssignedReview;
use crate::services::review_comments::NewComment;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ReviewerAssign {
    #[validate(length(min = 1, message = "login must not be empty"))]
    pub(crate) login: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommentCreate {
    #[serde(default)]
    #[serde(alias = "fileName")]
    pub(crate) file_name: Option<String>,
    #[serde(default)]
    #[serde(alias = "lineNumber")]
    pub(crate) line_number: Option<i64>,
    pub(crate) text: String,
}

impl CommentCreate {
    pub(crate) fn into_new_comment(self) -> NewComment {
        NewComment { file_name: self.file_name, line_number: self.line_number, text: self.text }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommentQuery {
    #[serde(default)]
    pub(crate) file: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReviewRequestResponse {
    pub(crate) id: String,
    pub(crate) answer_id: String,
    pub(crate) reviewer_id: String,
    pub(crate) created_at: String,
    pub(crate) completed: bool,
}

impl ReviewRequestResponse {
    pub(crate) fn from_db(request: ReviewRequest) -> Self {
        Self {
            id: request.id,
            answer_id: request.answer_id,
            reviewer_id: request.reviewer_id,
            created_at: format_primitive(request.created_at),
            completed: request.completed,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AssignedReviewResponse {
    #[serde(flatten)]
    pub(crate) request: ReviewRequestResponse,
    pub(crate) answer_status: AnswerStatus,
    pub(crate) task_id: String,
    pub(crate) task_name: String,
    pub(crate) course_id: String,
    pub(crate) course_name: String,
    pub(crate) student_login: String,
}

impl AssignedReviewResponse {
    pub(crate) fn from_assigned(assigned: AssignedReview) -> Self {
        Self {
            request: ReviewRequestResponse::from_db(assigned.request),
            answer_status: assigned.answer_status,
            task_id: assigned.task_id,
            task_name: assigned.task_name,
            course_id: assigned.course_id,
            course_name: assigned.course_name,
            student_login: assigned.student_login,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CommentResponse {
    pub(crate) id: String,
    pub(crate) answer_id: String,
    pub(crate) reviewer_id: Option<String>,
    pub(crate) file_name: Option<String>,
    pub(crate) line_number: Option<i32>,
    pub(crate) text: String,
    pub(crate) created_at: String,
}

impl CommentResponse {
    pub(crate) fn from_db(comment: ReviewComment) -> Self {
        Self {
            id: comment.id,
            answer_id: comment.answer_id,
            reviewer_id: comment.reviewer_id,
            file_name: comment.file_name,
            line_number: comment.line_number,
            text: comment.text,
            created_at: format_primitive(comment.created_at),
        }
    }
}
