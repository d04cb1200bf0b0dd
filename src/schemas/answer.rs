use serde::{Deserialize, Serialize};

use crate::core::time::format_primitive;
use crate::db::models::{Answer, AnswerFile};
use crate::db::types::AnswerStatus;
use crate::schemas::review::ReviewRequestResponse;
use crate::services::access_policy::Capabilities;
use crate::services::answer_lifecycle::{AnswerDetail, AnswerListItem};

#[derive(Debug, Deserialize)]
pub(crate) struct FinalizeRequest {
    pub(crate) grade: i64,
    #[serde(default)]
    #[serde(alias = "allowResubmit")]
    pub(crate) allow_resubmit: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerResponse {
    pub(crate) id: String,
    pub(crate) task_id: String,
    pub(crate) student_id: String,
    pub(crate) text: String,
    pub(crate) grade: Option<i32>,
    pub(crate) status: AnswerStatus,
    pub(crate) review_requested: bool,
    pub(crate) allow_resubmit: bool,
    pub(crate) version: i32,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl AnswerResponse {
    pub(crate) fn from_db(answer: Answer) -> Self {
        let grade = answer.graded_value();
        Self {
            id: answer.id,
            task_id: answer.task_id,
            student_id: answer.student_id,
            text: answer.text,
            grade,
            status: answer.status,
            review_requested: answer.review_requested,
            allow_resubmit: answer.allow_resubmit,
            version: answer.version,
            created_at: format_primitive(answer.created_at),
            updated_at: format_primitive(answer.updated_at),
        }
    }
}

/// Storage locators stay server-side; clients address files by name.
#[derive(Debug, Serialize)]
pub(crate) struct AnswerFileResponse {
    pub(crate) id: String,
    pub(crate) file_name: String,
    pub(crate) size_bytes: i64,
    pub(crate) sha256: String,
    pub(crate) position: i32,
    pub(crate) uploaded_at: String,
}

impl AnswerFileResponse {
    pub(crate) fn from_db(file: AnswerFile) -> Self {
        Self {
            id: file.id,
            file_name: file.file_name,
            size_bytes: file.size_bytes,
            sha256: file.sha256,
            position: file.position,
            uploaded_at: format_primitive(file.uploaded_at),
        }
    }

    fn list(files: Vec<AnswerFile>) -> Vec<Self> {
        files.into_iter().map(Self::from_db).collect()
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerDetailResponse {
    #[serde(flatten)]
    pub(crate) answer: AnswerResponse,
    pub(crate) student_login: String,
    pub(crate) files: Vec<AnswerFileResponse>,
    pub(crate) review_requests: Vec<ReviewRequestResponse>,
    pub(crate) capabilities: Capabilities,
}

impl AnswerDetailResponse {
    pub(crate) fn from_detail(detail: AnswerDetail) -> Self {
        Self {
            answer: AnswerResponse::from_db(detail.answer),
            student_login: detail.student_login,
            files: AnswerFileResponse::list(detail.files),
            review_requests: detail
                .requests
                .into_iter()
                .map(ReviewRequestResponse::from_db)
                .collect(),
            capabilities: detail.capabilities,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerListItemResponse {
    #[serde(flatten)]
    pub(crate) answer: AnswerResponse,
    pub(crate) student_login: String,
    pub(crate) files: Vec<AnswerFileResponse>,
}

impl AnswerListItemResponse {
    pub(crate) fn from_item(item: AnswerListItem) -> Self {
        Self {
            answer: AnswerResponse::from_db(item.answer),
            student_login: item.student_login,
            files: AnswerFileResponse::list(item.files),
        }
    }
}
