use serde::{Deserialize, Serialize};
use sqlx::Type;

/// Review state of an answer. Labels shown to people live with the
/// notification texts, never here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "answer_status", rename_all = "snake_case")]
pub(crate) enum AnswerStatus {
    Draft,
    AwaitingReview,
    Reviewed,
    ResubmitAllowed,
}

impl AnswerStatus {
    pub(crate) const ALL: [AnswerStatus; 4] = [
        AnswerStatus::Draft,
        AnswerStatus::AwaitingReview,
        AnswerStatus::Reviewed,
        AnswerStatus::ResubmitAllowed,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum CourseRole {
    Author,
    Participant,
}
