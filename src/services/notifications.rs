//! Outbound notifications about review activity.
//!
//! Delivery is fire-and-forget: [`Notifier`] spawns every send and only logs
//! and counts failures, so a broken sink can never undo a committed change.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::core::metrics::NOTIFICATION_FAILURES;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Answer, Notification, ReviewComment, ReviewRequest, User};
use crate::db::types::AnswerStatus;
use crate::repositories::{ReviewStore, StoreError};
use crate::services::email::{self, Mailer};
use crate::services::error::ReviewResult;

pub(crate) const COMMENT_PREVIEW_CHARS: usize = 150;
pub(crate) const INBOX_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub(crate) enum NotifyError {
    #[error("notification store failed: {0}")]
    Store(#[from] StoreError),
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub(crate) trait NotificationSink: Send + Sync {
    async fn status_changed(&self, answer: &Answer, status_label: &str) -> Result<(), NotifyError>;
    async fn review_comment(
        &self,
        answer: &Answer,
        comment: &ReviewComment,
    ) -> Result<(), NotifyError>;
    async fn reviewer_assigned(&self, request: &ReviewRequest) -> Result<(), NotifyError>;
}

/// Human-readable status text used in notification messages.
pub(crate) fn status_label(status: AnswerStatus) -> &'static str {
    match status {
        AnswerStatus::Draft => "draft",
        AnswerStatus::AwaitingReview => "awaiting review",
        AnswerStatus::Reviewed => "reviewed",
        AnswerStatus::ResubmitAllowed => "resubmission allowed",
    }
}

pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[derive(Clone)]
pub(crate) struct Notifier {
    sink: Arc<dyn NotificationSink>,
}

impl Notifier {
    pub(crate) fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    pub(crate) fn status_changed(&self, answer: &Answer) {
        let sink = self.sink.clone();
        let answer = answer.clone();
        tokio::spawn(async move {
            let label = status_label(answer.status);
            report("status_changed", &answer.id, sink.status_changed(&answer, label).await);
        });
    }

    pub(crate) fn review_comment(&self, answer: &Answer, comment: &ReviewComment) {
        let sink = self.sink.clone();
        let answer = answer.clone();
        let comment = comment.clone();
        tokio::spawn(async move {
            report("review_comment", &answer.id, sink.review_comment(&answer, &comment).await);
        });
    }

    pub(crate) fn reviewer_assigned(&self, request: &ReviewRequest) {
        let sink = self.sink.clone();
        let request = request.clone();
        tokio::spawn(async move {
            report(
                "reviewer_assigned",
                &request.answer_id,
                sink.reviewer_assigned(&request).await,
            );
        });
    }
}

fn report(kind: &'static str, answer_id: &str, outcome: Result<(), NotifyError>) {
    if let Err(error) = outcome {
        tracing::warn!(kind, answer_id, error = %error, "Notification dropped");
        metrics::counter!(NOTIFICATION_FAILURES, "kind" => kind).increment(1);
    }
}

/// Stores notifications so users can read them from their inbox, and mails
/// a copy when a mailer is configured.
pub(crate) struct StoreNotificationSink {
    store: Arc<dyn ReviewStore>,
    mailer: Option<Arc<dyn Mailer>>,
}

impl StoreNotificationSink {
    pub(crate) fn new(store: Arc<dyn ReviewStore>) -> Self {
        Self { store, mailer: None }
    }

    pub(crate) fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    async fn task_name(&self, answer: &Answer) -> Result<String, NotifyError> {
        Ok(self
            .store
            .find_task(&answer.task_id)
            .await?
            .map(|task| task.name)
            .unwrap_or_else(|| "unknown task".to_string()))
    }

    async fn login_or(&self, user_id: Option<&str>, fallback: &str) -> Result<String, NotifyError> {
        let user = match user_id {
            Some(id) => self.store.find_user(id).await?,
            None => None,
        };
        Ok(user.map(|user| user.login).unwrap_or_else(|| fallback.to_string()))
    }

    async fn push(
        &self,
        user_id: &str,
        answer_id: &str,
        title: &str,
        message: String,
    ) -> Result<(), NotifyError> {
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            answer_id: Some(answer_id.to_string()),
            title: title.to_string(),
            message,
            created_at: primitive_now_utc(),
            is_read: false,
        };
        self.store.insert_notification(&notification).await?;
        tracing::debug!(user_id, answer_id, title, "Notification stored");

        if let Some(mailer) = &self.mailer {
            match self.store.find_user(user_id).await? {
                Some(user) => {
                    email::deliver(mailer.as_ref(), &user, title, &notification.message).await;
                }
                None => tracing::debug!(user_id, "Recipient is gone; notification not mailed"),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for StoreNotificationSink {
    async fn status_changed(&self, answer: &Answer, status_label: &str) -> Result<(), NotifyError> {
        let task_name = self.task_name(answer).await?;
        let message =
            format!("The status of your answer to \"{task_name}\" is now: {status_label}.");
        self.push(&answer.student_id, &answer.id, "Answer status changed", message).await
    }

    async fn review_comment(
        &self,
        answer: &Answer,
        comment: &ReviewComment,
    ) -> Result<(), NotifyError> {
        let task_name = self.task_name(answer).await?;
        let reviewer = self.login_or(comment.reviewer_id.as_deref(), "reviewer").await?;
        let message = format!(
            "New comment from {reviewer} on \"{task_name}\": {}",
            preview(&comment.text, COMMENT_PREVIEW_CHARS)
        );
        self.push(&answer.student_id, &answer.id, "New review comment", message).await
    }

    async fn reviewer_assigned(&self, request: &ReviewRequest) -> Result<(), NotifyError> {
        let Some(answer) = self.store.find_answer(&request.answer_id).await? else {
            return Err(NotifyError::Delivery(format!(
                "answer {} no longer exists",
                request.answer_id
            )));
        };
        let task_name = self.task_name(&answer).await?;
        let student = self.login_or(Some(&answer.student_id), "student").await?;
        let message =
            format!("You have been asked to review the answer from {student} to \"{task_name}\".");
        self.push(&request.reviewer_id, &answer.id, "New review request", message).await
    }
}

/// The newest notifications of `user`. Returned rows keep their previous
/// read flag; the unread ones are marked read in the store.
pub(crate) async fn inbox(
    store: &dyn ReviewStore,
    user: &User,
) -> ReviewResult<Vec<Notification>> {
    let notifications = store.list_notifications_for_user(&user.id, INBOX_LIMIT).await?;
    let unread: Vec<String> = notifications
        .iter()
        .filter(|notification| !notification.is_read)
        .map(|notification| notification.id.clone())
        .collect();
    if !unread.is_empty() {
        store.mark_notifications_read(&unread).await?;
    }
    Ok(notifications)
}
