use std::sync::Arc;

use uuid::Uuid;

use crate::core::metrics::REVIEW_COMMENTS;
use crate::core::time::primitive_now_utc;
use crate::db::models::{AnswerFile, ReviewComment, User};
use crate::repositories::ReviewStore;
use crate::services::access_policy::Operation;
use crate::services::error::{ReviewError, ReviewResult};
use crate::services::notifications::Notifier;
use crate::services::scope;
use crate::services::storage::BlobStore;

#[derive(Debug, Clone, Default)]
pub(crate) struct NewComment {
    pub(crate) file_name: Option<String>,
    pub(crate) line_number: Option<i64>,
    pub(crate) text: String,
}

/// Comments anchored to `active_file` plus every unanchored one.
pub(crate) fn visible_in(
    comments: Vec<ReviewComment>,
    active_file: Option<&str>,
) -> Vec<ReviewComment> {
    match active_file {
        None => comments,
        Some(active) => comments
            .into_iter()
            .filter(|comment| comment.file_name.as_deref().map_or(true, |name| name == active))
            .collect(),
    }
}

#[derive(Clone)]
pub(crate) struct CommentThreads {
    store: Arc<dyn ReviewStore>,
    blobs: Arc<dyn BlobStore>,
    notifier: Notifier,
}

impl CommentThreads {
    pub(crate) fn new(
        store: Arc<dyn ReviewStore>,
        blobs: Arc<dyn BlobStore>,
        notifier: Notifier,
    ) -> Self {
        Self { store, blobs, notifier }
    }

    pub(crate) async fn add_comment(
        &self,
        actor: &User,
        answer_id: &str,
        input: NewComment,
    ) -> ReviewResult<ReviewComment> {
        let scope = scope::load_answer(self.store.as_ref(), actor, answer_id).await?;
        scope.capabilities.require(Operation::AddComment)?;

        let text = input.text.trim();
        if text.is_empty() {
            return Err(ReviewError::invalid("Comment text must not be empty"));
        }

        let files = self.store.list_answer_files(&scope.answer.id).await?;
        let (file_name, line_number) = if files.is_empty() {
            if input.file_name.is_some() {
                return Err(ReviewError::invalid("This answer has no files to comment on"));
            }
            if input.line_number.is_some() {
                return Err(ReviewError::invalid("A line number needs a file to point into"));
            }
            (None, None)
        } else {
            let requested = input
                .file_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| ReviewError::invalid("Choose the file the comment refers to"))?;
            let file = files
                .iter()
                .find(|file| file.file_name == requested)
                .ok_or_else(|| {
                    ReviewError::invalid(format!("File {requested} is not part of this answer"))
                })?;
            let line = input
                .line_number
                .filter(|line| *line > 0)
                .and_then(|line| i32::try_from(line).ok())
                .ok_or_else(|| ReviewError::invalid("Line number must be a positive integer"))?;

            // An unreadable file cannot be checked; the anchor is kept as given.
            if let Some(lines) = self.readable_line_count(file).await {
                if line as usize > lines {
                    return Err(ReviewError::invalid(format!(
                        "Line {line} is past the end of {requested} ({lines} lines)"
                    )));
                }
            }
            (Some(file.file_name.clone()), Some(line))
        };

        let comment = ReviewComment {
            id: Uuid::new_v4().to_string(),
            answer_id: scope.answer.id.clone(),
            reviewer_id: Some(actor.id.clone()),
            file_name,
            line_number,
            text: text.to_string(),
            created_at: primitive_now_utc(),
        };
        self.store.insert_review_comment(&comment).await?;

        tracing::info!(
            answer_id = %comment.answer_id,
            reviewer_id = %actor.id,
            file_name = ?comment.file_name,
            line_number = ?comment.line_number,
            "Review comment added"
        );
        metrics::counter!(REVIEW_COMMENTS).increment(1);
        self.notifier.review_comment(&scope.answer, &comment);

        Ok(comment)
    }

    /// Line count of the stored file when it reads back as UTF-8 text,
    /// regardless of whether it can be previewed inline.
    async fn readable_line_count(&self, file: &AnswerFile) -> Option<usize> {
        let bytes = match self.blobs.read(&file.relative_path).await {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::warn!(
                    file_name = %file.file_name,
                    locator = %file.relative_path,
                    error = %error,
                    "Answer file could not be read; line anchor not checked"
                );
                return None;
            }
        };
        let content = String::from_utf8(bytes).ok()?;
        Some(content.lines().count().max(1))
    }

    pub(crate) async fn list_comments(
        &self,
        actor: &User,
        answer_id: &str,
        active_file: Option<&str>,
    ) -> ReviewResult<Vec<ReviewComment>> {
        let scope = scope::load_answer(self.store.as_ref(), actor, answer_id).await?;
        scope.capabilities.require(Operation::View)?;

        let comments = self.store.list_review_comments(&scope.answer.id).await?;
        Ok(visible_in(comments, active_file))
    }
}
