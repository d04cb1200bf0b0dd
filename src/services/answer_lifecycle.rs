//! Student-facing answer operations and the instructor decisions on them.

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::core::metrics::ANSWER_TRANSITIONS;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Answer, AnswerFile, ReviewRequest, User, UNGRADED};
use crate::db::types::AnswerStatus;
use crate::repositories::ReviewStore;
use crate::services::access_policy::{Capabilities, Operation};
use crate::services::answer_state::{self, Grade, Transition};
use crate::services::error::{ReviewError, ReviewResult};
use crate::services::notifications::Notifier;
use crate::services::preview::{self, FilePreview};
use crate::services::scope;
use crate::services::storage::{self, BlobStore, StoredBlob};

#[derive(Debug, Clone)]
pub(crate) struct FileUpload {
    pub(crate) file_name: String,
    pub(crate) bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct UploadLimits {
    pub(crate) max_file_bytes: u64,
    pub(crate) max_files: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct AnswerDetail {
    pub(crate) answer: Answer,
    pub(crate) student_login: String,
    pub(crate) files: Vec<AnswerFile>,
    pub(crate) requests: Vec<ReviewRequest>,
    pub(crate) capabilities: Capabilities,
}

#[derive(Debug, Clone)]
pub(crate) struct AnswerListItem {
    pub(crate) answer: Answer,
    pub(crate) student_login: String,
    pub(crate) files: Vec<AnswerFile>,
}

fn check_uploads(uploads: &[FileUpload], limits: UploadLimits) -> ReviewResult<()> {
    if uploads.len() > limits.max_files {
        return Err(ReviewError::invalid(format!(
            "Too many files: at most {} per answer",
            limits.max_files
        )));
    }

    let mut seen = HashSet::new();
    for upload in uploads {
        let name = storage::display_name(&upload.file_name);
        if upload.bytes.len() as u64 > limits.max_file_bytes {
            return Err(ReviewError::invalid(format!(
                "File {name} exceeds the {} byte limit",
                limits.max_file_bytes
            )));
        }
        if !seen.insert(name.clone()) {
            return Err(ReviewError::invalid(format!("File {name} was uploaded twice")));
        }
    }
    Ok(())
}

fn file_rows(answer_id: &str, blobs: &[StoredBlob]) -> Vec<AnswerFile> {
    let uploaded_at = primitive_now_utc();
    blobs
        .iter()
        .enumerate()
        .map(|(position, blob)| AnswerFile {
            id: Uuid::new_v4().to_string(),
            answer_id: answer_id.to_string(),
            file_name: blob.file_name.clone(),
            relative_path: blob.locator.clone(),
            size_bytes: blob.size,
            sha256: blob.sha256.clone(),
            position: position as i32,
            uploaded_at,
        })
        .collect()
}

#[derive(Clone)]
pub(crate) struct AnswerLifecycle {
    store: Arc<dyn ReviewStore>,
    blobs: Arc<dyn BlobStore>,
    notifier: Notifier,
    limits: UploadLimits,
}

impl AnswerLifecycle {
    pub(crate) fn new(
        store: Arc<dyn ReviewStore>,
        blobs: Arc<dyn BlobStore>,
        notifier: Notifier,
        limits: UploadLimits,
    ) -> Self {
        Self { store, blobs, notifier, limits }
    }

    /// Saves every upload or none of them.
    async fn store_blobs(&self, uploads: Vec<FileUpload>) -> ReviewResult<Vec<StoredBlob>> {
        let mut stored = Vec::with_capacity(uploads.len());
        for upload in uploads {
            match self.blobs.save(upload.bytes, &upload.file_name).await {
                Ok(blob) => stored.push(blob),
                Err(error) => {
                    tracing::warn!(
                        file_name = %upload.file_name,
                        error = %error,
                        "Answer file upload failed"
                    );
                    self.release(&stored_locators(&stored)).await;
                    return Err(ReviewError::Unavailable(format!(
                        "File {} could not be stored",
                        storage::display_name(&upload.file_name)
                    )));
                }
            }
        }
        Ok(stored)
    }

    /// Best-effort removal; a leftover blob is only wasted space.
    async fn release(&self, locators: &[String]) {
        for locator in locators {
            if let Err(error) = self.blobs.delete(locator).await {
                tracing::warn!(locator = %locator, error = %error, "Failed to release answer file");
            }
        }
    }

    async fn student_login(&self, answer: &Answer) -> ReviewResult<String> {
        Ok(self
            .store
            .find_user(&answer.student_id)
            .await?
            .map(|user| user.login)
            .unwrap_or_default())
    }

    pub(crate) async fn submit(
        &self,
        actor: &User,
        task_id: &str,
        text: &str,
        uploads: Vec<FileUpload>,
    ) -> ReviewResult<AnswerDetail> {
        let store = self.store.as_ref();
        let task = scope::load_task(store, actor, task_id).await?;
        task.course.roles.require_view()?;
        check_uploads(&uploads, self.limits)?;

        let blobs = self.store_blobs(uploads).await?;
        let now = primitive_now_utc();
        let answer = Answer {
            id: Uuid::new_v4().to_string(),
            task_id: task.task.id.clone(),
            student_id: actor.id.clone(),
            text: text.trim().to_string(),
            grade: UNGRADED,
            status: AnswerStatus::Draft,
            review_requested: false,
            allow_resubmit: false,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        let files = file_rows(&answer.id, &blobs);

        let persisted = async {
            store.insert_answer(&answer).await?;
            store.insert_answer_files(&files).await
        };
        if let Err(error) = persisted.await {
            self.release(&stored_locators(&blobs)).await;
            return Err(error.into());
        }

        tracing::info!(
            answer_id = %answer.id,
            task_id = %answer.task_id,
            student_id = %actor.id,
            files = files.len(),
            "Answer submitted"
        );
        metrics::counter!(ANSWER_TRANSITIONS, "action" => "submit").increment(1);

        self.detail(actor, &answer.id).await
    }

    /// Replaces the text and, when `replacement` is given, the whole file set.
    ///
    /// New blobs are stored before anything else changes and old ones are
    /// released only after the new file rows exist.
    pub(crate) async fn edit(
        &self,
        actor: &User,
        answer_id: &str,
        text: &str,
        replacement: Option<Vec<FileUpload>>,
    ) -> ReviewResult<AnswerDetail> {
        let store = self.store.as_ref();
        let scope = scope::load_answer(store, actor, answer_id).await?;
        scope.capabilities.require(Operation::Edit)?;
        if let Some(uploads) = &replacement {
            check_uploads(uploads, self.limits)?;
        }

        let new_blobs = match replacement {
            Some(uploads) => Some(self.store_blobs(uploads).await?),
            None => None,
        };
        let new_locators = new_blobs.as_deref().map(stored_locators).unwrap_or_default();

        // New rows go in before the commit so a failed insert leaves the
        // answer untouched; the old rows are dropped only once it committed.
        let mut replaced: Option<(Vec<AnswerFile>, Vec<AnswerFile>)> = None;
        if let Some(blobs) = &new_blobs {
            let old_files = match store.list_answer_files(&scope.answer.id).await {
                Ok(files) => files,
                Err(error) => {
                    self.release(&new_locators).await;
                    return Err(error.into());
                }
            };
            let new_files = file_rows(&scope.answer.id, blobs);
            if let Err(error) = store.insert_answer_files(&new_files).await {
                self.release(&new_locators).await;
                return Err(error.into());
            }
            replaced = Some((old_files, new_files));
        }

        let transition = Transition::Edit { text: text.trim().to_string() };
        let answer = match answer_state::commit(store, &scope.answer, transition).await {
            Ok(answer) => answer,
            Err(error) => {
                if let Some((_, new_files)) = &replaced {
                    let new_ids: Vec<String> =
                        new_files.iter().map(|file| file.id.clone()).collect();
                    if let Err(cleanup) = store.delete_answer_files(&new_ids).await {
                        tracing::warn!(
                            answer_id = %scope.answer.id,
                            error = %cleanup,
                            "Failed to drop file rows of an aborted edit"
                        );
                    }
                }
                self.release(&new_locators).await;
                return Err(error);
            }
        };

        if let Some((old_files, new_files)) = replaced {
            let old_ids: Vec<String> = old_files.iter().map(|file| file.id.clone()).collect();
            store.delete_answer_files(&old_ids).await?;
            let old_locators: Vec<String> =
                old_files.into_iter().map(|file| file.relative_path).collect();
            self.release(&old_locators).await;

            tracing::info!(
                answer_id = %answer.id,
                replaced = old_ids.len(),
                added = new_files.len(),
                "Answer files replaced"
            );
        }

        self.detail(actor, &answer.id).await
    }

    pub(crate) async fn request_review(
        &self,
        actor: &User,
        answer_id: &str,
    ) -> ReviewResult<Answer> {
        let store = self.store.as_ref();
        let scope = scope::load_answer(store, actor, answer_id).await?;
        scope.capabilities.require(Operation::RequestReview)?;
        answer_state::commit(store, &scope.answer, Transition::RequestReview).await
    }

    pub(crate) async fn finalize(
        &self,
        actor: &User,
        answer_id: &str,
        grade: i64,
        allow_resubmit: bool,
    ) -> ReviewResult<Answer> {
        let store = self.store.as_ref();
        let scope = scope::load_answer(store, actor, answer_id).await?;
        scope.capabilities.require(Operation::Finalize)?;
        let grade = Grade::new(grade)?;

        let transition = Transition::Finalize { grade, allow_resubmit };
        let answer = answer_state::commit(store, &scope.answer, transition).await?;
        self.notifier.status_changed(&answer);
        Ok(answer)
    }

    pub(crate) async fn allow_retry(&self, actor: &User, answer_id: &str) -> ReviewResult<Answer> {
        let store = self.store.as_ref();
        let scope = scope::load_answer(store, actor, answer_id).await?;
        scope.capabilities.require(Operation::AllowRetry)?;

        let answer = answer_state::commit(store, &scope.answer, Transition::AllowRetry).await?;
        self.notifier.status_changed(&answer);
        Ok(answer)
    }

    pub(crate) async fn delete(&self, actor: &User, answer_id: &str) -> ReviewResult<()> {
        let store = self.store.as_ref();
        let scope = scope::load_answer(store, actor, answer_id).await?;
        scope.capabilities.require(Operation::Delete)?;

        let files = store.list_answer_files(&scope.answer.id).await?;
        if !store.delete_answer(&scope.answer.id).await? {
            return Err(ReviewError::not_found("Answer"));
        }
        let locators: Vec<String> = files.into_iter().map(|file| file.relative_path).collect();
        self.release(&locators).await;

        tracing::info!(answer_id = %scope.answer.id, student_id = %actor.id, "Answer deleted");
        metrics::counter!(ANSWER_TRANSITIONS, "action" => "delete").increment(1);
        Ok(())
    }

    pub(crate) async fn detail(&self, actor: &User, answer_id: &str) -> ReviewResult<AnswerDetail> {
        let scope = scope::load_answer(self.store.as_ref(), actor, answer_id).await?;
        scope.capabilities.require(Operation::View)?;

        let files = self.store.list_answer_files(&scope.answer.id).await?;
        let student_login = self.student_login(&scope.answer).await?;
        Ok(AnswerDetail {
            answer: scope.answer,
            student_login,
            files,
            requests: scope.requests,
            capabilities: scope.capabilities,
        })
    }

    /// Authors see every answer to the task, everyone else only their own.
    pub(crate) async fn list_for_task(
        &self,
        actor: &User,
        task_id: &str,
    ) -> ReviewResult<Vec<AnswerListItem>> {
        let store = self.store.as_ref();
        let task = scope::load_task(store, actor, task_id).await?;
        task.course.roles.require_view()?;
        let see_all = task.course.roles.can_manage();

        let mut items = Vec::new();
        for answer in store.list_answers_for_task(&task.task.id).await? {
            if !see_all && answer.student_id != actor.id {
                continue;
            }
            let files = store.list_answer_files(&answer.id).await?;
            let student_login = self.student_login(&answer).await?;
            items.push(AnswerListItem { answer, student_login, files });
        }
        Ok(items)
    }

    pub(crate) async fn preview(
        &self,
        actor: &User,
        answer_id: &str,
        file_name: &str,
    ) -> ReviewResult<FilePreview> {
        let scope = scope::load_answer(self.store.as_ref(), actor, answer_id).await?;
        scope.capabilities.require(Operation::View)?;

        let files = self.store.list_answer_files(&scope.answer.id).await?;
        let file = files
            .iter()
            .find(|file| file.file_name == file_name)
            .ok_or_else(|| ReviewError::not_found("File"))?;
        Ok(preview::preview_file(self.blobs.as_ref(), file).await)
    }
}

fn stored_locators(blobs: &[StoredBlob]) -> Vec<String> {
    blobs.iter().map(|blob| blob.locator.clone()).collect()
}

#[cfg(test)]
mod tests;
