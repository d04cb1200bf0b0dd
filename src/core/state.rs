use std::sync::Arc;

use crate::core::config::Settings;
use crate::repositories::ReviewStore;
use crate::services::answer_lifecycle::{AnswerLifecycle, UploadLimits};
use crate::services::courses::CourseCatalog;
use crate::services::notifications::{NotificationSink, Notifier};
use crate::services::review_assignments::ReviewAssignments;
use crate::services::review_comments::CommentThreads;
use crate::services::storage::BlobStore;
use crate::services::users::UserDirectory;

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    store: Arc<dyn ReviewStore>,
    blobs: Arc<dyn BlobStore>,
    notifier: Notifier,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        store: Arc<dyn ReviewStore>,
        blobs: Arc<dyn BlobStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let notifier = Notifier::new(sink);
        Self { inner: Arc::new(InnerState { settings, store, blobs, notifier }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn store(&self) -> &dyn ReviewStore {
        self.inner.store.as_ref()
    }

    pub(crate) fn upload_limits(&self) -> UploadLimits {
        let storage = self.inner.settings.storage();
        UploadLimits {
            max_file_bytes: storage.max_upload_size_mb.saturating_mul(BYTES_PER_MB),
            max_files: usize::try_from(storage.max_files_per_answer).unwrap_or(usize::MAX),
        }
    }

    pub(crate) fn lifecycle(&self) -> AnswerLifecycle {
        AnswerLifecycle::new(
            self.inner.store.clone(),
            self.inner.blobs.clone(),
            self.inner.notifier.clone(),
            self.upload_limits(),
        )
    }

    pub(crate) fn assignments(&self) -> ReviewAssignments {
        ReviewAssignments::new(self.inner.store.clone(), self.inner.notifier.clone())
    }

    pub(crate) fn comments(&self) -> CommentThreads {
        CommentThreads::new(
            self.inner.store.clone(),
            self.inner.blobs.clone(),
            self.inner.notifier.clone(),
        )
    }

    pub(crate) fn catalog(&self) -> CourseCatalog {
        CourseCatalog::new(self.inner.store.clone(), self.inner.blobs.clone())
    }

    pub(crate) fn users(&self) -> UserDirectory {
        UserDirectory::new(self.inner.store.clone(), self.inner.blobs.clone())
    }
}
