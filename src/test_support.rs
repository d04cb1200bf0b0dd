use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use time::macros::datetime;
use time::PrimitiveDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::api;
use crate::core::{config::Settings, security, state::AppState, time::primitive_now_utc};
use crate::db::models::{
    Answer, AnswerFile, Course, ReviewComment, ReviewRequest, Task, User, UNGRADED,
};
use crate::db::types::{AnswerStatus, CourseRole};
use crate::repositories::{InMemoryStore, ReviewStore};
use crate::services::answer_lifecycle::{AnswerLifecycle, UploadLimits};
use crate::services::courses::CourseCatalog;
use crate::services::email::{MailError, Mailer};
use crate::services::notifications::{
    NotificationSink, Notifier, NotifyError, StoreNotificationSink,
};
use crate::services::review_assignments::ReviewAssignments;
use crate::services::review_comments::CommentThreads;
use crate::services::storage::{self, BlobError, BlobStore, StoredBlob};
use crate::services::users::UserDirectory;

const TEST_SECRET_KEY: &str = "test-secret";
pub(crate) const TEST_PASSWORD: &str = "review-me-please";

pub(crate) const UPLOAD_LIMITS: UploadLimits = UploadLimits { max_file_bytes: 1024, max_files: 3 };

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("TASKREVIEW_ENV", "test");
    std::env::set_var("TASKREVIEW_STRICT_CONFIG", "0");
    std::env::set_var("SECRET_KEY", TEST_SECRET_KEY);
    std::env::set_var("STORE_BACKEND", "memory");
    std::env::set_var("STORAGE_BACKEND", "local");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::remove_var("BACKEND_CORS_ORIGINS");
    std::env::remove_var("DATABASE_URL");
    std::env::remove_var("FIRST_SUPERUSER_PASSWORD");
    std::env::remove_var("MAX_UPLOAD_SIZE_MB");
    std::env::remove_var("MAX_FILES_PER_ANSWER");
    std::env::remove_var("S3_ACCESS_KEY");
    std::env::remove_var("S3_SECRET_KEY");
}

pub(crate) fn fixed_time() -> PrimitiveDateTime {
    datetime!(2025-12-10 08:00:00)
}

pub(crate) fn user_row(id: &str, login: &str, is_admin: bool) -> User {
    User {
        id: id.to_string(),
        login: login.to_string(),
        email: None,
        full_name: format!("{login} full name"),
        hashed_password: "not-a-hash".to_string(),
        is_admin,
        is_active: true,
        created_at: fixed_time(),
        updated_at: fixed_time(),
    }
}

pub(crate) fn course_row(id: &str, name: &str, created_by: &str) -> Course {
    Course {
        id: id.to_string(),
        name: name.to_string(),
        description: format!("{name} description"),
        created_by: created_by.to_string(),
        created_at: fixed_time(),
        updated_at: fixed_time(),
    }
}

pub(crate) fn task_row(id: &str, course_id: &str) -> Task {
    Task {
        id: id.to_string(),
        course_id: course_id.to_string(),
        name: format!("Task {id}"),
        description: String::new(),
        created_at: fixed_time(),
        updated_at: fixed_time(),
    }
}

pub(crate) fn answer_row(id: &str, task_id: &str, student_id: &str) -> Answer {
    Answer {
        id: id.to_string(),
        task_id: task_id.to_string(),
        student_id: student_id.to_string(),
        text: "42".to_string(),
        grade: UNGRADED,
        status: AnswerStatus::Draft,
        review_requested: false,
        allow_resubmit: false,
        version: 0,
        created_at: fixed_time(),
        updated_at: fixed_time(),
    }
}

pub(crate) fn answer_file_row(
    id: &str,
    answer_id: &str,
    file_name: &str,
    locator: &str,
) -> AnswerFile {
    AnswerFile {
        id: id.to_string(),
        answer_id: answer_id.to_string(),
        file_name: file_name.to_string(),
        relative_path: locator.to_string(),
        size_bytes: 0,
        sha256: String::new(),
        position: 0,
        uploaded_at: fixed_time(),
    }
}

pub(crate) fn review_request_row(id: &str, answer_id: &str, reviewer_id: &str) -> ReviewRequest {
    ReviewRequest {
        id: id.to_string(),
        answer_id: answer_id.to_string(),
        reviewer_id: reviewer_id.to_string(),
        created_at: fixed_time(),
        completed: false,
    }
}

pub(crate) fn comment_row(
    id: &str,
    answer_id: &str,
    reviewer_id: Option<&str>,
    text: &str,
) -> ReviewComment {
    ReviewComment {
        id: id.to_string(),
        answer_id: answer_id.to_string(),
        reviewer_id: reviewer_id.map(str::to_string),
        file_name: None,
        line_number: None,
        text: text.to_string(),
        created_at: fixed_time(),
    }
}

/// Polls `condition` until it holds; spawned notifications land asynchronously.
pub(crate) async fn wait_for(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met within one second");
}

#[derive(Default)]
struct BlobState {
    blobs: HashMap<String, Vec<u8>>,
    saves_left: Option<usize>,
}

/// Blob store kept in a map, with failure injection for uploads.
#[derive(Default)]
pub(crate) struct MemoryBlobStore {
    state: StdMutex<BlobState>,
}

impl MemoryBlobStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, BlobState> {
        self.state.lock().expect("blob state lock")
    }

    /// Lets `count` more saves succeed, then fails every further one.
    pub(crate) fn fail_saves_after(&self, count: usize) {
        self.state().saves_left = Some(count);
    }

    /// Drops every stored blob while keeping the rows that point at them.
    pub(crate) fn forget_all(&self) {
        self.state().blobs.clear();
    }

    pub(crate) fn contains(&self, locator: &str) -> bool {
        self.state().blobs.contains_key(locator)
    }

    pub(crate) fn len(&self) -> usize {
        self.state().blobs.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn save(&self, bytes: Vec<u8>, original_name: &str) -> Result<StoredBlob, BlobError> {
        let mut state = self.state();
        if let Some(left) = state.saves_left.as_mut() {
            if *left == 0 {
                return Err(BlobError::Backend("injected save failure".to_string()));
            }
            *left -= 1;
        }
        let stored = storage::describe(&bytes, original_name, storage::new_locator(original_name));
        state.blobs.insert(stored.locator.clone(), bytes);
        Ok(stored)
    }

    async fn read(&self, locator: &str) -> Result<Vec<u8>, BlobError> {
        let state = self.state();
        state.blobs.get(locator).cloned().ok_or_else(|| BlobError::NotFound(locator.into()))
    }

    async fn delete(&self, locator: &str) -> Result<(), BlobError> {
        self.state().blobs.remove(locator);
        Ok(())
    }

    async fn exists(&self, locator: &str) -> Result<bool, BlobError> {
        Ok(self.contains(locator))
    }
}

/// Notification sink that records what it was asked to deliver.
#[derive(Default)]
pub(crate) struct RecordingSink {
    events: StdMutex<Vec<String>>,
    attempts: AtomicUsize,
    failing: bool,
}

impl RecordingSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing() -> Self {
        Self { failing: true, ..Self::default() }
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().expect("events lock").clone()
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn record(&self, event: String) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(NotifyError::Delivery("sink is down".to_string()));
        }
        self.events.lock().expect("events lock").push(event);
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn status_changed(&self, answer: &Answer, status_label: &str) -> Result<(), NotifyError> {
        self.record(format!("status:{}:{status_label}", answer.id))
    }

    async fn review_comment(
        &self,
        answer: &Answer,
        _comment: &ReviewComment,
    ) -> Result<(), NotifyError> {
        self.record(format!("comment:{}", answer.id))
    }

    async fn reviewer_assigned(&self, request: &ReviewRequest) -> Result<(), NotifyError> {
        self.record(format!("assigned:{}", request.reviewer_id))
    }
}

/// Captures mails as `(to, subject, body)`.
#[derive(Default)]
pub(crate) struct RecordingMailer {
    sent: StdMutex<Vec<(String, String, String)>>,
    failing: bool,
}

impl RecordingMailer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing() -> Self {
        Self { failing: true, ..Self::default() }
    }

    pub(crate) fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().expect("mail lock").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        if self.failing {
            return Err(MailError::Address(to.to_string()));
        }
        self.sent.lock().expect("mail lock").push((
            to.to_string(),
            subject.to_string(),
            body.to_string(),
        ));
        Ok(())
    }
}

/// One course with an author, two participants, an outsider, a global
/// admin, one task and a draft answer by `student`.
pub(crate) struct ReviewFixture {
    pub(crate) store: Arc<InMemoryStore>,
    pub(crate) blobs: Arc<MemoryBlobStore>,
    pub(crate) sink: Arc<RecordingSink>,
    pub(crate) admin: User,
    pub(crate) author: User,
    pub(crate) student: User,
    pub(crate) participant: User,
    pub(crate) outsider: User,
    pub(crate) course: Course,
    pub(crate) task: Task,
    pub(crate) answer: Answer,
}

impl ReviewFixture {
    pub(crate) async fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let admin = user_row("user-admin", "admin", true);
        let author = user_row("user-author", "author", false);
        let student = user_row("user-student", "student", false);
        let participant = user_row("user-participant", "participant", false);
        let outsider = user_row("user-outsider", "outsider", false);
        for user in [&admin, &author, &student, &participant, &outsider] {
            store.insert_user(user).await.expect("insert user");
        }

        let course = course_row("course-1", "Algorithms", &admin.id);
        store.insert_course(&course).await.expect("insert course");
        store.add_course_member(&course.id, &author.id, CourseRole::Author).await.expect("author");
        for member in [&student, &participant] {
            store
                .add_course_member(&course.id, &member.id, CourseRole::Participant)
                .await
                .expect("participant");
        }

        let task = task_row("task-1", &course.id);
        store.insert_task(&task).await.expect("insert task");
        let answer = answer_row("answer-1", &task.id, &student.id);
        store.insert_answer(&answer).await.expect("insert answer");

        Self {
            store,
            blobs: Arc::new(MemoryBlobStore::new()),
            sink: Arc::new(RecordingSink::new()),
            admin,
            author,
            student,
            participant,
            outsider,
            course,
            task,
            answer,
        }
    }

    /// Same as [`ReviewFixture::new`] with `(name, content)` files on the answer.
    pub(crate) async fn with_files(files: &[(&str, &str)]) -> Self {
        let files: Vec<(&str, Vec<u8>)> =
            files.iter().map(|(name, content)| (*name, content.as_bytes().to_vec())).collect();
        Self::attach(&files).await
    }

    pub(crate) async fn with_file_bytes(name: &str, bytes: Vec<u8>) -> Self {
        Self::attach(&[(name, bytes)]).await
    }

    async fn attach(files: &[(&str, Vec<u8>)]) -> Self {
        let fixture = Self::new().await;
        let mut rows = Vec::new();
        for (position, (name, bytes)) in files.iter().enumerate() {
            let stored = fixture.blobs.save(bytes.clone(), name).await.expect("save");
            rows.push(AnswerFile {
                position: position as i32,
                size_bytes: stored.size,
                sha256: stored.sha256.clone(),
                ..answer_file_row(
                    &format!("file-{position}"),
                    &fixture.answer.id,
                    &stored.file_name,
                    &stored.locator,
                )
            });
        }
        fixture.store.insert_answer_files(&rows).await.expect("insert files");
        fixture
    }

    pub(crate) fn notifier(&self) -> Notifier {
        Notifier::new(self.sink.clone())
    }

    pub(crate) fn lifecycle(&self) -> AnswerLifecycle {
        AnswerLifecycle::new(
            self.store.clone(),
            self.blobs.clone(),
            self.notifier(),
            UPLOAD_LIMITS,
        )
    }

    pub(crate) fn assignments(&self) -> ReviewAssignments {
        ReviewAssignments::new(self.store.clone(), self.notifier())
    }

    pub(crate) fn comments(&self) -> CommentThreads {
        CommentThreads::new(self.store.clone(), self.blobs.clone(), self.notifier())
    }

    pub(crate) fn catalog(&self) -> CourseCatalog {
        CourseCatalog::new(self.store.clone(), self.blobs.clone())
    }

    pub(crate) fn users(&self) -> UserDirectory {
        UserDirectory::new(self.store.clone(), self.blobs.clone())
    }

    /// Assigns `reviewer` to the fixture answer on behalf of the author.
    pub(crate) async fn assign(&self, reviewer: &User) -> ReviewRequest {
        self.assignments()
            .assign_reviewer(&self.author, &self.answer.id, &reviewer.login)
            .await
            .expect("assign reviewer")
    }

    pub(crate) async fn reload_answer(&self) -> Answer {
        self.store.find_answer(&self.answer.id).await.expect("find answer").expect("answer exists")
    }

    /// Another draft by `student` on the fixture task.
    pub(crate) async fn extra_answer(&self, id: &str) -> Answer {
        let answer = answer_row(id, &self.task.id, &self.student.id);
        self.store.insert_answer(&answer).await.expect("insert answer");
        answer
    }
}

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    pub(crate) blobs: Arc<MemoryBlobStore>,
    _guard: OwnedMutexGuard<()>,
}

/// Router over the in-memory store with notifications persisted as in production.
pub(crate) async fn setup_test_context() -> TestContext {
    let guard = env_lock().await;
    set_test_env();

    let settings = Settings::load().expect("settings");
    let store: Arc<dyn ReviewStore> = Arc::new(InMemoryStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let sink = Arc::new(StoreNotificationSink::new(store.clone()));
    let state = AppState::new(settings, store, blobs.clone(), sink);
    let app = api::router::router(state.clone());

    TestContext { state, app, blobs, _guard: guard }
}

/// Inserts an active user whose password is [`TEST_PASSWORD`].
pub(crate) async fn insert_user(state: &AppState, login: &str, is_admin: bool) -> User {
    let now = primitive_now_utc();
    let user = User {
        id: Uuid::new_v4().to_string(),
        hashed_password: security::hash_password(TEST_PASSWORD).expect("hash password"),
        created_at: now,
        updated_at: now,
        ..user_row("", login, is_admin)
    };
    assert!(state.store().insert_user(&user).await.expect("insert user"));
    user
}

pub(crate) fn bearer_token(user_id: &str, settings: &Settings) -> String {
    security::create_access_token(user_id, settings, None).expect("token")
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

/// A part of a multipart body: `(field name, file name, content)`.
pub(crate) type Part<'a> = (&'a str, Option<&'a str>, &'a str);

pub(crate) fn multipart_request(
    method: Method,
    uri: &str,
    token: &str,
    parts: &[Part<'_>],
) -> Request<Body> {
    let boundary = "taskreview-test-boundary";
    let mut body = String::new();
    for (name, file_name, content) in parts {
        body.push_str(&format!("--{boundary}\r\n"));
        match file_name {
            Some(file_name) => body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )),
            None => body
                .push_str(&format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")),
        }
        body.push_str(content);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{boundary}--\r\n"));

    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .expect("multipart request")
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
