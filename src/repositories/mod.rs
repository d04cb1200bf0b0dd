//! Persistence boundary for the review workflow.
//!
//! Services only talk to [`ReviewStore`]; the Postgres and in-memory
//! backends are interchangeable behind it.

mod memory;
mod postgres;

#[cfg(test)]
pub(crate) use memory::Fault;
pub(crate) use memory::InMemoryStore;
pub(crate) use postgres::PgStore;

use async_trait::async_trait;
use thiserror::Error;
use time::PrimitiveDateTime;

use crate::db::models::{
    Answer, AnswerFile, Course, Notification, ReviewComment, ReviewRequest, Task, User,
};
use crate::db::types::CourseRole;

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub(crate) type StoreResult<T> = Result<T, StoreError>;

/// Authors and participants of one course, loaded together.
#[derive(Debug, Clone, Default)]
pub(crate) struct CourseMembers {
    pub(crate) authors: Vec<User>,
    pub(crate) participants: Vec<User>,
}

impl CourseMembers {
    pub(crate) fn is_author(&self, user_id: &str) -> bool {
        self.authors.iter().any(|user| user.id == user_id)
    }

    pub(crate) fn is_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|user| user.id == user_id)
    }
}

#[async_trait]
pub(crate) trait ReviewStore: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    async fn find_user(&self, id: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>>;
    /// Ordered by login.
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    /// Returns `false` when the login is already taken.
    async fn insert_user(&self, user: &User) -> StoreResult<bool>;
    /// Overwrites the login, credentials, flags and profile of an existing row.
    async fn update_user(&self, user: &User) -> StoreResult<bool>;
    /// Removes the user with their memberships, answers, review requests and
    /// notifications. Comments they wrote stay, without a reviewer.
    async fn delete_user(&self, id: &str) -> StoreResult<bool>;
    async fn set_user_active(
        &self,
        id: &str,
        is_active: bool,
        updated_at: PrimitiveDateTime,
    ) -> StoreResult<Option<User>>;

    async fn find_course(&self, id: &str) -> StoreResult<Option<Course>>;
    /// Ordered by name.
    async fn list_courses(&self) -> StoreResult<Vec<Course>>;
    /// Courses where the user is an author or a participant, ordered by name.
    async fn list_courses_for_member(&self, user_id: &str) -> StoreResult<Vec<Course>>;
    async fn insert_course(&self, course: &Course) -> StoreResult<()>;
    async fn update_course(&self, course: &Course) -> StoreResult<bool>;
    async fn course_members(&self, course_id: &str) -> StoreResult<CourseMembers>;
    /// Returns `false` when the user already holds that role.
    async fn add_course_member(
        &self,
        course_id: &str,
        user_id: &str,
        role: CourseRole,
    ) -> StoreResult<bool>;
    /// Drops the user from both author and participant sets.
    async fn remove_course_member(&self, course_id: &str, user_id: &str) -> StoreResult<bool>;

    async fn find_task(&self, id: &str) -> StoreResult<Option<Task>>;
    /// Ordered by creation time.
    async fn list_tasks_for_course(&self, course_id: &str) -> StoreResult<Vec<Task>>;
    async fn insert_task(&self, task: &Task) -> StoreResult<()>;
    async fn update_task(&self, task: &Task) -> StoreResult<bool>;
    /// Removes the task with its answers, files, requests and comments.
    async fn delete_task(&self, id: &str) -> StoreResult<bool>;

    async fn find_answer(&self, id: &str) -> StoreResult<Option<Answer>>;
    /// Ordered by creation time.
    async fn list_answers_for_task(&self, task_id: &str) -> StoreResult<Vec<Answer>>;
    async fn list_answers_for_course(&self, course_id: &str) -> StoreResult<Vec<Answer>>;
    async fn insert_answer(&self, answer: &Answer) -> StoreResult<()>;
    /// Writes `answer` only if the stored version still equals
    /// `expected_version`. The stored version becomes `expected_version + 1`.
    /// `None` means another writer got there first (or the row is gone).
    async fn update_answer(
        &self,
        answer: &Answer,
        expected_version: i32,
    ) -> StoreResult<Option<Answer>>;
    async fn delete_answer(&self, id: &str) -> StoreResult<bool>;

    /// Ordered by position.
    async fn list_answer_files(&self, answer_id: &str) -> StoreResult<Vec<AnswerFile>>;
    async fn list_answer_files_for_task(&self, task_id: &str) -> StoreResult<Vec<AnswerFile>>;
    async fn list_answer_files_for_student(
        &self,
        student_id: &str,
    ) -> StoreResult<Vec<AnswerFile>>;
    async fn insert_answer_files(&self, files: &[AnswerFile]) -> StoreResult<()>;
    async fn delete_answer_files(&self, ids: &[String]) -> StoreResult<u64>;

    /// Oldest first.
    async fn list_review_requests_for_answer(
        &self,
        answer_id: &str,
    ) -> StoreResult<Vec<ReviewRequest>>;
    /// Newest first.
    async fn list_review_requests_for_reviewer(
        &self,
        reviewer_id: &str,
    ) -> StoreResult<Vec<ReviewRequest>>;
    async fn list_review_requests_for_course(
        &self,
        course_id: &str,
    ) -> StoreResult<Vec<ReviewRequest>>;
    /// Returns `false` when the (answer, reviewer) pair already exists.
    async fn insert_review_request(&self, request: &ReviewRequest) -> StoreResult<bool>;
    async fn delete_review_request(&self, id: &str) -> StoreResult<bool>;
    async fn set_review_requests_completed(
        &self,
        answer_id: &str,
        completed: bool,
    ) -> StoreResult<u64>;

    async fn insert_review_comment(&self, comment: &ReviewComment) -> StoreResult<()>;
    /// Newest first.
    async fn list_review_comments(&self, answer_id: &str) -> StoreResult<Vec<ReviewComment>>;
    async fn list_review_comments_for_course(
        &self,
        course_id: &str,
    ) -> StoreResult<Vec<ReviewComment>>;

    async fn insert_notification(&self, notification: &Notification) -> StoreResult<()>;
    /// Newest first, at most `limit` rows.
    async fn list_notifications_for_user(
        &self,
        user_id: &str,
        limit: i64,
    ) -> StoreResult<Vec<Notification>>;
    async fn mark_notifications_read(&self, ids: &[String]) -> StoreResult<u64>;
}
