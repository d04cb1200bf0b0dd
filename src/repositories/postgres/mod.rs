//! Postgres implementation of `ReviewStore`, one query module per table.

mod answer_files;
mod answers;
mod courses;
mod health;
mod notifications;
mod review_comments;
mod review_requests;
mod tasks;
mod users;

use async_trait::async_trait;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use super::{CourseMembers, ReviewStore, StoreResult};
use crate::db::models::{
    Answer, AnswerFile, Course, Notification, ReviewComment, ReviewRequest, Task, User,
};
use crate::db::types::CourseRole;

#[derive(Clone)]
pub(crate) struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(health::ping(&self.pool).await?)
    }

    async fn find_user(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(users::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>> {
        Ok(users::find_by_login(&self.pool, login).await?)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(users::list(&self.pool).await?)
    }

    async fn insert_user(&self, user: &User) -> StoreResult<bool> {
        Ok(users::create(&self.pool, user).await?)
    }

    async fn update_user(&self, user: &User) -> StoreResult<bool> {
        Ok(users::update(&self.pool, user).await?)
    }

    async fn delete_user(&self, id: &str) -> StoreResult<bool> {
        Ok(users::delete(&self.pool, id).await?)
    }

    async fn set_user_active(
        &self,
        id: &str,
        is_active: bool,
        updated_at: PrimitiveDateTime,
    ) -> StoreResult<Option<User>> {
        Ok(users::set_active(&self.pool, id, is_active, updated_at).await?)
    }

    async fn find_course(&self, id: &str) -> StoreResult<Option<Course>> {
        Ok(courses::find_by_id(&self.pool, id).await?)
    }

    async fn list_courses(&self) -> StoreResult<Vec<Course>> {
        Ok(courses::list(&self.pool).await?)
    }

    async fn list_courses_for_member(&self, user_id: &str) -> StoreResult<Vec<Course>> {
        Ok(courses::list_for_member(&self.pool, user_id).await?)
    }

    async fn insert_course(&self, course: &Course) -> StoreResult<()> {
        Ok(courses::create(&self.pool, course).await?)
    }

    async fn update_course(&self, course: &Course) -> StoreResult<bool> {
        Ok(courses::update(&self.pool, course).await?)
    }

    async fn course_members(&self, course_id: &str) -> StoreResult<CourseMembers> {
        let authors = courses::list_members(&self.pool, course_id, CourseRole::Author).await?;
        let participants =
            courses::list_members(&self.pool, course_id, CourseRole::Participant).await?;
        Ok(CourseMembers { authors, participants })
    }

    async fn add_course_member(
        &self,
        course_id: &str,
        user_id: &str,
        role: CourseRole,
    ) -> StoreResult<bool> {
        Ok(courses::add_member(&self.pool, course_id, user_id, role).await?)
    }

    async fn remove_course_member(&self, course_id: &str, user_id: &str) -> StoreResult<bool> {
        Ok(courses::remove_member(&self.pool, course_id, user_id).await?)
    }

    async fn find_task(&self, id: &str) -> StoreResult<Option<Task>> {
        Ok(tasks::find_by_id(&self.pool, id).await?)
    }

    async fn list_tasks_for_course(&self, course_id: &str) -> StoreResult<Vec<Task>> {
        Ok(tasks::list_by_course(&self.pool, course_id).await?)
    }

    async fn insert_task(&self, task: &Task) -> StoreResult<()> {
        Ok(tasks::create(&self.pool, task).await?)
    }

    async fn update_task(&self, task: &Task) -> StoreResult<bool> {
        Ok(tasks::update(&self.pool, task).await?)
    }

    async fn delete_task(&self, id: &str) -> StoreResult<bool> {
        Ok(tasks::delete(&self.pool, id).await?)
    }

    async fn find_answer(&self, id: &str) -> StoreResult<Option<Answer>> {
        Ok(answers::find_by_id(&self.pool, id).await?)
    }

    async fn list_answers_for_task(&self, task_id: &str) -> StoreResult<Vec<Answer>> {
        Ok(answers::list_by_task(&self.pool, task_id).await?)
    }

    async fn list_answers_for_course(&self, course_id: &str) -> StoreResult<Vec<Answer>> {
        Ok(answers::list_by_course(&self.pool, course_id).await?)
    }

    async fn insert_answer(&self, answer: &Answer) -> StoreResult<()> {
        Ok(answers::create(&self.pool, answer).await?)
    }

    async fn update_answer(
        &self,
        answer: &Answer,
        expected_version: i32,
    ) -> StoreResult<Option<Answer>> {
        Ok(answers::update_versioned(&self.pool, answer, expected_version).await?)
    }

    async fn delete_answer(&self, id: &str) -> StoreResult<bool> {
        Ok(answers::delete(&self.pool, id).await?)
    }

    async fn list_answer_files(&self, answer_id: &str) -> StoreResult<Vec<AnswerFile>> {
        Ok(answer_files::list_by_answer(&self.pool, answer_id).await?)
    }

    async fn list_answer_files_for_task(&self, task_id: &str) -> StoreResult<Vec<AnswerFile>> {
        Ok(answer_files::list_by_task(&self.pool, task_id).await?)
    }

    async fn list_answer_files_for_student(
        &self,
        student_id: &str,
    ) -> StoreResult<Vec<AnswerFile>> {
        Ok(answer_files::list_by_student(&self.pool, student_id).await?)
    }

    async fn insert_answer_files(&self, files: &[AnswerFile]) -> StoreResult<()> {
        Ok(answer_files::create_many(&self.pool, files).await?)
    }

    async fn delete_answer_files(&self, ids: &[String]) -> StoreResult<u64> {
        Ok(answer_files::delete_many(&self.pool, ids).await?)
    }

    async fn list_review_requests_for_answer(
        &self,
        answer_id: &str,
    ) -> StoreResult<Vec<ReviewRequest>> {
        Ok(review_requests::list_by_answer(&self.pool, answer_id).await?)
    }

    async fn list_review_requests_for_reviewer(
        &self,
        reviewer_id: &str,
    ) -> StoreResult<Vec<ReviewRequest>> {
        Ok(review_requests::list_by_reviewer(&self.pool, reviewer_id).await?)
    }

    async fn list_review_requests_for_course(
        &self,
        course_id: &str,
    ) -> StoreResult<Vec<ReviewRequest>> {
        Ok(review_requests::list_by_course(&self.pool, course_id).await?)
    }

    async fn insert_review_request(&self, request: &ReviewRequest) -> StoreResult<bool> {
        Ok(review_requests::create(&self.pool, request).await?)
    }

    async fn delete_review_request(&self, id: &str) -> StoreResult<bool> {
        Ok(review_requests::delete(&self.pool, id).await?)
    }

    async fn set_review_requests_completed(
        &self,
        answer_id: &str,
        completed: bool,
    ) -> StoreResult<u64> {
        Ok(review_requests::set_completed(&self.pool, answer_id, completed).await?)
    }

    async fn insert_review_comment(&self, comment: &ReviewComment) -> StoreResult<()> {
        Ok(review_comments::create(&self.pool, comment).await?)
    }

    async fn list_review_comments(&self, answer_id: &str) -> StoreResult<Vec<ReviewComment>> {
        Ok(review_comments::list_by_answer(&self.pool, answer_id).await?)
    }

    async fn list_review_comments_for_course(
        &self,
        course_id: &str,
    ) -> StoreResult<Vec<ReviewComment>> {
        Ok(review_comments::list_by_course(&self.pool, course_id).await?)
    }

    async fn insert_notification(&self, notification: &Notification) -> StoreResult<()> {
        Ok(notifications::create(&self.pool, notification).await?)
    }

    async fn list_notifications_for_user(
        &self,
        user_id: &str,
        limit: i64,
    ) -> StoreResult<Vec<Notification>> {
        Ok(notifications::list_for_user(&self.pool, user_id, limit).await?)
    }

    async fn mark_notifications_read(&self, ids: &[String]) -> StoreResult<u64> {
        Ok(notifications::mark_read(&self.pool, ids).await?)
    }
}
