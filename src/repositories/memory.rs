//! In-memory implementation of `ReviewStore`.
//!
//! Everything lives behind one `RwLock`, so each call is atomic with respect
//! to the others. State is lost on restart; used by tests and the
//! `STORE_BACKEND=memory` development mode.

use std::cmp::Reverse;

use async_trait::async_trait;
use time::PrimitiveDateTime;
use tokio::sync::RwLock;

use super::{CourseMembers, ReviewStore, StoreResult};
use crate::db::models::{
    Answer, AnswerFile, Course, Notification, ReviewComment, ReviewRequest, Task, User,
};
use crate::db::types::CourseRole;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    courses: Vec<Course>,
    authors: Vec<(String, String)>,
    participants: Vec<(String, String)>,
    tasks: Vec<Task>,
    answers: Vec<Answer>,
    files: Vec<AnswerFile>,
    requests: Vec<ReviewRequest>,
    comments: Vec<ReviewComment>,
    notifications: Vec<Notification>,
    #[cfg(test)]
    faults: Vec<Fault>,
}

/// Failures the in-memory store can be told to produce.
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fault {
    /// `insert_answer_files` errors.
    FileInsert,
    /// `insert_review_request` reports the pair as taken, as a concurrent
    /// insert of the same pair would.
    RequestTaken,
}

impl Tables {
    fn task_ids_for_course(&self, course_id: &str) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|task| task.course_id == course_id)
            .map(|task| task.id.clone())
            .collect()
    }

    fn answer_ids_for_tasks(&self, task_ids: &[String]) -> Vec<String> {
        self.answers
            .iter()
            .filter(|answer| task_ids.contains(&answer.task_id))
            .map(|answer| answer.id.clone())
            .collect()
    }

    fn drop_answers(&mut self, answer_ids: &[String]) {
        self.answers.retain(|answer| !answer_ids.contains(&answer.id));
        self.files.retain(|file| !answer_ids.contains(&file.answer_id));
        self.requests.retain(|request| !answer_ids.contains(&request.answer_id));
        self.comments.retain(|comment| !answer_ids.contains(&comment.answer_id));
        for notification in &mut self.notifications {
            if notification.answer_id.as_ref().is_some_and(|id| answer_ids.contains(id)) {
                notification.answer_id = None;
            }
        }
    }

    fn members(&self, pairs: &[(String, String)], course_id: &str) -> Vec<User> {
        let mut users: Vec<User> = pairs
            .iter()
            .filter(|(course, _)| course == course_id)
            .filter_map(|(_, user_id)| self.users.iter().find(|user| &user.id == user_id))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.login.cmp(&b.login));
        users
    }
}

/// Rows in insertion order, newest first, with later inserts winning ties.
fn newest_first<T>(
    rows: impl DoubleEndedIterator<Item = T>,
    key: impl Fn(&T) -> PrimitiveDateTime,
) -> Vec<T> {
    let mut rows: Vec<T> = rows.rev().collect();
    rows.sort_by_key(|row| Reverse(key(row)));
    rows
}

pub(crate) struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub(crate) fn new() -> Self {
        Self { tables: RwLock::new(Tables::default()) }
    }

    #[cfg(test)]
    pub(crate) async fn inject(&self, fault: Fault) {
        self.tables.write().await.faults.push(fault);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReviewStore for InMemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn find_user(&self, id: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|user| user.login == login).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users = tables.users.clone();
        users.sort_by(|a, b| a.login.cmp(&b.login));
        Ok(users)
    }

    async fn insert_user(&self, user: &User) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|existing| existing.login == user.login) {
            return Ok(false);
        }
        tables.users.push(user.clone());
        Ok(true)
    }

    async fn update_user(&self, user: &User) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let Some(existing) = tables.users.iter_mut().find(|row| row.id == user.id) else {
            return Ok(false);
        };
        *existing = user.clone();
        Ok(true)
    }

    async fn delete_user(&self, id: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.users.len();
        tables.users.retain(|user| user.id != id);
        if tables.users.len() == before {
            return Ok(false);
        }

        tables.authors.retain(|(_, user_id)| user_id != id);
        tables.participants.retain(|(_, user_id)| user_id != id);
        let answer_ids: Vec<String> = tables
            .answers
            .iter()
            .filter(|answer| answer.student_id == id)
            .map(|answer| answer.id.clone())
            .collect();
        tables.drop_answers(&answer_ids);
        tables.requests.retain(|request| request.reviewer_id != id);
        for comment in &mut tables.comments {
            if comment.reviewer_id.as_deref() == Some(id) {
                comment.reviewer_id = None;
            }
        }
        tables.notifications.retain(|notification| notification.user_id != id);
        Ok(true)
    }

    async fn set_user_active(
        &self,
        id: &str,
        is_active: bool,
        updated_at: PrimitiveDateTime,
    ) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        Ok(tables.users.iter_mut().find(|user| user.id == id).map(|user| {
            user.is_active = is_active;
            user.updated_at = updated_at;
            user.clone()
        }))
    }

    async fn find_course(&self, id: &str) -> StoreResult<Option<Course>> {
        let tables = self.tables.read().await;
        Ok(tables.courses.iter().find(|course| course.id == id).cloned())
    }

    async fn list_courses(&self) -> StoreResult<Vec<Course>> {
        let tables = self.tables.read().await;
        let mut courses = tables.courses.clone();
        courses.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(courses)
    }

    async fn list_courses_for_member(&self, user_id: &str) -> StoreResult<Vec<Course>> {
        let tables = self.tables.read().await;
        let is_member = |course_id: &str| {
            tables
                .authors
                .iter()
                .chain(tables.participants.iter())
                .any(|(course, user)| course == course_id && user == user_id)
        };
        let mut courses: Vec<Course> =
            tables.courses.iter().filter(|course| is_member(&course.id)).cloned().collect();
        courses.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(courses)
    }

    async fn insert_course(&self, course: &Course) -> StoreResult<()> {
        self.tables.write().await.courses.push(course.clone());
        Ok(())
    }

    async fn update_course(&self, course: &Course) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.courses.iter_mut().find(|existing| existing.id == course.id) {
            Some(existing) => {
                *existing = course.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn course_members(&self, course_id: &str) -> StoreResult<CourseMembers> {
        let tables = self.tables.read().await;
        Ok(CourseMembers {
            authors: tables.members(&tables.authors, course_id),
            participants: tables.members(&tables.participants, course_id),
        })
    }

    async fn add_course_member(
        &self,
        course_id: &str,
        user_id: &str,
        role: CourseRole,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let pairs = match role {
            CourseRole::Author => &mut tables.authors,
            CourseRole::Participant => &mut tables.participants,
        };
        if pairs.iter().any(|(course, user)| course == course_id && user == user_id) {
            return Ok(false);
        }
        pairs.push((course_id.to_string(), user_id.to_string()));
        Ok(true)
    }

    async fn remove_course_member(&self, course_id: &str, user_id: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.authors.len() + tables.participants.len();
        let keep = |(course, user): &(String, String)| !(course == course_id && user == user_id);
        tables.authors.retain(keep);
        tables.participants.retain(keep);
        Ok(tables.authors.len() + tables.participants.len() < before)
    }

    async fn find_task(&self, id: &str) -> StoreResult<Option<Task>> {
        let tables = self.tables.read().await;
        Ok(tables.tasks.iter().find(|task| task.id == id).cloned())
    }

    async fn list_tasks_for_course(&self, course_id: &str) -> StoreResult<Vec<Task>> {
        let tables = self.tables.read().await;
        let mut tasks: Vec<Task> =
            tables.tasks.iter().filter(|task| task.course_id == course_id).cloned().collect();
        tasks.sort_by_key(|task| task.created_at);
        Ok(tasks)
    }

    async fn insert_task(&self, task: &Task) -> StoreResult<()> {
        self.tables.write().await.tasks.push(task.clone());
        Ok(())
    }

    async fn update_task(&self, task: &Task) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.tasks.iter_mut().find(|existing| existing.id == task.id) {
            Some(existing) => {
                *existing = task.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_task(&self, id: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if !tables.tasks.iter().any(|task| task.id == id) {
            return Ok(false);
        }
        let answer_ids = tables.answer_ids_for_tasks(&[id.to_string()]);
        tables.drop_answers(&answer_ids);
        tables.tasks.retain(|task| task.id != id);
        Ok(true)
    }

    async fn find_answer(&self, id: &str) -> StoreResult<Option<Answer>> {
        let tables = self.tables.read().await;
        Ok(tables.answers.iter().find(|answer| answer.id == id).cloned())
    }

    async fn list_answers_for_task(&self, task_id: &str) -> StoreResult<Vec<Answer>> {
        let tables = self.tables.read().await;
        let mut answers: Vec<Answer> =
            tables.answers.iter().filter(|answer| answer.task_id == task_id).cloned().collect();
        answers.sort_by_key(|answer| answer.created_at);
        Ok(answers)
    }

    async fn list_answers_for_course(&self, course_id: &str) -> StoreResult<Vec<Answer>> {
        let tables = self.tables.read().await;
        let task_ids = tables.task_ids_for_course(course_id);
        let mut answers: Vec<Answer> = tables
            .answers
            .iter()
            .filter(|answer| task_ids.contains(&answer.task_id))
            .cloned()
            .collect();
        answers.sort_by_key(|answer| answer.created_at);
        Ok(answers)
    }

    async fn insert_answer(&self, answer: &Answer) -> StoreResult<()> {
        self.tables.write().await.answers.push(answer.clone());
        Ok(())
    }

    async fn update_answer(
        &self,
        answer: &Answer,
        expected_version: i32,
    ) -> StoreResult<Option<Answer>> {
        let mut tables = self.tables.write().await;
        let Some(stored) = tables
            .answers
            .iter_mut()
            .find(|stored| stored.id == answer.id && stored.version == expected_version)
        else {
            return Ok(None);
        };
        *stored = Answer { version: expected_version + 1, ..answer.clone() };
        Ok(Some(stored.clone()))
    }

    async fn delete_answer(&self, id: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if !tables.answers.iter().any(|answer| answer.id == id) {
            return Ok(false);
        }
        tables.drop_answers(&[id.to_string()]);
        Ok(true)
    }

    async fn list_answer_files(&self, answer_id: &str) -> StoreResult<Vec<AnswerFile>> {
        let tables = self.tables.read().await;
        let mut files: Vec<AnswerFile> =
            tables.files.iter().filter(|file| file.answer_id == answer_id).cloned().collect();
        files.sort_by_key(|file| file.position);
        Ok(files)
    }

    async fn list_answer_files_for_task(&self, task_id: &str) -> StoreResult<Vec<AnswerFile>> {
        let tables = self.tables.read().await;
        let answer_ids = tables.answer_ids_for_tasks(&[task_id.to_string()]);
        Ok(tables
            .files
            .iter()
            .filter(|file| answer_ids.contains(&file.answer_id))
            .cloned()
            .collect())
    }

    async fn list_answer_files_for_student(
        &self,
        student_id: &str,
    ) -> StoreResult<Vec<AnswerFile>> {
        let tables = self.tables.read().await;
        let answer_ids: Vec<&str> = tables
            .answers
            .iter()
            .filter(|answer| answer.student_id == student_id)
            .map(|answer| answer.id.as_str())
            .collect();
        Ok(tables
            .files
            .iter()
            .filter(|file| answer_ids.contains(&file.answer_id.as_str()))
            .cloned()
            .collect())
    }

    async fn insert_answer_files(&self, files: &[AnswerFile]) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        #[cfg(test)]
        if tables.faults.contains(&Fault::FileInsert) {
            return Err(super::StoreError::Unavailable("file inserts refused".to_string()));
        }
        tables.files.extend(files.iter().cloned());
        Ok(())
    }

    async fn delete_answer_files(&self, ids: &[String]) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.files.len();
        tables.files.retain(|file| !ids.contains(&file.id));
        Ok((before - tables.files.len()) as u64)
    }

    async fn list_review_requests_for_answer(
        &self,
        answer_id: &str,
    ) -> StoreResult<Vec<ReviewRequest>> {
        let tables = self.tables.read().await;
        let mut requests: Vec<ReviewRequest> = tables
            .requests
            .iter()
            .filter(|request| request.answer_id == answer_id)
            .cloned()
            .collect();
        requests.sort_by_key(|request| request.created_at);
        Ok(requests)
    }

    async fn list_review_requests_for_reviewer(
        &self,
        reviewer_id: &str,
    ) -> StoreResult<Vec<ReviewRequest>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables.requests.iter().filter(|request| request.reviewer_id == reviewer_id).cloned(),
            |request| request.created_at,
        ))
    }

    async fn list_review_requests_for_course(
        &self,
        course_id: &str,
    ) -> StoreResult<Vec<ReviewRequest>> {
        let tables = self.tables.read().await;
        let answer_ids = tables.answer_ids_for_tasks(&tables.task_ids_for_course(course_id));
        Ok(tables
            .requests
            .iter()
            .filter(|request| answer_ids.contains(&request.answer_id))
            .cloned()
            .collect())
    }

    async fn insert_review_request(&self, request: &ReviewRequest) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let duplicate = tables.requests.iter().any(|existing| {
            existing.answer_id == request.answer_id && existing.reviewer_id == request.reviewer_id
        });
        #[cfg(test)]
        let duplicate = duplicate || tables.faults.contains(&Fault::RequestTaken);
        if duplicate {
            return Ok(false);
        }
        tables.requests.push(request.clone());
        Ok(true)
    }

    async fn delete_review_request(&self, id: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.requests.len();
        tables.requests.retain(|request| request.id != id);
        Ok(tables.requests.len() < before)
    }

    async fn set_review_requests_completed(
        &self,
        answer_id: &str,
        completed: bool,
    ) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let mut touched = 0;
        for request in tables.requests.iter_mut().filter(|request| request.answer_id == answer_id) {
            request.completed = completed;
            touched += 1;
        }
        Ok(touched)
    }

    async fn insert_review_comment(&self, comment: &ReviewComment) -> StoreResult<()> {
        self.tables.write().await.comments.push(comment.clone());
        Ok(())
    }

    async fn list_review_comments(&self, answer_id: &str) -> StoreResult<Vec<ReviewComment>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables.comments.iter().filter(|comment| comment.answer_id == answer_id).cloned(),
            |comment| comment.created_at,
        ))
    }

    async fn list_review_comments_for_course(
        &self,
        course_id: &str,
    ) -> StoreResult<Vec<ReviewComment>> {
        let tables = self.tables.read().await;
        let answer_ids = tables.answer_ids_for_tasks(&tables.task_ids_for_course(course_id));
        Ok(tables
            .comments
            .iter()
            .filter(|comment| answer_ids.contains(&comment.answer_id))
            .cloned()
            .collect())
    }

    async fn insert_notification(&self, notification: &Notification) -> StoreResult<()> {
        self.tables.write().await.notifications.push(notification.clone());
        Ok(())
    }

    async fn list_notifications_for_user(
        &self,
        user_id: &str,
        limit: i64,
    ) -> StoreResult<Vec<Notification>> {
        let tables = self.tables.read().await;
        let mut rows = newest_first(
            tables.notifications.iter().filter(|row| row.user_id == user_id).cloned(),
            |row| row.created_at,
        );
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }

    async fn mark_notifications_read(&self, ids: &[String]) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let mut touched = 0;
        for row in tables.notifications.iter_mut().filter(|row| ids.contains(&row.id)) {
            if !row.is_read {
                row.is_read = true;
                touched += 1;
            }
        }
        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::AnswerStatus;
    use crate::test_support;

    #[tokio::test]
    async fn stale_version_update_is_rejected() {
        let store = InMemoryStore::new();
        let answer = test_support::answer_row("answer-1", "task-1", "student-1");
        store.insert_answer(&answer).await.unwrap();

        let first = Answer { status: AnswerStatus::AwaitingReview, ..answer.clone() };
        let updated = store.update_answer(&first, 0).await.unwrap().expect("first write");
        assert_eq!(updated.version, 1);

        let second = Answer { status: AnswerStatus::Draft, ..answer };
        assert!(store.update_answer(&second, 0).await.unwrap().is_none());
        let stored = store.find_answer("answer-1").await.unwrap().unwrap();
        assert_eq!(stored.status, AnswerStatus::AwaitingReview);
    }

    #[tokio::test]
    async fn duplicate_review_request_is_not_inserted() {
        let store = InMemoryStore::new();
        let request = test_support::review_request_row("request-1", "answer-1", "reviewer-1");
        assert!(store.insert_review_request(&request).await.unwrap());

        let again = ReviewRequest { id: "request-2".into(), ..request };
        assert!(!store.insert_review_request(&again).await.unwrap());
        assert_eq!(store.list_review_requests_for_answer("answer-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn comments_with_equal_timestamps_list_latest_insert_first() {
        let store = InMemoryStore::new();
        for id in ["c1", "c2", "c3"] {
            let comment = test_support::comment_row(id, "answer-1", None, "note");
            store.insert_review_comment(&comment).await.unwrap();
        }

        let ids: Vec<String> = store
            .list_review_comments("answer-1")
            .await
            .unwrap()
            .into_iter()
            .map(|comment| comment.id)
            .collect();
        assert_eq!(ids, vec!["c3", "c2", "c1"]);
    }

    #[tokio::test]
    async fn deleting_a_task_cascades_to_answer_rows() {
        let store = InMemoryStore::new();
        store.insert_task(&test_support::task_row("task-1", "course-1")).await.unwrap();
        store
            .insert_answer(&test_support::answer_row("answer-1", "task-1", "student-1"))
            .await
            .unwrap();
        store
            .insert_review_request(&test_support::review_request_row("r1", "answer-1", "rev-1"))
            .await
            .unwrap();

        assert!(store.delete_task("task-1").await.unwrap());
        assert!(store.find_answer("answer-1").await.unwrap().is_none());
        assert!(store.list_review_requests_for_reviewer("rev-1").await.unwrap().is_empty());
        assert!(!store.delete_task("task-1").await.unwrap());
    }
}
