use std::sync::Arc;

use uuid::Uuid;

use crate::core::time::primitive_now_utc;
use crate::db::models::{Course, Task, User};
use crate::db::types::CourseRole;
use crate::repositories::{CourseMembers, ReviewStore};
use crate::services::error::{ReviewError, ReviewResult};
use crate::services::scope;
use crate::services::storage::BlobStore;

#[derive(Debug, Clone)]
pub(crate) struct CourseDetail {
    pub(crate) course: Course,
    pub(crate) tasks: Vec<Task>,
    pub(crate) authors: Vec<User>,
    pub(crate) participants: Vec<User>,
    pub(crate) can_manage: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct TaskDetail {
    pub(crate) task: Task,
    pub(crate) course_name: String,
    pub(crate) can_manage: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct CourseChanges {
    pub(crate) name: Option<String>,
    pub(crate) description: Option<String>,
}

fn required_name(name: &str, what: &str) -> ReviewResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ReviewError::invalid(format!("{what} name must not be empty")));
    }
    Ok(name.to_string())
}

/// Course and task administration.
#[derive(Clone)]
pub(crate) struct CourseCatalog {
    store: Arc<dyn ReviewStore>,
    blobs: Arc<dyn BlobStore>,
}

impl CourseCatalog {
    pub(crate) fn new(store: Arc<dyn ReviewStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    async fn user_by_login(&self, login: &str) -> ReviewResult<User> {
        self.store
            .find_user_by_login(login.trim())
            .await?
            .ok_or_else(|| ReviewError::not_found("User"))
    }

    /// The creator becomes the first author.
    pub(crate) async fn create_course(
        &self,
        actor: &User,
        name: &str,
        description: &str,
    ) -> ReviewResult<Course> {
        if !actor.is_admin {
            return Err(ReviewError::forbidden("Only administrators can create courses"));
        }
        let now = primitive_now_utc();
        let course = Course {
            id: Uuid::new_v4().to_string(),
            name: required_name(name, "Course")?,
            description: description.trim().to_string(),
            created_by: actor.id.clone(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_course(&course).await?;
        self.store.add_course_member(&course.id, &actor.id, CourseRole::Author).await?;

        tracing::info!(course_id = %course.id, created_by = %actor.id, "Course created");
        Ok(course)
    }

    pub(crate) async fn update_course(
        &self,
        actor: &User,
        course_id: &str,
        changes: CourseChanges,
    ) -> ReviewResult<Course> {
        let scope = scope::load_course(self.store.as_ref(), actor, course_id).await?;
        scope.roles.require_manage()?;

        let mut course = scope.course;
        if let Some(name) = changes.name {
            course.name = required_name(&name, "Course")?;
        }
        if let Some(description) = changes.description {
            course.description = description.trim().to_string();
        }
        course.updated_at = primitive_now_utc();
        if !self.store.update_course(&course).await? {
            return Err(ReviewError::not_found("Course"));
        }
        Ok(course)
    }

    /// Adding a member twice is a no-op.
    pub(crate) async fn add_member(
        &self,
        actor: &User,
        course_id: &str,
        login: &str,
        role: CourseRole,
    ) -> ReviewResult<CourseMembers> {
        let store = self.store.as_ref();
        let scope = scope::load_course(store, actor, course_id).await?;
        scope.roles.require_manage()?;
        let user = self.user_by_login(login).await?;

        if store.add_course_member(&scope.course.id, &user.id, role).await? {
            tracing::info!(
                course_id = %scope.course.id,
                user_id = %user.id,
                role = ?role,
                added_by = %actor.id,
                "Course member added"
            );
        }
        Ok(store.course_members(&scope.course.id).await?)
    }

    pub(crate) async fn remove_member(
        &self,
        actor: &User,
        course_id: &str,
        login: &str,
    ) -> ReviewResult<CourseMembers> {
        let store = self.store.as_ref();
        let scope = scope::load_course(store, actor, course_id).await?;
        scope.roles.require_manage()?;
        let user = self.user_by_login(login).await?;

        if !store.remove_course_member(&scope.course.id, &user.id).await? {
            return Err(ReviewError::not_found("Course member"));
        }
        tracing::info!(
            course_id = %scope.course.id,
            user_id = %user.id,
            removed_by = %actor.id,
            "Course member removed"
        );
        Ok(store.course_members(&scope.course.id).await?)
    }

    pub(crate) async fn list_courses(&self, actor: &User) -> ReviewResult<Vec<Course>> {
        if actor.is_admin {
            return Ok(self.store.list_courses().await?);
        }
        Ok(self.store.list_courses_for_member(&actor.id).await?)
    }

    pub(crate) async fn course_detail(
        &self,
        actor: &User,
        course_id: &str,
    ) -> ReviewResult<CourseDetail> {
        let scope = scope::load_course(self.store.as_ref(), actor, course_id).await?;
        scope.roles.require_view()?;

        let tasks = self.store.list_tasks_for_course(&scope.course.id).await?;
        Ok(CourseDetail {
            can_manage: scope.roles.can_manage(),
            course: scope.course,
            tasks,
            authors: scope.members.authors,
            participants: scope.members.participants,
        })
    }

    pub(crate) async fn create_task(
        &self,
        actor: &User,
        course_id: &str,
        name: &str,
        description: &str,
    ) -> ReviewResult<Task> {
        let scope = scope::load_course(self.store.as_ref(), actor, course_id).await?;
        scope.roles.require_manage()?;

        let now = primitive_now_utc();
        let task = Task {
            id: Uuid::new_v4().to_string(),
            course_id: scope.course.id,
            name: required_name(name, "Task")?,
            description: description.trim().to_string(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_task(&task).await?;

        tracing::info!(task_id = %task.id, course_id = %task.course_id, "Task created");
        Ok(task)
    }

    pub(crate) async fn update_task(
        &self,
        actor: &User,
        task_id: &str,
        changes: CourseChanges,
    ) -> ReviewResult<Task> {
        let scope = scope::load_task(self.store.as_ref(), actor, task_id).await?;
        scope.course.roles.require_manage()?;

        let mut task = scope.task;
        if let Some(name) = changes.name {
            task.name = required_name(&name, "Task")?;
        }
        if let Some(description) = changes.description {
            task.description = description.trim().to_string();
        }
        task.updated_at = primitive_now_utc();
        if !self.store.update_task(&task).await? {
            return Err(ReviewError::not_found("Task"));
        }
        Ok(task)
    }

    /// Drops the task with all of its answers and releases their files.
    pub(crate) async fn delete_task(&self, actor: &User, task_id: &str) -> ReviewResult<()> {
        let store = self.store.as_ref();
        let scope = scope::load_task(store, actor, task_id).await?;
        scope.course.roles.require_manage()?;

        let files = store.list_answer_files_for_task(&scope.task.id).await?;
        if !store.delete_task(&scope.task.id).await? {
            return Err(ReviewError::not_found("Task"));
        }
        for file in &files {
            if let Err(error) = self.blobs.delete(&file.relative_path).await {
                tracing::warn!(
                    locator = %file.relative_path,
                    error = %error,
                    "Failed to release answer file of a deleted task"
                );
            }
        }

        tracing::info!(
            task_id = %scope.task.id,
            deleted_by = %actor.id,
            files = files.len(),
            "Task deleted"
        );
        Ok(())
    }

    pub(crate) async fn task_detail(
        &self,
        actor: &User,
        task_id: &str,
    ) -> ReviewResult<TaskDetail> {
        let scope = scope::load_task(self.store.as_ref(), actor, task_id).await?;
        scope.course.roles.require_view()?;
        Ok(TaskDetail {
            can_manage: scope.course.roles.can_manage(),
            course_name: scope.course.course.name,
            task: scope.task,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::error::ErrorKind;
    use crate::test_support::ReviewFixture;

    #[tokio::test]
    async fn only_admins_create_courses_and_become_authors() {
        let fx = ReviewFixture::new().await;
        let catalog = fx.catalog();

        let error = catalog.create_course(&fx.author, "Rust", "").await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Forbidden);
        let error = catalog.create_course(&fx.admin, "   ", "").await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Invalid);

        let course = catalog.create_course(&fx.admin, " Rust ", " systems ").await.unwrap();
        assert_eq!(course.name, "Rust");
        assert_eq!(course.description, "systems");
        let members = fx.store.course_members(&course.id).await.unwrap();
        assert!(members.is_author(&fx.admin.id));
    }

    #[tokio::test]
    async fn membership_changes_need_an_author() {
        let fx = ReviewFixture::new().await;
        let catalog = fx.catalog();

        let error = catalog
            .add_member(&fx.student, &fx.course.id, &fx.outsider.login, CourseRole::Participant)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Forbidden);

        let members = catalog
            .add_member(&fx.author, &fx.course.id, &fx.outsider.login, CourseRole::Participant)
            .await
            .unwrap();
        assert!(members.is_participant(&fx.outsider.id));
        let again = catalog
            .add_member(&fx.author, &fx.course.id, &fx.outsider.login, CourseRole::Participant)
            .await
            .unwrap();
        assert_eq!(again.participants.len(), members.participants.len());

        let error = catalog
            .add_member(&fx.author, &fx.course.id, "ghost", CourseRole::Author)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);

        let members =
            catalog.remove_member(&fx.admin, &fx.course.id, &fx.outsider.login).await.unwrap();
        assert!(!members.is_participant(&fx.outsider.id));
        let error =
            catalog.remove_member(&fx.admin, &fx.course.id, &fx.outsider.login).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn course_list_and_detail_follow_membership() {
        let fx = ReviewFixture::new().await;
        let catalog = fx.catalog();

        assert_eq!(catalog.list_courses(&fx.student).await.unwrap().len(), 1);
        assert!(catalog.list_courses(&fx.outsider).await.unwrap().is_empty());
        assert_eq!(catalog.list_courses(&fx.admin).await.unwrap().len(), 1);

        let detail = catalog.course_detail(&fx.student, &fx.course.id).await.unwrap();
        assert!(!detail.can_manage);
        assert_eq!(detail.tasks.len(), 1);
        assert_eq!(detail.authors.len(), 1);

        let error = catalog.course_detail(&fx.outsider, &fx.course.id).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Forbidden);
        let error = catalog.course_detail(&fx.admin, "missing").await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn tasks_are_managed_by_authors() {
        let fx = ReviewFixture::new().await;
        let catalog = fx.catalog();

        let error = catalog.create_task(&fx.student, &fx.course.id, "T2", "").await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Forbidden);
        let error = catalog.create_task(&fx.author, &fx.course.id, " ", "").await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Invalid);

        let task = catalog.create_task(&fx.author, &fx.course.id, "T2", "desc").await.unwrap();
        let changes = CourseChanges { name: Some("T2 renamed".into()), description: None };
        let updated = catalog.update_task(&fx.author, &task.id, changes).await.unwrap();
        assert_eq!(updated.name, "T2 renamed");
        assert_eq!(updated.description, "desc");

        let detail = catalog.task_detail(&fx.student, &task.id).await.unwrap();
        assert_eq!(detail.course_name, fx.course.name);
        assert!(!detail.can_manage);
    }

    #[tokio::test]
    async fn deleting_a_task_removes_answers_and_files() {
        let fx = ReviewFixture::with_files(&[("main.py", "print(1)\n")]).await;
        let catalog = fx.catalog();
        let files = fx.store.list_answer_files(&fx.answer.id).await.unwrap();

        let error = catalog.delete_task(&fx.student, &fx.task.id).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Forbidden);

        catalog.delete_task(&fx.author, &fx.task.id).await.unwrap();
        assert!(fx.store.find_task(&fx.task.id).await.unwrap().is_none());
        assert!(fx.store.find_answer(&fx.answer.id).await.unwrap().is_none());
        assert!(!fx.blobs.contains(&files[0].relative_path));
    }
}
