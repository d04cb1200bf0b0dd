use std::sync::Arc;

use uuid::Uuid;

use crate::core::security;
use crate::core::time::primitive_now_utc;
use crate::db::models::User;
use crate::repositories::ReviewStore;
use crate::services::error::{ReviewError, ReviewResult};
use crate::services::storage::BlobStore;

#[derive(Debug, Clone)]
pub(crate) struct NewUser {
    pub(crate) login: String,
    pub(crate) password: String,
    pub(crate) full_name: String,
    pub(crate) email: Option<String>,
    pub(crate) is_admin: bool,
}

/// Admin edit of an account. `None` keeps the current value; an empty
/// email clears it.
#[derive(Debug, Clone, Default)]
pub(crate) struct UserChanges {
    pub(crate) login: Option<String>,
    pub(crate) full_name: Option<String>,
    pub(crate) email: Option<String>,
    pub(crate) password: Option<String>,
}

fn require_admin(actor: &User) -> ReviewResult<()> {
    if actor.is_admin {
        Ok(())
    } else {
        Err(ReviewError::forbidden("Admin access required"))
    }
}

/// Account administration and credential checks.
#[derive(Clone)]
pub(crate) struct UserDirectory {
    store: Arc<dyn ReviewStore>,
    blobs: Arc<dyn BlobStore>,
}

impl UserDirectory {
    pub(crate) fn new(store: Arc<dyn ReviewStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    /// Inserts the account without an admin check. Used by the admin
    /// endpoint and the start-up superuser bootstrap.
    pub(crate) async fn register(&self, input: NewUser) -> ReviewResult<User> {
        let login = input.login.trim();
        if login.is_empty() {
            return Err(ReviewError::invalid("Login must not be empty"));
        }
        if input.password.is_empty() {
            return Err(ReviewError::invalid("Password must not be empty"));
        }
        let hashed_password = security::hash_password(&input.password)
            .map_err(|error| ReviewError::Unavailable(error.to_string()))?;

        let now = primitive_now_utc();
        let user = User {
            id: Uuid::new_v4().to_string(),
            login: login.to_string(),
            email: input.email.map(|email| email.trim().to_string()).filter(|e| !e.is_empty()),
            full_name: input.full_name.trim().to_string(),
            hashed_password,
            is_admin: input.is_admin,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        if !self.store.insert_user(&user).await? {
            return Err(ReviewError::invalid(format!("Login {login} is already taken")));
        }

        tracing::info!(
            user_id = %user.id,
            login = %user.login,
            is_admin = user.is_admin,
            "User created"
        );
        Ok(user)
    }

    pub(crate) async fn create_user(&self, actor: &User, input: NewUser) -> ReviewResult<User> {
        require_admin(actor)?;
        self.register(input).await
    }

    pub(crate) async fn list_users(&self, actor: &User) -> ReviewResult<Vec<User>> {
        require_admin(actor)?;
        Ok(self.store.list_users().await?)
    }

    pub(crate) async fn update_user(
        &self,
        actor: &User,
        user_id: &str,
        changes: UserChanges,
    ) -> ReviewResult<User> {
        require_admin(actor)?;
        let mut user =
            self.store.find_user(user_id).await?.ok_or_else(|| ReviewError::not_found("User"))?;

        if let Some(login) = changes.login {
            let login = login.trim();
            if login.is_empty() {
                return Err(ReviewError::invalid("Login must not be empty"));
            }
            if login != user.login {
                if self.store.find_user_by_login(login).await?.is_some() {
                    return Err(ReviewError::invalid(format!("Login {login} is already taken")));
                }
                user.login = login.to_string();
            }
        }
        if let Some(full_name) = changes.full_name {
            user.full_name = full_name.trim().to_string();
        }
        if let Some(email) = changes.email {
            user.email = Some(email.trim().to_string()).filter(|email| !email.is_empty());
        }
        let password_changed = changes.password.is_some();
        if let Some(password) = changes.password {
            if password.is_empty() {
                return Err(ReviewError::invalid("Password must not be empty"));
            }
            user.hashed_password = security::hash_password(&password)
                .map_err(|error| ReviewError::Unavailable(error.to_string()))?;
        }

        user.updated_at = primitive_now_utc();
        if !self.store.update_user(&user).await? {
            return Err(ReviewError::not_found("User"));
        }
        tracing::info!(
            user_id = %user.id,
            login = %user.login,
            password_changed,
            changed_by = %actor.id,
            "User updated"
        );
        Ok(user)
    }

    /// Deletes the account together with its answers, review requests,
    /// memberships and notifications; comments it wrote stay anonymous.
    /// Course creators have to hand their courses over first.
    pub(crate) async fn delete_user(&self, actor: &User, user_id: &str) -> ReviewResult<()> {
        require_admin(actor)?;
        if actor.id == user_id {
            return Err(ReviewError::invalid("Administrators cannot delete themselves"));
        }
        let user =
            self.store.find_user(user_id).await?.ok_or_else(|| ReviewError::not_found("User"))?;

        let created = self.store.list_courses().await?;
        if let Some(course) = created.iter().find(|course| course.created_by == user.id) {
            return Err(ReviewError::Conflict(format!(
                "{} created the course \"{}\" and cannot be deleted",
                user.login, course.name
            )));
        }

        let files = self.store.list_answer_files_for_student(&user.id).await?;
        if !self.store.delete_user(&user.id).await? {
            return Err(ReviewError::not_found("User"));
        }
        for file in &files {
            if let Err(error) = self.blobs.delete(&file.relative_path).await {
                tracing::warn!(
                    locator = %file.relative_path,
                    error = %error,
                    "Failed to release answer file of a deleted user"
                );
            }
        }

        tracing::info!(
            user_id = %user.id,
            login = %user.login,
            deleted_by = %actor.id,
            files = files.len(),
            "User deleted"
        );
        Ok(())
    }

    /// Blocks or unblocks an account. Admins cannot block themselves.
    pub(crate) async fn set_active(
        &self,
        actor: &User,
        user_id: &str,
        is_active: bool,
    ) -> ReviewResult<User> {
        require_admin(actor)?;
        if actor.id == user_id && !is_active {
            return Err(ReviewError::invalid("Administrators cannot block themselves"));
        }

        let user = self
            .store
            .set_user_active(user_id, is_active, primitive_now_utc())
            .await?
            .ok_or_else(|| ReviewError::not_found("User"))?;
        tracing::info!(
            user_id = %user.id,
            is_active,
            changed_by = %actor.id,
            "User activity changed"
        );
        Ok(user)
    }

    /// `None` for an unknown login or a wrong password.
    pub(crate) async fn authenticate(
        &self,
        login: &str,
        password: &str,
    ) -> ReviewResult<Option<User>> {
        let Some(user) = self.store.find_user_by_login(login.trim()).await? else {
            return Ok(None);
        };
        let verified = security::verify_password(password, &user.hashed_password).unwrap_or(false);
        if !verified {
            return Ok(None);
        }
        if !user.is_active {
            return Err(ReviewError::forbidden("User is blocked"));
        }
        Ok(Some(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::error::ErrorKind;
    use crate::services::review_comments::NewComment;
    use crate::test_support::{self, ReviewFixture};

    fn new_user(login: &str) -> NewUser {
        NewUser {
            login: login.to_string(),
            password: "secret-pass".to_string(),
            full_name: "New Person".to_string(),
            email: Some("  ".to_string()),
            is_admin: false,
        }
    }

    #[tokio::test]
    async fn admins_create_users_with_unique_logins() {
        let fx = ReviewFixture::new().await;
        let users = fx.users();

        let error = users.create_user(&fx.author, new_user("fresh")).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Forbidden);

        let created = users.create_user(&fx.admin, new_user(" fresh ")).await.unwrap();
        assert_eq!(created.login, "fresh");
        assert_eq!(created.email, None);
        assert_ne!(created.hashed_password, "secret-pass");

        let error = users.create_user(&fx.admin, new_user("fresh")).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Invalid);
    }

    #[tokio::test]
    async fn admins_edit_login_name_email_and_password() {
        let fx = ReviewFixture::new().await;
        let users = fx.users();
        let created = users.create_user(&fx.admin, new_user("fresh")).await.unwrap();

        let changes = UserChanges {
            login: Some(" renamed ".into()),
            full_name: Some("Renamed Person".into()),
            email: Some("renamed@example.com".into()),
            password: Some("another-pass".into()),
        };
        let error =
            users.update_user(&fx.author, &created.id, changes.clone()).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Forbidden);

        let updated = users.update_user(&fx.admin, &created.id, changes).await.unwrap();
        assert_eq!(updated.login, "renamed");
        assert_eq!(updated.full_name, "Renamed Person");
        assert_eq!(updated.email.as_deref(), Some("renamed@example.com"));
        assert!(users.authenticate("renamed", "another-pass").await.unwrap().is_some());
        assert!(users.authenticate("fresh", "secret-pass").await.unwrap().is_none());

        let taken = UserChanges { login: Some(fx.student.login.clone()), ..Default::default() };
        let error = users.update_user(&fx.admin, &created.id, taken).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Invalid);

        let cleared = UserChanges { email: Some(String::new()), ..Default::default() };
        let updated = users.update_user(&fx.admin, &created.id, cleared).await.unwrap();
        assert_eq!(updated.email, None);
        assert_eq!(updated.login, "renamed");

        let error =
            users.update_user(&fx.admin, "missing", UserChanges::default()).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn deleting_a_student_takes_their_work_along() {
        let fx = ReviewFixture::with_files(&[("main.py", "print(1)\n")]).await;
        fx.assign(&fx.participant).await;
        fx.comments()
            .add_comment(
                &fx.participant,
                &fx.answer.id,
                NewComment {
                    file_name: Some("main.py".into()),
                    line_number: Some(1),
                    text: "ok".into(),
                },
            )
            .await
            .unwrap();
        let locator = fx.store.list_answer_files(&fx.answer.id).await.unwrap()[0]
            .relative_path
            .clone();

        fx.users().delete_user(&fx.admin, &fx.student.id).await.expect("delete");

        assert!(fx.store.find_user(&fx.student.id).await.unwrap().is_none());
        assert!(fx.store.find_answer(&fx.answer.id).await.unwrap().is_none());
        let assigned = fx.store.list_review_requests_for_reviewer(&fx.participant.id).await;
        assert!(assigned.unwrap().is_empty());
        assert!(!fx.blobs.contains(&locator));
        let members = fx.store.course_members(&fx.course.id).await.unwrap();
        assert!(!members.is_participant(&fx.student.id));
    }

    #[tokio::test]
    async fn deleting_a_reviewer_keeps_their_comments() {
        let fx = ReviewFixture::new().await;
        fx.assign(&fx.participant).await;
        let comment = fx
            .comments()
            .add_comment(
                &fx.participant,
                &fx.answer.id,
                NewComment { text: "looks fine".into(), ..Default::default() },
            )
            .await
            .unwrap();

        fx.users().delete_user(&fx.admin, &fx.participant.id).await.expect("delete");

        let comments = fx.store.list_review_comments(&fx.answer.id).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].id, comment.id);
        assert_eq!(comments[0].reviewer_id, None);
        let requests = fx.store.list_review_requests_for_answer(&fx.answer.id).await.unwrap();
        assert!(requests.is_empty());
    }

    #[tokio::test]
    async fn delete_guards() {
        let fx = ReviewFixture::new().await;
        let users = fx.users();

        let error = users.delete_user(&fx.author, &fx.student.id).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Forbidden);
        let error = users.delete_user(&fx.admin, &fx.admin.id).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Invalid);
        let error = users.delete_user(&fx.admin, "missing").await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);

        let owned = test_support::course_row("course-2", "Compilers", &fx.author.id);
        fx.store.insert_course(&owned).await.unwrap();
        let error = users.delete_user(&fx.admin, &fx.author.id).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Conflict);
        assert!(fx.store.find_user(&fx.author.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn blocked_users_cannot_authenticate() {
        let fx = ReviewFixture::new().await;
        let users = fx.users();
        let created = users.create_user(&fx.admin, new_user("fresh")).await.unwrap();

        assert!(users.authenticate("fresh", "secret-pass").await.unwrap().is_some());
        assert!(users.authenticate("fresh", "wrong").await.unwrap().is_none());
        assert!(users.authenticate("ghost", "secret-pass").await.unwrap().is_none());

        let blocked = users.set_active(&fx.admin, &created.id, false).await.unwrap();
        assert!(!blocked.is_active);
        let error = users.authenticate("fresh", "secret-pass").await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Forbidden);

        let error = users.set_active(&fx.admin, &fx.admin.id, false).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Invalid);
        let error = users.set_active(&fx.admin, "missing", true).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }
}
