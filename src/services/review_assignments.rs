use std::sync::Arc;

use uuid::Uuid;

use crate::core::metrics::REVIEWER_ASSIGNMENTS;
use crate::core::time::primitive_now_utc;
use crate::db::models::{ReviewRequest, User};
use crate::db::types::AnswerStatus;
use crate::repositories::{CourseMembers, ReviewStore};
use crate::services::access_policy::Operation;
use crate::services::answer_state::{self, Transition};
use crate::services::error::{ReviewError, ReviewResult};
use crate::services::notifications::Notifier;
use crate::services::scope;

/// Participants and authors of the course, minus the answer's own student.
pub(crate) fn candidate_pool(members: &CourseMembers, student_id: &str) -> Vec<User> {
    let mut pool: Vec<User> = Vec::new();
    for user in members.participants.iter().chain(members.authors.iter()) {
        if user.id != student_id && !pool.iter().any(|known| known.id == user.id) {
            pool.push(user.clone());
        }
    }
    pool.sort_by(|a, b| a.login.cmp(&b.login));
    pool
}

/// A review request together with what the reviewer needs to find the work.
#[derive(Debug, Clone)]
pub(crate) struct AssignedReview {
    pub(crate) request: ReviewRequest,
    pub(crate) answer_status: AnswerStatus,
    pub(crate) task_id: String,
    pub(crate) task_name: String,
    pub(crate) course_id: String,
    pub(crate) course_name: String,
    pub(crate) student_login: String,
}

#[derive(Clone)]
pub(crate) struct ReviewAssignments {
    store: Arc<dyn ReviewStore>,
    notifier: Notifier,
}

impl ReviewAssignments {
    pub(crate) fn new(store: Arc<dyn ReviewStore>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    /// Assigning a reviewer also puts an open answer into review.
    pub(crate) async fn assign_reviewer(
        &self,
        actor: &User,
        answer_id: &str,
        reviewer_login: &str,
    ) -> ReviewResult<ReviewRequest> {
        let store = self.store.as_ref();
        let scope = scope::load_answer(store, actor, answer_id).await?;
        scope.capabilities.require(Operation::AssignReviewer)?;

        let reviewer = candidate_pool(&scope.course.members, &scope.answer.student_id)
            .into_iter()
            .find(|user| user.login == reviewer_login.trim())
            .ok_or_else(|| {
                ReviewError::invalid(format!("{reviewer_login} cannot review this answer"))
            })?;

        if scope.requests.iter().any(|request| request.reviewer_id == reviewer.id) {
            return Err(ReviewError::invalid(format!(
                "{} is already assigned to this answer",
                reviewer.login
            )));
        }

        // The request goes in first; a lost race on the (answer, reviewer)
        // pair must not move the answer.
        let request = ReviewRequest {
            id: Uuid::new_v4().to_string(),
            answer_id: scope.answer.id.clone(),
            reviewer_id: reviewer.id.clone(),
            created_at: primitive_now_utc(),
            completed: scope.answer.status == AnswerStatus::Reviewed,
        };
        if !store.insert_review_request(&request).await? {
            return Err(ReviewError::invalid(format!(
                "{} is already assigned to this answer",
                reviewer.login
            )));
        }

        let moved = match scope.answer.status {
            AnswerStatus::Draft | AnswerStatus::ResubmitAllowed => {
                answer_state::commit(store, &scope.answer, Transition::RequestReview).await
            }
            AnswerStatus::AwaitingReview | AnswerStatus::Reviewed => Ok(scope.answer.clone()),
        };
        let answer = match moved {
            Ok(answer) => answer,
            Err(error) => {
                if let Err(cleanup) = store.delete_review_request(&request.id).await {
                    tracing::warn!(
                        request_id = %request.id,
                        error = %cleanup,
                        "Failed to withdraw review request after aborted assignment"
                    );
                }
                return Err(error);
            }
        };

        tracing::info!(
            answer_id = %answer.id,
            reviewer_id = %reviewer.id,
            assigned_by = %actor.id,
            completed = request.completed,
            "Reviewer assigned"
        );
        metrics::counter!(REVIEWER_ASSIGNMENTS).increment(1);
        self.notifier.reviewer_assigned(&request);
        if answer.status != scope.answer.status {
            self.notifier.status_changed(&answer);
        }

        Ok(request)
    }

    /// Oldest first.
    pub(crate) async fn list_requests(
        &self,
        actor: &User,
        answer_id: &str,
    ) -> ReviewResult<Vec<ReviewRequest>> {
        let scope = scope::load_answer(self.store.as_ref(), actor, answer_id).await?;
        scope.capabilities.require(Operation::View)?;
        Ok(scope.requests)
    }

    pub(crate) async fn candidates(
        &self,
        actor: &User,
        answer_id: &str,
    ) -> ReviewResult<Vec<User>> {
        let scope = scope::load_answer(self.store.as_ref(), actor, answer_id).await?;
        scope.capabilities.require(Operation::AssignReviewer)?;

        let assigned: Vec<&str> =
            scope.requests.iter().map(|request| request.reviewer_id.as_str()).collect();
        Ok(candidate_pool(&scope.course.members, &scope.answer.student_id)
            .into_iter()
            .filter(|user| !assigned.contains(&user.id.as_str()))
            .collect())
    }

    /// Everything assigned to `actor`, newest first.
    pub(crate) async fn list_assigned(&self, actor: &User) -> ReviewResult<Vec<AssignedReview>> {
        let store = self.store.as_ref();
        let mut assigned = Vec::new();
        for request in store.list_review_requests_for_reviewer(&actor.id).await? {
            let Some(answer) = store.find_answer(&request.answer_id).await? else {
                continue;
            };
            let Some(task) = store.find_task(&answer.task_id).await? else {
                continue;
            };
            let course_name = store
                .find_course(&task.course_id)
                .await?
                .map(|course| course.name)
                .unwrap_or_default();
            let student_login = store
                .find_user(&answer.student_id)
                .await?
                .map(|user| user.login)
                .unwrap_or_default();

            assigned.push(AssignedReview {
                request,
                answer_status: answer.status,
                task_id: task.id,
                task_name: task.name,
                course_id: task.course_id,
                course_name,
                student_login,
            });
        }
        Ok(assigned)
    }
}
