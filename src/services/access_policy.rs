//! Who may do what to an answer or a course.
//!
//! Everything here is pure: callers load the relationship facts fresh for
//! every request (see `scope`) and hand them in.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::db::models::{Answer, ReviewRequest, User};
use crate::db::types::AnswerStatus;
use crate::repositories::CourseMembers;
use crate::services::error::{ReviewError, ReviewResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Operation {
    View,
    Edit,
    Delete,
    RequestReview,
    Finalize,
    AllowRetry,
    AssignReviewer,
    AddComment,
}

impl Operation {
    fn denial(self) -> &'static str {
        match self {
            Operation::View => "Not enough permissions to view this answer",
            Operation::Edit | Operation::Delete | Operation::RequestReview => {
                "Only the author of the answer can change it while it is open for changes"
            }
            Operation::Finalize | Operation::AllowRetry | Operation::AssignReviewer => {
                "Only course authors can manage reviews"
            }
            Operation::AddComment => "Only course authors and assigned reviewers can comment",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub(crate) struct Capabilities(BTreeSet<Operation>);

impl Capabilities {
    pub(crate) fn allows(&self, operation: Operation) -> bool {
        self.0.contains(&operation)
    }

    pub(crate) fn require(&self, operation: Operation) -> ReviewResult<()> {
        if self.allows(operation) {
            Ok(())
        } else {
            Err(ReviewError::forbidden(operation.denial()))
        }
    }

    fn grant(&mut self, operations: &[Operation]) {
        self.0.extend(operations.iter().copied());
    }
}

/// Course-level relationship of one actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CourseRoles {
    pub(crate) is_admin: bool,
    pub(crate) is_author: bool,
    pub(crate) is_participant: bool,
}

impl CourseRoles {
    pub(crate) fn of(actor: &User, members: &CourseMembers) -> Self {
        Self {
            is_admin: actor.is_admin,
            is_author: members.is_author(&actor.id),
            is_participant: members.is_participant(&actor.id),
        }
    }

    pub(crate) fn can_view(&self) -> bool {
        self.is_admin || self.is_author || self.is_participant
    }

    pub(crate) fn can_manage(&self) -> bool {
        self.is_admin || self.is_author
    }

    pub(crate) fn require_view(&self) -> ReviewResult<()> {
        if self.can_view() {
            Ok(())
        } else {
            Err(ReviewError::forbidden("Course membership required"))
        }
    }

    pub(crate) fn require_manage(&self) -> ReviewResult<()> {
        if self.can_manage() {
            Ok(())
        } else {
            Err(ReviewError::forbidden("Only course authors can do this"))
        }
    }
}

/// Relationship of one actor to one answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct AnswerRoles {
    pub(crate) course: CourseRoles,
    pub(crate) is_owner: bool,
    pub(crate) is_assigned_reviewer: bool,
}

impl AnswerRoles {
    pub(crate) fn of(
        actor: &User,
        answer: &Answer,
        members: &CourseMembers,
        requests: &[ReviewRequest],
    ) -> Self {
        Self {
            course: CourseRoles::of(actor, members),
            is_owner: answer.student_id == actor.id,
            is_assigned_reviewer: requests.iter().any(|request| request.reviewer_id == actor.id),
        }
    }
}

/// The owning student may change the answer unless it was graded and closed.
pub(crate) fn can_modify(answer: &Answer, actor_id: &str) -> bool {
    actor_id == answer.student_id
        && (answer.status != AnswerStatus::Reviewed || answer.allow_resubmit)
}

pub(crate) fn answer_capabilities(answer: &Answer, roles: &AnswerRoles) -> Capabilities {
    let mut capabilities = Capabilities::default();

    if roles.course.can_view() || roles.is_assigned_reviewer {
        capabilities.grant(&[Operation::View]);
    }
    if roles.is_assigned_reviewer {
        capabilities.grant(&[Operation::AddComment]);
    }
    if roles.course.can_manage() {
        capabilities.grant(&[
            Operation::Finalize,
            Operation::AllowRetry,
            Operation::AssignReviewer,
            Operation::AddComment,
        ]);
    }
    // Owner operations are never granted by role alone, admins included.
    if roles.is_owner && can_modify(answer, &answer.student_id) {
        capabilities.grant(&[Operation::Edit, Operation::Delete, Operation::RequestReview]);
    }

    capabilities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    fn answer_with(status: AnswerStatus, allow_resubmit: bool) -> Answer {
        Answer {
            status,
            allow_resubmit,
            ..test_support::answer_row("answer-1", "task-1", "student-1")
        }
    }

    #[test]
    fn can_modify_matches_the_full_status_grid() {
        for status in AnswerStatus::ALL {
            for allow_resubmit in [false, true] {
                let answer = answer_with(status, allow_resubmit);
                let open = status != AnswerStatus::Reviewed || allow_resubmit;

                assert_eq!(
                    can_modify(&answer, "student-1"),
                    open,
                    "owner, {status:?}, allow_resubmit={allow_resubmit}"
                );
                assert!(
                    !can_modify(&answer, "someone-else"),
                    "stranger, {status:?}, allow_resubmit={allow_resubmit}"
                );
            }
        }
    }

    #[test]
    fn owner_operations_follow_can_modify_together() {
        let owner = AnswerRoles {
            course: CourseRoles { is_participant: true, ..CourseRoles::default() },
            is_owner: true,
            is_assigned_reviewer: false,
        };

        let closed = answer_capabilities(&answer_with(AnswerStatus::Reviewed, false), &owner);
        for operation in [Operation::Edit, Operation::Delete, Operation::RequestReview] {
            assert!(!closed.allows(operation));
        }
        assert!(closed.allows(Operation::View));

        let reopened = answer_capabilities(&answer_with(AnswerStatus::Reviewed, true), &owner);
        for operation in [Operation::Edit, Operation::Delete, Operation::RequestReview] {
            assert!(reopened.allows(operation));
        }
        assert!(!reopened.allows(Operation::Finalize));
    }

    #[test]
    fn admin_reviews_but_does_not_edit_someone_elses_answer() {
        let admin = AnswerRoles {
            course: CourseRoles { is_admin: true, ..CourseRoles::default() },
            ..AnswerRoles::default()
        };
        let capabilities = answer_capabilities(&answer_with(AnswerStatus::Draft, false), &admin);

        for operation in [
            Operation::View,
            Operation::Finalize,
            Operation::AllowRetry,
            Operation::AssignReviewer,
            Operation::AddComment,
        ] {
            assert!(capabilities.allows(operation), "{operation:?}");
        }
        assert!(!capabilities.allows(Operation::Edit));
        assert!(matches!(capabilities.require(Operation::Delete), Err(ReviewError::Forbidden(_))));
    }

    #[test]
    fn assigned_reviewer_can_view_and_comment_only() {
        let reviewer = AnswerRoles { is_assigned_reviewer: true, ..AnswerRoles::default() };
        let capabilities =
            answer_capabilities(&answer_with(AnswerStatus::AwaitingReview, false), &reviewer);

        assert!(capabilities.allows(Operation::View));
        assert!(capabilities.allows(Operation::AddComment));
        assert!(!capabilities.allows(Operation::Finalize));
        assert!(!capabilities.allows(Operation::AssignReviewer));
    }

    #[test]
    fn plain_participant_only_views_and_outsider_gets_nothing() {
        let participant = AnswerRoles {
            course: CourseRoles { is_participant: true, ..CourseRoles::default() },
            ..AnswerRoles::default()
        };
        let answer = answer_with(AnswerStatus::AwaitingReview, false);
        let capabilities = answer_capabilities(&answer, &participant);
        assert!(capabilities.allows(Operation::View));
        assert!(!capabilities.allows(Operation::AddComment));

        let outsider = answer_capabilities(&answer, &AnswerRoles::default());
        assert_eq!(outsider, Capabilities::default());
    }

    #[test]
    fn roles_come_from_loaded_members() {
        let author = test_support::user_row("author-1", "author", false);
        let answer = answer_with(AnswerStatus::AwaitingReview, false);
        let members = CourseMembers { authors: vec![author.clone()], participants: vec![] };

        let roles = AnswerRoles::of(&author, &answer, &members, &[]);
        let capabilities = answer_capabilities(&answer, &roles);
        assert!(capabilities.allows(Operation::Finalize));
    }
}
