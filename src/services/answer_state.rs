//! The answer status machine and its single commit point.
//!
//! Every status change goes through [`commit`], which is also the only code
//! that writes `ReviewRequest.completed`.

use crate::core::metrics::ANSWER_TRANSITIONS;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Answer, UNGRADED};
use crate::db::types::AnswerStatus;
use crate::repositories::ReviewStore;
use crate::services::error::{ReviewError, ReviewResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Grade(i32);

impl Grade {
    pub(crate) const MIN: i32 = 0;
    pub(crate) const MAX: i32 = 100;

    pub(crate) fn new(value: i64) -> ReviewResult<Self> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as i32))
        } else {
            Err(ReviewError::invalid(format!(
                "invalid grade: {value}. grade must be in [{}, {}]",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub(crate) fn value(self) -> i32 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Transition {
    Edit { text: String },
    RequestReview,
    Finalize { grade: Grade, allow_resubmit: bool },
    AllowRetry,
}

impl Transition {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Transition::Edit { .. } => "edit",
            Transition::RequestReview => "request_review",
            Transition::Finalize { .. } => "finalize",
            Transition::AllowRetry => "allow_retry",
        }
    }
}

/// What happens to the answer's review requests alongside a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestSync {
    Keep,
    MarkCompleted,
    Reset,
}

impl RequestSync {
    fn between(from: AnswerStatus, to: AnswerStatus) -> Self {
        match (from, to) {
            (_, AnswerStatus::Reviewed) => RequestSync::MarkCompleted,
            (_, AnswerStatus::ResubmitAllowed) => RequestSync::Reset,
            // Leaving a closed review starts a new round for every reviewer.
            (AnswerStatus::Reviewed, _) => RequestSync::Reset,
            _ => RequestSync::Keep,
        }
    }
}

/// Pure effect of `transition` on `answer`. Authorization happens before this.
pub(crate) fn apply(answer: &Answer, transition: &Transition) -> (Answer, RequestSync) {
    let mut next = answer.clone();
    match transition {
        Transition::Edit { text } => {
            next.text = text.clone();
            next.status = AnswerStatus::Draft;
            next.review_requested = false;
            next.grade = UNGRADED;
        }
        Transition::RequestReview => {
            next.status = AnswerStatus::AwaitingReview;
            next.review_requested = true;
            next.allow_resubmit = false;
            next.grade = UNGRADED;
        }
        Transition::Finalize { grade, allow_resubmit } => {
            next.status = AnswerStatus::Reviewed;
            next.grade = grade.value();
            next.review_requested = false;
            next.allow_resubmit = *allow_resubmit;
        }
        Transition::AllowRetry => {
            next.status = AnswerStatus::ResubmitAllowed;
            next.allow_resubmit = true;
            next.review_requested = false;
            next.grade = UNGRADED;
        }
    }
    let sync = RequestSync::between(answer.status, next.status);
    (next, sync)
}

/// Applies `transition` to the stored answer `current` and writes it back.
///
/// Fails with `Conflict` when the stored version no longer matches
/// `current.version`. Review requests are synchronized right after the
/// answer row is written.
pub(crate) async fn commit(
    store: &dyn ReviewStore,
    current: &Answer,
    transition: Transition,
) -> ReviewResult<Answer> {
    let (mut next, sync) = apply(current, &transition);
    next.updated_at = primitive_now_utc();

    let Some(saved) = store.update_answer(&next, current.version).await? else {
        return Err(ReviewError::Conflict(
            "Answer was changed by someone else, reload it and try again".to_string(),
        ));
    };

    match sync {
        RequestSync::Keep => {}
        RequestSync::MarkCompleted => {
            store.set_review_requests_completed(&saved.id, true).await?;
        }
        RequestSync::Reset => {
            store.set_review_requests_completed(&saved.id, false).await?;
        }
    }

    tracing::info!(
        answer_id = %saved.id,
        action = transition.label(),
        from = ?current.status,
        to = ?saved.status,
        grade = saved.grade,
        version = saved.version,
        "Answer transition committed"
    );
    metrics::counter!(ANSWER_TRANSITIONS, "action" => transition.label()).increment(1);

    Ok(saved)
}
