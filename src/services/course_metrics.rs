//! Read-only rollup of a course's review activity.

use std::collections::HashMap;

use serde::Serialize;

use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::models::{Answer, ReviewComment, ReviewRequest, Task, User};
use crate::db::types::AnswerStatus;
use crate::repositories::ReviewStore;
use crate::services::error::ReviewResult;
use crate::services::scope;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub(crate) struct Tally {
    pub(crate) answers: u64,
    pub(crate) draft: u64,
    pub(crate) awaiting_review: u64,
    pub(crate) reviewed: u64,
    pub(crate) resubmit_allowed: u64,
    pub(crate) review_requests: u64,
    pub(crate) completed_reviews: u64,
    pub(crate) comments: u64,
    pub(crate) average_grade: Option<f64>,
}

impl Tally {
    fn count_answer(&mut self, answer: &Answer) {
        self.answers += 1;
        match answer.status {
            AnswerStatus::Draft => self.draft += 1,
            AnswerStatus::AwaitingReview => self.awaiting_review += 1,
            AnswerStatus::Reviewed => self.reviewed += 1,
            AnswerStatus::ResubmitAllowed => self.resubmit_allowed += 1,
        }
    }

    fn count_request(&mut self, request: &ReviewRequest) {
        self.review_requests += 1;
        if request.completed {
            self.completed_reviews += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct TaskMetrics {
    pub(crate) task_id: String,
    pub(crate) task_name: String,
    #[serde(flatten)]
    pub(crate) tally: Tally,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct CourseRollup {
    pub(crate) tasks: Vec<TaskMetrics>,
    pub(crate) totals: Tally,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CourseMetrics {
    pub(crate) course_id: String,
    pub(crate) course_name: String,
    pub(crate) course_description: String,
    pub(crate) participants_count: usize,
    pub(crate) tasks_count: usize,
    pub(crate) generated_at: String,
    #[serde(flatten)]
    pub(crate) rollup: CourseRollup,
}

/// Mean over graded answers only, rounded to two decimals with ties to even.
pub(crate) fn average_grade<'a>(answers: impl IntoIterator<Item = &'a Answer>) -> Option<f64> {
    let grades: Vec<i32> = answers.into_iter().filter_map(Answer::graded_value).collect();
    if grades.is_empty() {
        return None;
    }
    let sum: f64 = grades.iter().map(|grade| f64::from(*grade)).sum();
    let mean = sum / grades.len() as f64;
    Some((mean * 100.0).round_ties_even() / 100.0)
}

/// Inputs must already be scoped to one course. Rows pointing at a task
/// outside `tasks` still count towards the course totals.
pub(crate) fn aggregate(
    tasks: &[Task],
    answers: &[Answer],
    requests: &[ReviewRequest],
    comments: &[ReviewComment],
) -> CourseRollup {
    let task_of: HashMap<&str, &str> =
        answers.iter().map(|answer| (answer.id.as_str(), answer.task_id.as_str())).collect();
    let mut per_task: HashMap<&str, Tally> =
        tasks.iter().map(|task| (task.id.as_str(), Tally::default())).collect();
    let mut totals = Tally::default();

    for answer in answers {
        totals.count_answer(answer);
        if let Some(tally) = per_task.get_mut(answer.task_id.as_str()) {
            tally.count_answer(answer);
        }
    }
    for request in requests {
        totals.count_request(request);
        if let Some(tally) =
            task_of.get(request.answer_id.as_str()).and_then(|task| per_task.get_mut(task))
        {
            tally.count_request(request);
        }
    }
    for comment in comments {
        totals.comments += 1;
        if let Some(tally) =
            task_of.get(comment.answer_id.as_str()).and_then(|task| per_task.get_mut(task))
        {
            tally.comments += 1;
        }
    }
    totals.average_grade = average_grade(answers);

    let tasks = tasks
        .iter()
        .map(|task| {
            let mut tally = per_task.remove(task.id.as_str()).unwrap_or_default();
            tally.average_grade =
                average_grade(answers.iter().filter(|answer| answer.task_id == task.id));
            TaskMetrics { task_id: task.id.clone(), task_name: task.name.clone(), tally }
        })
        .collect();

    CourseRollup { tasks, totals }
}

pub(crate) async fn load(
    store: &dyn ReviewStore,
    actor: &User,
    course_id: &str,
) -> ReviewResult<CourseMetrics> {
    let course = scope::load_course(store, actor, course_id).await?;
    course.roles.require_manage()?;

    let tasks = store.list_tasks_for_course(&course.course.id).await?;
    let answers = store.list_answers_for_course(&course.course.id).await?;
    let requests = store.list_review_requests_for_course(&course.course.id).await?;
    let comments = store.list_review_comments_for_course(&course.course.id).await?;
    let rollup = aggregate(&tasks, &answers, &requests, &comments);

    tracing::debug!(
        course_id = %course.course.id,
        answers = rollup.totals.answers,
        "Course metrics computed"
    );

    Ok(CourseMetrics {
        course_id: course.course.id,
        course_name: course.course.name,
        course_description: course.course.description,
        participants_count: course.members.participants.len(),
        tasks_count: tasks.len(),
        generated_at: format_primitive(primitive_now_utc()),
        rollup,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::error::ErrorKind;
    use crate::test_support::{self, ReviewFixture};

    fn graded(id: &str, task_id: &str, grade: i32) -> Answer {
        Answer {
            grade,
            status: if grade == -1 { AnswerStatus::Draft } else { AnswerStatus::Reviewed },
            ..test_support::answer_row(id, task_id, "student-1")
        }
    }

    #[test]
    fn average_ignores_ungraded_answers() {
        let tasks = vec![test_support::task_row("task-1", "course-1")];
        let answers = vec![
            graded("a1", "task-1", -1),
            graded("a2", "task-1", 80),
            graded("a3", "task-1", 100),
        ];

        let rollup = aggregate(&tasks, &answers, &[], &[]);
        assert_eq!(rollup.totals.answers, 3);
        assert_eq!(rollup.totals.average_grade, Some(90.0));
        assert_eq!(rollup.tasks[0].tally.reviewed, 2);
        assert_eq!(rollup.tasks[0].tally.draft, 1);
    }

    #[test]
    fn average_rounds_halves_to_even() {
        let mut answers: Vec<Answer> =
            (0..7).map(|n| graded(&format!("a{n}"), "task-1", 50)).collect();
        answers.push(graded("a7", "task-1", 51));
        assert_eq!(average_grade(&answers), Some(50.12));

        let answers = vec![graded("b1", "task-1", 50), graded("b2", "task-1", 51)];
        assert_eq!(average_grade(&answers), Some(50.5));
    }

    #[test]
    fn course_average_is_not_a_mean_of_task_means() {
        let tasks = vec![
            test_support::task_row("task-1", "course-1"),
            test_support::task_row("task-2", "course-1"),
        ];
        let answers = vec![
            graded("a1", "task-1", 100),
            graded("a2", "task-2", 50),
            graded("a3", "task-2", 51),
            graded("a4", "task-2", 52),
        ];

        let rollup = aggregate(&tasks, &answers, &[], &[]);
        assert_eq!(rollup.tasks[0].tally.average_grade, Some(100.0));
        assert_eq!(rollup.tasks[1].tally.average_grade, Some(51.0));
        assert_eq!(rollup.totals.average_grade, Some(63.25));
    }

    #[test]
    fn resubmissions_requests_and_comments_land_in_their_own_buckets() {
        let tasks = vec![test_support::task_row("task-1", "course-1")];
        let answers = vec![
            Answer {
                status: AnswerStatus::ResubmitAllowed,
                allow_resubmit: true,
                ..test_support::answer_row("a1", "task-1", "student-1")
            },
            Answer {
                status: AnswerStatus::AwaitingReview,
                review_requested: true,
                ..test_support::answer_row("a2", "task-1", "student-2")
            },
        ];
        let requests = vec![
            test_support::review_request_row("r1", "a1", "reviewer-1"),
            ReviewRequest {
                completed: true,
                ..test_support::review_request_row("r2", "a2", "reviewer-1")
            },
        ];
        let comments = vec![test_support::comment_row("c1", "a2", Some("reviewer-1"), "ok")];

        let tally = aggregate(&tasks, &answers, &requests, &comments).tasks.remove(0).tally;
        assert_eq!(tally.resubmit_allowed, 1);
        assert_eq!(tally.awaiting_review, 1);
        assert_eq!(tally.draft + tally.reviewed, 0);
        assert_eq!(tally.review_requests, 2);
        assert_eq!(tally.completed_reviews, 1);
        assert_eq!(tally.comments, 1);
        assert_eq!(tally.average_grade, None);
    }

    #[tokio::test]
    async fn report_is_limited_to_authors_and_admins() {
        let fx = ReviewFixture::new().await;
        fx.lifecycle().finalize(&fx.author, &fx.answer.id, 75, false).await.unwrap();

        let metrics = load(fx.store.as_ref(), &fx.author, &fx.course.id).await.unwrap();
        assert_eq!(metrics.course_name, fx.course.name);
        assert_eq!(metrics.tasks_count, 1);
        assert_eq!(metrics.participants_count, 2);
        assert_eq!(metrics.rollup.totals.average_grade, Some(75.0));

        load(fx.store.as_ref(), &fx.admin, &fx.course.id).await.unwrap();
        for actor in [&fx.student, &fx.outsider] {
            let error = load(fx.store.as_ref(), actor, &fx.course.id).await.unwrap_err();
            assert_eq!(error.kind(), ErrorKind::Forbidden);
        }
    }
}
