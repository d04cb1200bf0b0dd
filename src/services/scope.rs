//! Per-request loading of an entity together with the relationships needed
//! to authorize the caller. Nothing here is cached between requests.

use crate::db::models::{Answer, Course, ReviewRequest, Task, User};
use crate::repositories::{CourseMembers, ReviewStore};
use crate::services::access_policy::{self, AnswerRoles, Capabilities, CourseRoles};
use crate::services::error::{ReviewError, ReviewResult};

#[derive(Debug, Clone)]
pub(crate) struct CourseScope {
    pub(crate) course: Course,
    pub(crate) members: CourseMembers,
    pub(crate) roles: CourseRoles,
}

#[derive(Debug, Clone)]
pub(crate) struct TaskScope {
    pub(crate) task: Task,
    pub(crate) course: CourseScope,
}

#[derive(Debug, Clone)]
pub(crate) struct AnswerScope {
    pub(crate) answer: Answer,
    pub(crate) task: Task,
    pub(crate) course: CourseScope,
    pub(crate) requests: Vec<ReviewRequest>,
    pub(crate) roles: AnswerRoles,
    pub(crate) capabilities: Capabilities,
}

pub(crate) async fn load_course(
    store: &dyn ReviewStore,
    actor: &User,
    course_id: &str,
) -> ReviewResult<CourseScope> {
    let course =
        store.find_course(course_id).await?.ok_or_else(|| ReviewError::not_found("Course"))?;
    let members = store.course_members(&course.id).await?;
    let roles = CourseRoles::of(actor, &members);
    Ok(CourseScope { course, members, roles })
}

pub(crate) async fn load_task(
    store: &dyn ReviewStore,
    actor: &User,
    task_id: &str,
) -> ReviewResult<TaskScope> {
    let task = store.find_task(task_id).await?.ok_or_else(|| ReviewError::not_found("Task"))?;
    let course = load_course(store, actor, &task.course_id).await?;
    Ok(TaskScope { task, course })
}

pub(crate) async fn load_answer(
    store: &dyn ReviewStore,
    actor: &User,
    answer_id: &str,
) -> ReviewResult<AnswerScope> {
    let answer =
        store.find_answer(answer_id).await?.ok_or_else(|| ReviewError::not_found("Answer"))?;
    let TaskScope { task, course } = load_task(store, actor, &answer.task_id).await?;
    let requests = store.list_review_requests_for_answer(&answer.id).await?;
    let roles = AnswerRoles::of(actor, &answer, &course.members, &requests);
    let capabilities = access_policy::answer_capabilities(&answer, &roles);
    Ok(AnswerScope { answer, task, course, requests, roles, capabilities })
}
