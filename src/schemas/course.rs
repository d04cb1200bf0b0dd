use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Course, Task};
use crate::repositories::CourseMembers;
use crate::schemas::user::UserSummary;
use crate::services::courses::{CourseChanges, CourseDetail, TaskDetail};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct CourseCreate {
    #[validate(length(max = 200, message = "name must be at most 200 characters"))]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) description: String,
}

/// Partial update shared by courses and tasks; absent fields stay as they are.
#[derive(Debug, Deserialize, Validate)]
pub(crate) struct NamedUpdate {
    #[serde(default)]
    #[validate(length(max = 200, message = "name must be at most 200 characters"))]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
}

impl NamedUpdate {
    pub(crate) fn into_changes(self) -> CourseChanges {
        CourseChanges { name: self.name, description: self.description }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct MemberAdd {
    #[validate(length(min = 1, message = "login must not be empty"))]
    pub(crate) login: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct TaskCreate {
    #[validate(length(max = 200, message = "name must be at most 200 characters"))]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) description: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) created_by: String,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl CourseResponse {
    pub(crate) fn from_db(course: Course) -> Self {
        Self {
            id: course.id,
            name: course.name,
            description: course.description,
            created_by: course.created_by,
            created_at: format_primitive(course.created_at),
            updated_at: format_primitive(course.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseMembersResponse {
    pub(crate) authors: Vec<UserSummary>,
    pub(crate) participants: Vec<UserSummary>,
}

impl CourseMembersResponse {
    pub(crate) fn from_members(members: CourseMembers) -> Self {
        Self {
            authors: UserSummary::list(members.authors),
            participants: UserSummary::list(members.participants),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseDetailResponse {
    #[serde(flatten)]
    pub(crate) course: CourseResponse,
    pub(crate) tasks: Vec<TaskResponse>,
    pub(crate) authors: Vec<UserSummary>,
    pub(crate) participants: Vec<UserSummary>,
    pub(crate) can_manage: bool,
}

impl CourseDetailResponse {
    pub(crate) fn from_detail(detail: CourseDetail) -> Self {
        Self {
            course: CourseResponse::from_db(detail.course),
            tasks: detail.tasks.into_iter().map(TaskResponse::from_db).collect(),
            authors: UserSummary::list(detail.authors),
            participants: UserSummary::list(detail.participants),
            can_manage: detail.can_manage,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TaskResponse {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl TaskResponse {
    pub(crate) fn from_db(task: Task) -> Self {
        Self {
            id: task.id,
            course_id: task.course_id,
            name: task.name,
            description: task.description,
            created_at: format_primitive(task.created_at),
            updated_at: format_primitive(task.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TaskDetailResponse {
    #[serde(flatten)]
    pub(crate) task: TaskResponse,
    pub(crate) course_name: String,
    pub(crate) can_manage: bool,
}

impl TaskDetailResponse {
    pub(crate) fn from_detail(detail: TaskDetail) -> Self {
        Self {
            task: TaskResponse::from_db(detail.task),
            course_name: detail.course_name,
            can_manage: detail.can_manage,
        }
    }
}
