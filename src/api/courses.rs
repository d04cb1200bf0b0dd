use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::db::models::User;
use crate::db::types::CourseRole;
use crate::schemas::course::{
    CourseCreate, CourseDetailResponse, CourseMembersResponse, CourseResponse, MemberAdd,
    NamedUpdate, TaskCreate, TaskResponse,
};
use crate::services::course_metrics::{self, CourseMetrics};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_courses).post(create_course))
        .route("/:course_id", get(course_detail).patch(update_course))
        .route("/:course_id/authors", post(add_author))
        .route("/:course_id/participants", post(add_participant))
        .route("/:course_id/members/:login", delete(remove_member))
        .route("/:course_id/metrics", get(metrics))
        .route("/:course_id/tasks", post(create_task))
}

async fn list_courses(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<CourseResponse>>, ApiError> {
    let courses = state.catalog().list_courses(&user).await?;
    Ok(Json(courses.into_iter().map(CourseResponse::from_db).collect()))
}

async fn create_course(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<CourseCreate>,
) -> Result<(StatusCode, Json<CourseResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let course =
        state.catalog().create_course(&user, &payload.name, &payload.description).await?;
    Ok((StatusCode::CREATED, Json(CourseResponse::from_db(course))))
}

async fn course_detail(
    Path(course_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<CourseDetailResponse>, ApiError> {
    let detail = state.catalog().course_detail(&user, &course_id).await?;
    Ok(Json(CourseDetailResponse::from_detail(detail)))
}

async fn update_course(
    Path(course_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<NamedUpdate>,
) -> Result<Json<CourseResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let course = state.catalog().update_course(&user, &course_id, payload.into_changes()).await?;
    Ok(Json(CourseResponse::from_db(course)))
}

async fn add_author(
    Path(course_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<MemberAdd>,
) -> Result<Json<CourseMembersResponse>, ApiError> {
    add_member(&state, &user, &course_id, payload, CourseRole::Author).await
}

async fn add_participant(
    Path(course_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<MemberAdd>,
) -> Result<Json<CourseMembersResponse>, ApiError> {
    add_member(&state, &user, &course_id, payload, CourseRole::Participant).await
}

async fn add_member(
    state: &AppState,
    user: &User,
    course_id: &str,
    payload: MemberAdd,
    role: CourseRole,
) -> Result<Json<CourseMembersResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let members = state.catalog().add_member(user, course_id, &payload.login, role).await?;
    Ok(Json(CourseMembersResponse::from_members(members)))
}

async fn remove_member(
    Path((course_id, login)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<CourseMembersResponse>, ApiError> {
    let members = state.catalog().remove_member(&user, &course_id, &login).await?;
    Ok(Json(CourseMembersResponse::from_members(members)))
}

async fn metrics(
    Path(course_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<CourseMetrics>, ApiError> {
    Ok(Json(course_metrics::load(state.store(), &user, &course_id).await?))
}

async fn create_task(
    Path(course_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<TaskCreate>,
) -> Result<(StatusCode, Json<TaskResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let task =
        state.catalog().create_task(&user, &course_id, &payload.name, &payload.description).await?;
    Ok((StatusCode::CREATED, Json(TaskResponse::from_db(task))))
}
