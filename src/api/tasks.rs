use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use validator::Validate;

use crate::api::answers::form::read_answer_form;
use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::schemas::answer::{AnswerDetailResponse, AnswerListItemResponse};
use crate::schemas::course::{NamedUpdate, TaskDetailResponse, TaskResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/:task_id", get(task_detail).patch(update_task).delete(delete_task))
        .route("/:task_id/answers", get(list_answers).post(submit_answer))
}

async fn task_detail(
    Path(task_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<TaskDetailResponse>, ApiError> {
    let detail = state.catalog().task_detail(&user, &task_id).await?;
    Ok(Json(TaskDetailResponse::from_detail(detail)))
}

async fn update_task(
    Path(task_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<NamedUpdate>,
) -> Result<Json<TaskResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let task = state.catalog().update_task(&user, &task_id, payload.into_changes()).await?;
    Ok(Json(TaskResponse::from_db(task)))
}

async fn delete_task(
    Path(task_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.catalog().delete_task(&user, &task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_answers(
    Path(task_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AnswerListItemResponse>>, ApiError> {
    let items = state.lifecycle().list_for_task(&user, &task_id).await?;
    Ok(Json(items.into_iter().map(AnswerListItemResponse::from_item).collect()))
}

async fn submit_answer(
    Path(task_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<AnswerDetailResponse>), ApiError> {
    let form = read_answer_form(multipart, state.upload_limits()).await?;
    let text = form.text.unwrap_or_default();
    let detail = state.lifecycle().submit(&user, &task_id, &text, form.files).await?;
    Ok((StatusCode::CREATED, Json(AnswerDetailResponse::from_detail(detail))))
}
