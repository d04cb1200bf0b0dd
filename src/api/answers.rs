use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::schemas::answer::{AnswerDetailResponse, AnswerResponse, FinalizeRequest};
use crate::schemas::review::{
    CommentCreate, CommentQuery, CommentResponse, ReviewRequestResponse, ReviewerAssign,
};
use crate::schemas::user::UserSummary;
use crate::services::preview::FilePreview;

pub(crate) mod form;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/:answer_id", get(answer_detail).put(edit_answer).delete(delete_answer))
        .route("/:answer_id/request-review", post(request_review))
        .route("/:answer_id/finalize", post(finalize))
        .route("/:answer_id/allow-retry", post(allow_retry))
        .route("/:answer_id/reviewers", get(list_reviewers).post(assign_reviewer))
        .route("/:answer_id/reviewer-candidates", get(reviewer_candidates))
        .route("/:answer_id/comments", get(list_comments).post(add_comment))
        .route("/:answer_id/files/:file_name/preview", get(preview_file))
}

async fn answer_detail(
    Path(answer_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AnswerDetailResponse>, ApiError> {
    let detail = state.lifecycle().detail(&user, &answer_id).await?;
    Ok(Json(AnswerDetailResponse::from_detail(detail)))
}

async fn edit_answer(
    Path(answer_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnswerDetailResponse>, ApiError> {
    let form = form::read_answer_form(multipart, state.upload_limits()).await?;
    let (text, replacement) = form.replacement()?;
    let text = text.ok_or_else(|| ApiError::BadRequest("text is required".to_string()))?;
    let detail = state.lifecycle().edit(&user, &answer_id, &text, replacement).await?;
    Ok(Json(AnswerDetailResponse::from_detail(detail)))
}

async fn delete_answer(
    Path(answer_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.lifecycle().delete(&user, &answer_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn request_review(
    Path(answer_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let answer = state.lifecycle().request_review(&user, &answer_id).await?;
    Ok(Json(AnswerResponse::from_db(answer)))
}

async fn finalize(
    Path(answer_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<FinalizeRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let answer = state
        .lifecycle()
        .finalize(&user, &answer_id, payload.grade, payload.allow_resubmit)
        .await?;
    Ok(Json(AnswerResponse::from_db(answer)))
}

async fn allow_retry(
    Path(answer_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let answer = state.lifecycle().allow_retry(&user, &answer_id).await?;
    Ok(Json(AnswerResponse::from_db(answer)))
}

async fn list_reviewers(
    Path(answer_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ReviewRequestResponse>>, ApiError> {
    let requests = state.assignments().list_requests(&user, &answer_id).await?;
    Ok(Json(requests.into_iter().map(ReviewRequestResponse::from_db).collect()))
}

async fn assign_reviewer(
    Path(answer_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<ReviewerAssign>,
) -> Result<(StatusCode, Json<ReviewRequestResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let request = state.assignments().assign_reviewer(&user, &answer_id, &payload.login).await?;
    Ok((StatusCode::CREATED, Json(ReviewRequestResponse::from_db(request))))
}

async fn reviewer_candidates(
    Path(answer_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let candidates = state.assignments().candidates(&user, &answer_id).await?;
    Ok(Json(UserSummary::list(candidates)))
}

async fn list_comments(
    Path(answer_id): Path<String>,
    Query(query): Query<CommentQuery>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<CommentResponse>>, ApiError> {
    let comments =
        state.comments().list_comments(&user, &answer_id, query.file.as_deref()).await?;
    Ok(Json(comments.into_iter().map(CommentResponse::from_db).collect()))
}

async fn add_comment(
    Path(answer_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<CommentCreate>,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    let comment =
        state.comments().add_comment(&user, &answer_id, payload.into_new_comment()).await?;
    Ok((StatusCode::CREATED, Json(CommentResponse::from_db(comment))))
}

async fn preview_file(
    Path((answer_id, file_name)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<FilePreview>, ApiError> {
    Ok(Json(state.lifecycle().preview(&user, &answer_id, &file_name).await?))
}
