use axum::{extract::State, routing::get, Json, Router};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::schemas::notification::NotificationResponse;
use crate::schemas::review::AssignedReviewResponse;
use crate::services::notifications;

/// Per-user queues mounted at the API root.
pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/review-requests", get(assigned_reviews))
        .route("/notifications", get(list_notifications))
}

async fn assigned_reviews(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AssignedReviewResponse>>, ApiError> {
    let assigned = state.assignments().list_assigned(&user).await?;
    Ok(Json(assigned.into_iter().map(AssignedReviewResponse::from_assigned).collect()))
}

async fn list_notifications(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<NotificationResponse>>, ApiError> {
    let inbox = notifications::inbox(state.store(), &user).await?;
    Ok(Json(inbox.into_iter().map(NotificationResponse::from_db).collect()))
}
