use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::core::state::AppState;
use crate::schemas::user::{UserActiveUpdate, UserCreate, UserResponse, UserUpdate};
use crate::services::users::NewUser;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:user_id", patch(update_user).delete(delete_user))
        .route("/:user_id/active", patch(set_active))
}

async fn list_users(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.users().list_users(&admin).await?;
    Ok(Json(users.into_iter().map(UserResponse::from_db).collect()))
}

async fn create_user(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let user = state
        .users()
        .create_user(
            &admin,
            NewUser {
                login: payload.login,
                password: payload.password,
                full_name: payload.full_name,
                email: payload.email,
                is_admin: payload.is_admin,
            },
        )
        .await?;

    tracing::info!(
        admin_id = %admin.id,
        user_id = %user.id,
        action = "user_create",
        "Admin created user"
    );
    Ok((StatusCode::CREATED, Json(UserResponse::from_db(user))))
}

async fn update_user(
    Path(user_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<UserUpdate>,
) -> Result<Json<UserResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let user = state.users().update_user(&admin, &user_id, payload.into_changes()).await?;
    Ok(Json(UserResponse::from_db(user)))
}

async fn delete_user(
    Path(user_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.users().delete_user(&admin, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_active(
    Path(user_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<UserActiveUpdate>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.users().set_active(&admin, &user_id, payload.is_active).await?;
    Ok(Json(UserResponse::from_db(user)))
}
