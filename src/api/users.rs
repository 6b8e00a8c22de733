use axum::{
    Extension, Json,
    extract::{Path, State},
};
use std::sync::Arc;

use super::{
    ApiError, ApiResponse, AppState,
    auth::{CurrentUser, MessageResponse, require_admin},
    types::{CreateUserRequest, UserDto},
    validation,
};
use crate::db::Role;

/// GET /users (admin)
pub async fn list_users(
    Extension(current): Extension<CurrentUser>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<UserDto>>>, ApiError> {
    require_admin(&current)?;

    let users = state.store().list_users().await?;

    Ok(Json(ApiResponse::success(
        users.into_iter().map(UserDto::from).collect(),
    )))
}

/// POST /users (admin)
pub async fn create_user(
    Extension(current): Extension<CurrentUser>,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    require_admin(&current)?;

    let username = validation::validate_username(&payload.username)?;
    validation::validate_password(&payload.password)?;

    let role = match payload.role.as_deref() {
        None => Role::User,
        Some(raw) => Role::parse(raw)?,
    };

    let id = state
        .store()
        .create_user(username, &payload.password, role)
        .await?;

    let user = state
        .store()
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::internal("User vanished after insert"))?;

    tracing::info!("User '{}' created by '{}'", user.username, current.username);

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// GET /users/{id} (admin)
pub async fn get_user(
    Extension(current): Extension<CurrentUser>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    require_admin(&current)?;

    let user = state
        .store()
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", id))?;

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// DELETE /users/{id} (admin)
/// Also removes the user's sessions; their history entries keep a null
/// actor via the foreign key's set-null rule.
pub async fn delete_user(
    Extension(current): Extension<CurrentUser>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    require_admin(&current)?;

    if id == current.id {
        return Err(ApiError::validation("Cannot delete your own account"));
    }

    state.store().delete_user(id).await?;

    tracing::info!("User {} deleted by '{}'", id, current.username);

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "User deleted".to_string(),
    })))
}

/// GET /debug/users (admin)
/// Diagnostic listing kept from the early builds, now behind the same
/// admin check as the rest of user management.
pub async fn debug_users(
    Extension(current): Extension<CurrentUser>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<UserDto>>>, ApiError> {
    require_admin(&current)?;

    let users = state.store().list_users().await?;

    Ok(Json(ApiResponse::success(
        users.into_iter().map(UserDto::from).collect(),
    )))
}
