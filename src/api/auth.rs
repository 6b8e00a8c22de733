use axum::{
    Json,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, types::UserDto};
use crate::db::{Role, User};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: String,
    pub user: UserDto,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// The authenticated caller, injected into request extensions by
/// `auth_middleware` and read by handlers that need the actor.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i32,
    pub username: String,
    pub role: Role,
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
        }
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Gate for every protected route: requires `Authorization: Bearer
/// <token>` resolving to an unexpired session.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let Some(token) = extract_bearer_token(&headers) else {
        return Err(ApiError::Unauthorized("Missing bearer token".to_string()));
    };

    let user = state
        .store()
        .verify_session(&token)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::Unauthorized("Invalid or expired session".to_string()))?;

    request.extensions_mut().insert(CurrentUser::from(user));

    Ok(next.run(request).await)
}

/// Extract the token from an `Authorization: Bearer` header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        return Some(token.trim().to_string());
    }

    None
}

/// Role check for admin-only operations; 403, distinct from the 401
/// the middleware gives unauthenticated callers.
pub fn require_admin(user: &CurrentUser) -> Result<(), ApiError> {
    if user.role == Role::Admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Admin role required".to_string()))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
/// Verify credentials and issue a session token (24h fixed TTL).
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    if payload.username.is_empty() {
        return Err(ApiError::validation("Username is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let user = state
        .store()
        .verify_credentials(&payload.username, &payload.password)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    let session = state
        .store()
        .create_session(user.id)
        .await
        .map_err(ApiError::from)?;

    tracing::info!("User '{}' logged in", user.username);

    Ok(Json(ApiResponse::success(LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
        user: UserDto::from(user),
    })))
}

/// POST /auth/logout
/// Delete the presented session. Idempotent: unknown tokens still 200.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if let Some(token) = extract_bearer_token(&headers) {
        state
            .store()
            .delete_session(&token)
            .await
            .map_err(ApiError::from)?;
    }

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Logged out".to_string(),
    })))
}

/// GET /auth/me
pub async fn get_current_user(
    axum::Extension(user): axum::Extension<CurrentUser>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let user = state
        .store()
        .get_user(user.id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// PUT /auth/password
/// Change the caller's password after re-verifying the current one.
pub async fn change_password(
    axum::Extension(user): axum::Extension<CurrentUser>,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    super::validation::validate_password(&payload.new_password)?;

    if payload.current_password == payload.new_password {
        return Err(ApiError::validation(
            "New password must be different from current password",
        ));
    }

    state
        .store()
        .change_password(user.id, &payload.current_password, &payload.new_password)
        .await
        .map_err(|e| match e {
            crate::error::CoreError::Unauthorized => {
                ApiError::validation("Current password is incorrect")
            }
            other => ApiError::from(other),
        })?;

    tracing::info!("Password changed for user: {}", user.username);

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Password updated successfully".to_string(),
    })))
}
