//! Authentication API Endpoints
//! Mission: Admin and staff login, and the caller's own profile

use crate::access::{resolve_user, AccessError};
use crate::auth::{
    jwt::JwtHandler,
    models::{
        Claims, LoginRequest, LoginResponse, StaffLoginRequest, User, UserResponse, UserRole,
    },
};
use crate::store::Store;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub store: Arc<Store>,
    pub jwt_handler: Arc<JwtHandler>,
}

fn issue(state: &AuthState, user: &User) -> Result<Json<LoginResponse>, AuthApiError> {
    let (access_token, expires_in) = state.jwt_handler.generate_token(user).map_err(|e| {
        error!("Token generation failed: {:#}", e);
        AuthApiError::InternalError
    })?;

    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in,
        role: user.role,
    }))
}

/// Admin login - POST /admin/login
pub async fn admin_login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthApiError> {
    info!("Admin login attempt: {}", payload.username);

    let user = state
        .store
        .verify_credentials(&payload.username, &payload.password)
        .map_err(|e| {
            error!("Credential lookup failed: {}", e);
            AuthApiError::InternalError
        })?
        .ok_or_else(|| {
            warn!("Failed admin login: {}", payload.username);
            AuthApiError::InvalidCredentials
        })?;

    if user.role != UserRole::Admin {
        warn!("Non-admin {} tried the admin login", payload.username);
        return Err(AuthApiError::NotAdmin);
    }

    info!("Admin login successful: {}", payload.username);
    issue(&state, &user)
}

/// Staff login by roll number - POST /staff/login
pub async fn staff_login(
    State(state): State<AuthState>,
    Json(payload): Json<StaffLoginRequest>,
) -> Result<Json<LoginResponse>, AuthApiError> {
    let roll = payload.staff_roll_number.trim();
    info!("Staff login attempt: {}", roll);

    let user = state
        .store
        .get_user_by_staff_roll(roll)
        .map_err(|e| {
            error!("Staff lookup failed: {}", e);
            AuthApiError::InternalError
        })?
        .ok_or_else(|| {
            warn!("Failed staff login: {}", roll);
            AuthApiError::InvalidRollNumber
        })?;

    if !user.role.is_staff() {
        return Err(AuthApiError::NotStaff);
    }

    info!("Staff login successful: {} ({})", roll, user.role);
    issue(&state, &user)
}

/// Current user - GET /auth/me
pub async fn me(
    State(state): State<AuthState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserResponse>, AuthApiError> {
    let user = resolve_user(state.store.as_ref(), &claims).map_err(|e| match e {
        AccessError::UserNotFound => AuthApiError::UserNotFound,
        AccessError::InvalidToken => AuthApiError::InvalidToken,
        other => {
            error!("Resolving {} failed: {}", claims.sub, other);
            AuthApiError::InternalError
        }
    })?;

    Ok(Json(UserResponse::from_user(&user)))
}

/// Auth API errors
#[derive(Debug)]
pub enum AuthApiError {
    InvalidCredentials,
    InvalidRollNumber,
    InvalidToken,
    NotAdmin,
    NotStaff,
    UserNotFound,
    InternalError,
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid username or password")
            }
            AuthApiError::InvalidRollNumber => (StatusCode::UNAUTHORIZED, "Invalid roll number"),
            AuthApiError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid or expired token"),
            AuthApiError::NotAdmin => (StatusCode::FORBIDDEN, "Not an admin user"),
            AuthApiError::NotStaff => (StatusCode::FORBIDDEN, "Not a staff user"),
            AuthApiError::UserNotFound => (StatusCode::NOT_FOUND, "User not found"),
            AuthApiError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
