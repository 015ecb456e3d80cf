/// Authentication endpoints
///
/// - `POST /v1/auth/register` - create an account and get tokens
/// - `POST /v1/auth/login` - exchange credentials for tokens
/// - `POST /v1/auth/refresh` - exchange a refresh token for an access token
/// - `GET  /v1/auth/me` - the authenticated user

use crate::{
    app::AppState,
    error::{validate_request, ActionResponse, ApiError, ApiResult},
    extract::JsonBody,
};
use axum::{extract::State, http::StatusCode, Json};
use planboard_shared::{
    auth::{jwt, middleware::AuthContext, password},
    models::user::{CreateUser, User, UserSummary},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Strength is checked separately, see `password::validate_password_strength`
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Returned by register and login
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: UserSummary,

    #[serde(flatten)]
    pub tokens: jwt::TokenPair,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Register a new user
///
/// ```text
/// POST /v1/auth/register
/// { "email": "ada@example.com", "password": "correct horse 1", "name": "Ada" }
/// ```
///
/// # Errors
///
/// - `422`: invalid email, weak password
/// - `409`: email already registered
pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<ActionResponse<SessionResponse>>)> {
    validate_request(&req)?;
    password::validate_password_strength(&req.password)?;

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email,
            password_hash,
            name: req.name.map(|n| n.trim().to_string()),
            avatar_url: None,
        },
    )
    .await?;

    let tokens = jwt::issue_token_pair(user.id, state.jwt_secret())?;

    Ok(ActionResponse::created(SessionResponse {
        user: user.summary(),
        tokens,
    }))
}

/// Log in with email and password
///
/// Unknown emails and wrong passwords get the same 401.
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> ApiResult<Json<ActionResponse<SessionResponse>>> {
    validate_request(&req)?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::warn!(user_id = %user.id, "Failed login attempt");
        return Err(invalid());
    }

    User::update_last_login(&state.db, user.id).await?;
    let tokens = jwt::issue_token_pair(user.id, state.jwt_secret())?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(ActionResponse::ok(SessionResponse {
        user: user.summary(),
        tokens,
    }))
}

pub async fn refresh(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RefreshRequest>,
) -> ApiResult<Json<ActionResponse<RefreshResponse>>> {
    let access_token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;

    Ok(ActionResponse::ok(RefreshResponse {
        access_token,
        token_type: "Bearer".to_string(),
    }))
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<ActionResponse<User>>> {
    // The token may outlive the account
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;

    Ok(ActionResponse::ok(user))
}
