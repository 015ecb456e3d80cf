/// Error handling for the API server
///
/// Every handler returns `ApiResult<T>`. Failures render as
///
/// ```json
/// { "success": false, "error": "Issue not found", "code": "not_found" }
/// ```
///
/// with an optional `details` array for validation failures. Successful
/// actions wrap their payload in [`ActionResponse`].
///
/// # Example
///
/// ```
/// use planboard_api::error::{ActionResponse, ApiError, ApiResult};
/// use axum::Json;
///
/// async fn handler(found: bool) -> ApiResult<Json<ActionResponse<&'static str>>> {
///     if !found {
///         return Err(ApiError::NotFound("Thing not found".to_string()));
///     }
///     Ok(ActionResponse::ok("thing"))
/// }
/// ```

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use planboard_shared::{
    ai_limit::AiLimitError,
    auth::{
        authorization::AuthzError, jwt::JwtError, middleware::AuthError, password::PasswordError,
    },
    board::BoardError,
};
use serde::{Deserialize, Serialize};
use sqlx::error::ErrorKind;
use std::fmt;
use validator::{Validate, ValidationErrors};

use crate::ai::AiClientError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404), also used for soft-deleted rows
    NotFound(String),

    /// Conflict (409): duplicates, WIP limits, last-owner rules
    Conflict(String),

    /// Unprocessable entity (422)
    ValidationError(Vec<ValidationErrorDetail>),

    /// Too many requests (429)
    RateLimitExceeded { retry_after: u64, message: String },

    /// Internal server error (500)
    InternalError(String),

    /// Upstream AI provider failed (502)
    BadGateway(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Failure body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,

    /// Human-readable message
    pub error: String,

    /// Machine-readable kind (e.g. "not_found")
    pub code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

/// Success body
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ActionResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }

    /// 201 with the created resource
    pub fn created(data: T) -> (StatusCode, Json<Self>) {
        (StatusCode::CREATED, Self::ok(data))
    }
}

impl ApiError {
    pub fn validation(field: &str, message: &str) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail::new(field, message)])
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::ValidationError(_) => "validation_error",
            ApiError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            ApiError::InternalError(_) => "internal_error",
            ApiError::BadGateway(_) => "ai_unavailable",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::RateLimitExceeded { message, .. } => {
                write!(f, "Rate limit exceeded: {}", message)
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::BadGateway(msg) => write!(f, "Bad gateway: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code().to_string();
        let retry_after = match &self {
            ApiError::RateLimitExceeded { retry_after, .. } => Some(*retry_after),
            _ => None,
        };

        let (message, details) = match self {
            ApiError::ValidationError(errors) => {
                ("Request validation failed".to_string(), Some(errors))
            }
            ApiError::RateLimitExceeded { message, .. } => (message, None),
            ApiError::InternalError(msg) => {
                // Logged, never shown
                tracing::error!("Internal error: {}", msg);
                ("An internal error occurred".to_string(), None)
            }
            ApiError::BadGateway(msg) => {
                tracing::warn!("AI provider error: {}", msg);
                ("The AI service failed to respond".to_string(), None)
            }
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::ServiceUnavailable(msg) => (msg, None),
        };

        let body = Json(ErrorResponse {
            success: false,
            error: message,
            code,
            details,
        });

        let mut response = (status, body).into_response();
        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

/// Flattens `validator` errors into `{field, message}` pairs, sorted by field
pub fn validation_details(errors: &ValidationErrors) -> Vec<ValidationErrorDetail> {
    let mut details: Vec<ValidationErrorDetail> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| ValidationErrorDetail {
                field: field.to_string(),
                message: e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid {}", field)),
            })
        })
        .collect();
    details.sort_by(|a, b| a.field.cmp(&b.field));
    details
}

/// Runs `validator` checks on a request body
pub fn validate_request<T: Validate>(payload: &T) -> ApiResult<()> {
    payload
        .validate()
        .map_err(|e| ApiError::ValidationError(validation_details(&e)))
}

/// User-facing message for a unique constraint, by exact constraint name
fn duplicate_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("users_email_key") => "Email already exists",
        Some("idx_projects_team_key") => "A project with this key already exists",
        Some("labels_team_name_key") => "A label with this name already exists",
        Some("team_members_pkey") => "Already a member of this team",
        Some("issues_project_number_key") => "Issue number already taken, retry",
        _ => "Resource already exists",
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation => {
                    ApiError::Conflict(duplicate_message(db_err.constraint()).to_string())
                }
                ErrorKind::ForeignKeyViolation => {
                    ApiError::NotFound("Referenced resource not found".to_string())
                }
                ErrorKind::CheckViolation | ErrorKind::NotNullViolation => ApiError::validation(
                    db_err.constraint().unwrap_or("request"),
                    "Value is not allowed",
                ),
                _ => ApiError::InternalError(format!("Database error: {}", db_err)),
            },
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => {
                ApiError::Unauthorized("Missing credentials".to_string())
            }
            AuthError::InvalidFormat(msg) => ApiError::BadRequest(msg),
            AuthError::InvalidToken(msg) => ApiError::Unauthorized(msg),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotMember(_) => {
                ApiError::Forbidden("You are not a member of this team".to_string())
            }
            AuthzError::InsufficientRole { .. } => {
                ApiError::Forbidden("Insufficient permissions".to_string())
            }
            AuthzError::NotAuthor => {
                ApiError::Forbidden("Not authorized to modify this resource".to_string())
            }
            AuthzError::DatabaseError(err) => err.into(),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooWeak(msg) => ApiError::validation("password", &msg),
            other => ApiError::InternalError(format!("Password operation failed: {}", other)),
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::CreateError(msg) => {
                ApiError::InternalError(format!("Token creation failed: {}", msg))
            }
            _ => ApiError::Unauthorized("Invalid token".to_string()),
        }
    }
}

impl From<BoardError> for ApiError {
    fn from(err: BoardError) -> Self {
        match err {
            BoardError::IssueNotFound => ApiError::NotFound("Issue not found".to_string()),
            BoardError::StatusNotInProject => {
                ApiError::validation("custom_status_id", "Status does not belong to this project")
            }
            BoardError::WipLimitExceeded { column, limit } => ApiError::Conflict(format!(
                "Column \"{}\" is at its WIP limit of {}",
                column, limit
            )),
            BoardError::DatabaseError(err) => err.into(),
        }
    }
}

impl From<AiLimitError> for ApiError {
    fn from(err: AiLimitError) -> Self {
        match err {
            AiLimitError::LimitExceeded { retry_after, .. } => ApiError::RateLimitExceeded {
                retry_after,
                message: format!("{}. Try again in {} seconds", err, retry_after),
            },
            AiLimitError::DatabaseError(err) => err.into(),
        }
    }
}

impl From<AiClientError> for ApiError {
    fn from(err: AiClientError) -> Self {
        ApiError::BadGateway(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planboard_shared::ai_limit::LimitWindow;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1, max = 3, message = "Name must be 1-3 characters"))]
        name: String,
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("Issue not found".to_string());
        assert_eq!(err.to_string(), "Not found: Issue not found");
    }

    #[test]
    fn test_validate_request() {
        let ok = Sample {
            name: "abc".to_string(),
        };
        assert!(validate_request(&ok).is_ok());

        let bad = Sample {
            name: "abcd".to_string(),
        };
        match validate_request(&bad) {
            Err(ApiError::ValidationError(details)) => {
                assert_eq!(details.len(), 1);
                assert_eq!(details[0].field, "name");
                assert_eq!(details[0].message, "Name must be 1-3 characters");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::NotFound("Issue not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Issue not found");
        assert_eq!(body["code"], "not_found");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_internal_error_is_hidden() {
        let response = ApiError::InternalError("connection reset".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "An internal error occurred");
    }

    #[tokio::test]
    async fn test_rate_limit_sets_retry_after() {
        let err: ApiError = AiLimitError::LimitExceeded {
            window: LimitWindow::Minute,
            limit: 5,
            retry_after: 42,
        }
        .into();

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");

        let body = body_json(response).await;
        assert_eq!(body["code"], "rate_limit_exceeded");
    }

    #[test]
    fn test_authz_errors_are_forbidden() {
        let err: ApiError = AuthzError::NotMember(uuid::Uuid::new_v4()).into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let err: ApiError = AuthzError::NotAuthor.into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_board_error_mapping() {
        let err: ApiError = BoardError::WipLimitExceeded {
            column: "Review".to_string(),
            limit: 2,
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: ApiError = BoardError::IssueNotFound.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: ApiError = BoardError::StatusNotInProject.into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[derive(Debug)]
    struct FakeDbError {
        kind: ErrorKind,
        constraint: &'static str,
    }

    impl fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "violates constraint \"{}\"", self.constraint)
        }
    }

    impl std::error::Error for FakeDbError {}

    impl sqlx::error::DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            "constraint violation"
        }

        fn constraint(&self) -> Option<&str> {
            Some(self.constraint)
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.kind {
                ErrorKind::UniqueViolation => ErrorKind::UniqueViolation,
                ErrorKind::ForeignKeyViolation => ErrorKind::ForeignKeyViolation,
                ErrorKind::CheckViolation => ErrorKind::CheckViolation,
                ErrorKind::NotNullViolation => ErrorKind::NotNullViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    fn db_error(kind: ErrorKind, constraint: &'static str) -> ApiError {
        sqlx::Error::Database(Box::new(FakeDbError { kind, constraint })).into()
    }

    #[test]
    fn test_unique_violations_map_by_constraint_name() {
        match db_error(ErrorKind::UniqueViolation, "issues_project_number_key") {
            ApiError::Conflict(msg) => assert_eq!(msg, "Issue number already taken, retry"),
            other => panic!("expected conflict, got {:?}", other),
        }
        match db_error(ErrorKind::UniqueViolation, "idx_projects_team_key") {
            ApiError::Conflict(msg) => assert_eq!(msg, "A project with this key already exists"),
            other => panic!("expected conflict, got {:?}", other),
        }
        match db_error(ErrorKind::UniqueViolation, "labels_team_name_key") {
            ApiError::Conflict(msg) => assert_eq!(msg, "A label with this name already exists"),
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_foreign_key_violations_are_not_conflicts() {
        let err = db_error(ErrorKind::ForeignKeyViolation, "issue_labels_label_id_fkey");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = db_error(ErrorKind::ForeignKeyViolation, "issues_custom_status_id_fkey");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_check_violation_is_validation_error() {
        let err = db_error(ErrorKind::CheckViolation, "team_invites_role_not_owner");
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_weak_password_is_validation_error() {
        let err: ApiError = PasswordError::TooWeak("too short".to_string()).into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
