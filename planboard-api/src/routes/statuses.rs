/// Custom status (board column) endpoints
///
/// A custom status sits beside the built-in columns and maps onto one
/// built-in `category`, which is the status its issues report. Deleting a
/// column moves its issues back to the category column.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use planboard_shared::{
    auth::middleware::AuthContext,
    board,
    models::{
        custom_status::{CreateCustomStatus, CustomStatus, UpdateCustomStatus},
        issue::IssueStatus,
        project::Project,
        team_member::TeamRole,
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{access::project_access, check_length, nullable, validate_hex_color, Deleted};
use crate::{
    app::AppState,
    error::{validate_request, ActionResponse, ApiError, ApiResult},
    extract::JsonBody,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStatusRequest {
    #[validate(length(min = 1, max = 30, message = "Status name must be 1-30 characters"))]
    pub name: String,

    #[validate(custom(function = "validate_hex_color"))]
    pub color: String,

    pub category: IssueStatus,

    #[validate(range(min = 1, message = "WIP limit must be at least 1"))]
    pub wip_limit: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub name: Option<String>,
    pub color: Option<String>,
    pub position: Option<i32>,

    /// `null` removes the limit
    #[serde(default, deserialize_with = "nullable")]
    pub wip_limit: Option<Option<i32>>,
}

impl UpdateStatusRequest {
    fn check(&self) -> ApiResult<()> {
        check_length("name", self.name.as_deref(), 1, 30)?;

        if let Some(color) = &self.color {
            if validate_hex_color(color).is_err() {
                return Err(ApiError::validation("color", "Color must be #RRGGBB"));
            }
        }
        if matches!(self.position, Some(p) if p < 0) {
            return Err(ApiError::validation("position", "Position cannot be negative"));
        }
        if matches!(self.wip_limit, Some(Some(limit)) if limit < 1) {
            return Err(ApiError::validation("wip_limit", "WIP limit must be at least 1"));
        }
        Ok(())
    }
}

/// The status and its project, checked against the caller's role
async fn status_access(
    state: &AppState,
    status_id: Uuid,
    user_id: Uuid,
    required: TeamRole,
) -> ApiResult<(CustomStatus, Project)> {
    let status = CustomStatus::find_by_id(&state.db, status_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Status not found".to_string()))?;

    let (project, _) = project_access(state, status.project_id, user_id, required).await?;
    Ok((status, project))
}

pub async fn create_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
    JsonBody(req): JsonBody<CreateStatusRequest>,
) -> ApiResult<(StatusCode, Json<ActionResponse<CustomStatus>>)> {
    project_access(&state, project_id, auth.user_id, TeamRole::Admin).await?;
    validate_request(&req)?;
    check_length("name", Some(&req.name), 1, 30)?;

    let status = CustomStatus::create(
        &state.db,
        CreateCustomStatus {
            project_id,
            name: req.name.trim().to_string(),
            color: req.color,
            category: req.category,
            wip_limit: req.wip_limit,
        },
    )
    .await?;

    tracing::info!(status_id = %status.id, project_id = %project_id, "Custom status created");

    Ok(ActionResponse::created(status))
}

/// Ordered by position
pub async fn list_statuses(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<Vec<CustomStatus>>>> {
    project_access(&state, project_id, auth.user_id, TeamRole::Member).await?;

    let statuses = CustomStatus::list_by_project(&state.db, project_id).await?;
    Ok(ActionResponse::ok(statuses))
}

/// Lowering a WIP limit below the current count is allowed; the limit only
/// blocks further moves into the column.
pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(status_id): Path<Uuid>,
    JsonBody(req): JsonBody<UpdateStatusRequest>,
) -> ApiResult<Json<ActionResponse<CustomStatus>>> {
    let (current, _) = status_access(&state, status_id, auth.user_id, TeamRole::Admin).await?;
    req.check()?;

    let index = req.position.map(|p| usize::try_from(p).unwrap_or(0));
    let status = board::update_custom_status(
        &state.db,
        &current,
        UpdateCustomStatus {
            name: req.name.map(|n| n.trim().to_string()),
            color: req.color,
            wip_limit: req.wip_limit,
        },
        index,
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Status not found".to_string()))?;

    Ok(ActionResponse::ok(status))
}

pub async fn delete_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(status_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<Deleted>>> {
    let (status, project) = status_access(&state, status_id, auth.user_id, TeamRole::Admin).await?;

    if !board::remove_custom_status(&state.db, &status).await? {
        return Err(ApiError::NotFound("Status not found".to_string()));
    }

    tracing::info!(
        status_id = %status_id,
        project_id = %project.id,
        category = status.category.as_str(),
        "Custom status deleted"
    );

    Ok(ActionResponse::ok(Deleted::new(status_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_status_validation() {
        let mut req = CreateStatusRequest {
            name: "QA".to_string(),
            color: "#22AA88".to_string(),
            category: IssueStatus::InReview,
            wip_limit: Some(3),
        };
        assert!(validate_request(&req).is_ok());

        req.wip_limit = Some(0);
        assert!(validate_request(&req).is_err());

        req.wip_limit = None;
        req.color = "green".to_string();
        assert!(validate_request(&req).is_err());
    }

    #[test]
    fn test_update_status_checks() {
        let clear: UpdateStatusRequest = serde_json::from_str(r#"{"wip_limit": null}"#).unwrap();
        assert_eq!(clear.wip_limit, Some(None));
        assert!(clear.check().is_ok());

        let zero: UpdateStatusRequest = serde_json::from_str(r#"{"wip_limit": 0}"#).unwrap();
        assert!(zero.check().is_err());

        let negative: UpdateStatusRequest = serde_json::from_str(r#"{"position": -1}"#).unwrap();
        assert!(negative.check().is_err());
    }
}
