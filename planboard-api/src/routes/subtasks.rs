/// Subtask (checklist) endpoints
///
/// Subtasks are appended to the end of the list and hard-deleted.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use planboard_shared::{
    auth::middleware::AuthContext,
    models::{
        subtask::{Subtask, UpdateSubtask},
        team_member::TeamRole,
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{access::issue_access, check_length, Deleted};
use crate::{
    app::AppState,
    error::{validate_request, ActionResponse, ApiError, ApiResult},
    extract::JsonBody,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubtaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSubtaskRequest {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

/// The subtask, once the caller is known to belong to its issue's team
async fn subtask_access(state: &AppState, subtask_id: Uuid, user_id: Uuid) -> ApiResult<Subtask> {
    let subtask = Subtask::find_by_id(&state.db, subtask_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Subtask not found".to_string()))?;

    issue_access(state, subtask.issue_id, user_id, TeamRole::Member).await?;
    Ok(subtask)
}

pub async fn create_subtask(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(issue_id): Path<Uuid>,
    JsonBody(req): JsonBody<CreateSubtaskRequest>,
) -> ApiResult<(StatusCode, Json<ActionResponse<Subtask>>)> {
    let (issue, _, _) = issue_access(&state, issue_id, auth.user_id, TeamRole::Member).await?;
    validate_request(&req)?;
    check_length("title", Some(&req.title), 1, 200)?;

    let subtask = Subtask::create(&state.db, issue.id, req.title.trim()).await?;
    Ok(ActionResponse::created(subtask))
}

pub async fn list_subtasks(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(issue_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<Vec<Subtask>>>> {
    let (issue, _, _) = issue_access(&state, issue_id, auth.user_id, TeamRole::Member).await?;

    let subtasks = Subtask::list_by_issue(&state.db, issue.id).await?;
    Ok(ActionResponse::ok(subtasks))
}

pub async fn update_subtask(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(subtask_id): Path<Uuid>,
    JsonBody(req): JsonBody<UpdateSubtaskRequest>,
) -> ApiResult<Json<ActionResponse<Subtask>>> {
    let subtask = subtask_access(&state, subtask_id, auth.user_id).await?;
    check_length("title", req.title.as_deref(), 1, 200)?;

    let subtask = Subtask::update(
        &state.db,
        subtask.id,
        UpdateSubtask {
            title: req.title.map(|t| t.trim().to_string()),
            completed: req.completed,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Subtask not found".to_string()))?;

    Ok(ActionResponse::ok(subtask))
}

pub async fn delete_subtask(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(subtask_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<Deleted>>> {
    let subtask = subtask_access(&state, subtask_id, auth.user_id).await?;

    if !Subtask::delete(&state.db, subtask.id).await? {
        return Err(ApiError::NotFound("Subtask not found".to_string()));
    }

    Ok(ActionResponse::ok(Deleted::new(subtask_id)))
}
