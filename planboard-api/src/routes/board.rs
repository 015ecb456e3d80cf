/// Kanban board endpoints
///
/// ```text
/// GET   /v1/projects/:project_id/board
/// POST  /v1/issues/:issue_id/move       { "status": "in_progress", "index": 0 }
///                                       { "custom_status_id": "...", "index": 2 }
/// POST  /v1/issues/:issue_id/position   { "index": 1 }
/// ```
///
/// `index` is clamped to the destination column.

use axum::{
    extract::{Path, State},
    Json,
};
use planboard_shared::{
    auth::middleware::AuthContext,
    board::{self, Board, ColumnKey, MoveOutcome},
    models::{
        issue::IssueStatus,
        notification::{NewNotification, NotificationKind},
        team_member::TeamRole,
    },
};
use serde::Deserialize;
use uuid::Uuid;

use super::access::{issue_access, notify, project_access};
use crate::{
    app::AppState,
    error::{ActionResponse, ApiError, ApiResult},
    extract::JsonBody,
};

#[derive(Debug, Deserialize)]
pub struct MoveIssueRequest {
    pub status: Option<IssueStatus>,
    pub custom_status_id: Option<Uuid>,

    #[serde(default)]
    pub index: usize,
}

impl MoveIssueRequest {
    fn target(&self) -> ApiResult<ColumnKey> {
        ColumnKey::from_parts(self.status, self.custom_status_id).ok_or_else(|| {
            ApiError::validation("status", "Either status or custom_status_id is required")
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatePositionRequest {
    pub index: usize,
}

pub async fn get_board(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<Board>>> {
    let (project, _) = project_access(&state, project_id, auth.user_id, TeamRole::Member).await?;

    let board = board::load_board(&state.db, project.id).await?;
    Ok(ActionResponse::ok(board))
}

/// Moves an issue to another column, or within its own
pub async fn move_issue(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(issue_id): Path<Uuid>,
    JsonBody(req): JsonBody<MoveIssueRequest>,
) -> ApiResult<Json<ActionResponse<MoveOutcome>>> {
    let (issue, project, _) = issue_access(&state, issue_id, auth.user_id, TeamRole::Member).await?;
    let target = req.target()?;

    let outcome = board::move_issue(&state.db, issue.id, target, req.index, auth.user_id).await?;

    if outcome.column_changed {
        if let Some(assignee_id) = issue.assignee_id.filter(|id| *id != auth.user_id) {
            notify(
                &state.db,
                NewNotification {
                    user_id: assignee_id,
                    kind: NotificationKind::StatusChanged,
                    title: format!(
                        "{} moved to {}",
                        project.issue_identifier(issue.number),
                        outcome.column_name
                    ),
                    body: Some(issue.title.clone()),
                    link_issue_id: Some(issue.id),
                    link_team_id: Some(project.team_id),
                },
            )
            .await;
        }
    }

    Ok(ActionResponse::ok(outcome))
}

/// Reorders an issue inside its current column
pub async fn update_position(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(issue_id): Path<Uuid>,
    JsonBody(req): JsonBody<UpdatePositionRequest>,
) -> ApiResult<Json<ActionResponse<MoveOutcome>>> {
    let (issue, _, _) = issue_access(&state, issue_id, auth.user_id, TeamRole::Member).await?;

    let outcome = board::reorder_issue(&state.db, &issue, req.index, auth.user_id).await?;
    Ok(ActionResponse::ok(outcome))
}
