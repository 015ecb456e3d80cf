/// Label endpoints
///
/// Labels belong to a team and can be attached to any issue of that team's
/// projects. Attach and detach answer with the issue's labels after the
/// change.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use planboard_shared::{
    auth::middleware::AuthContext,
    models::{
        activity::{ActivityAction, FieldChange, IssueActivity},
        label::{CreateLabel, IssueLabel, Label},
        team_member::TeamRole,
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{
    access::{issue_access, team_access},
    check_length, validate_hex_color, Deleted,
};
use crate::{
    app::AppState,
    error::{validate_request, ActionResponse, ApiError, ApiResult},
    extract::JsonBody,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLabelRequest {
    #[validate(length(min = 1, max = 30, message = "Label name must be 1-30 characters"))]
    pub name: String,

    #[validate(custom(function = "validate_hex_color"))]
    pub color: String,
}

fn label_not_found() -> ApiError {
    ApiError::NotFound("Label not found".to_string())
}

pub async fn create_label(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(team_id): Path<Uuid>,
    JsonBody(req): JsonBody<CreateLabelRequest>,
) -> ApiResult<(StatusCode, Json<ActionResponse<Label>>)> {
    team_access(&state, team_id, auth.user_id, TeamRole::Member).await?;
    validate_request(&req)?;
    check_length("name", Some(&req.name), 1, 30)?;

    let label = Label::create(
        &state.db,
        CreateLabel {
            team_id,
            name: req.name.trim().to_string(),
            color: req.color,
        },
    )
    .await?;

    Ok(ActionResponse::created(label))
}

pub async fn list_labels(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<Vec<Label>>>> {
    team_access(&state, team_id, auth.user_id, TeamRole::Member).await?;

    let labels = Label::list_by_team(&state.db, team_id).await?;
    Ok(ActionResponse::ok(labels))
}

/// Also detaches the label from every issue
pub async fn delete_label(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(label_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<Deleted>>> {
    let label = Label::find_by_id(&state.db, label_id)
        .await?
        .ok_or_else(label_not_found)?;
    team_access(&state, label.team_id, auth.user_id, TeamRole::Admin).await?;

    if !Label::delete(&state.db, label_id).await? {
        return Err(label_not_found());
    }

    Ok(ActionResponse::ok(Deleted::new(label_id)))
}

/// Loads the label and checks it belongs to the issue's team
async fn label_for_issue(
    state: &AppState,
    issue_id: Uuid,
    label_id: Uuid,
    user_id: Uuid,
) -> ApiResult<Label> {
    let (_, project, _) = issue_access(state, issue_id, user_id, TeamRole::Member).await?;

    // A label from another team is reported as missing
    Label::find_by_id(&state.db, label_id)
        .await?
        .filter(|l| l.team_id == project.team_id)
        .ok_or_else(label_not_found)
}

async fn record_label_change(
    state: &AppState,
    issue_id: Uuid,
    actor_id: Uuid,
    action: ActivityAction,
    change: FieldChange,
) -> ApiResult<()> {
    let mut conn = state.db.acquire().await?;
    IssueActivity::record(&mut conn, issue_id, actor_id, action, &[change]).await?;
    Ok(())
}

pub async fn attach_label(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((issue_id, label_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<ActionResponse<Vec<IssueLabel>>>> {
    let label = label_for_issue(&state, issue_id, label_id, auth.user_id).await?;

    if Label::attach(&state.db, issue_id, label.id).await? {
        record_label_change(
            &state,
            issue_id,
            auth.user_id,
            ActivityAction::LabelAdded,
            FieldChange::new("label", None, Some(label.name.clone())),
        )
        .await?;
    }

    let labels = Label::for_issues(&state.db, &[issue_id]).await?;
    Ok(ActionResponse::ok(labels))
}

pub async fn detach_label(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((issue_id, label_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<ActionResponse<Vec<IssueLabel>>>> {
    let label = label_for_issue(&state, issue_id, label_id, auth.user_id).await?;

    if Label::detach(&state.db, issue_id, label.id).await? {
        record_label_change(
            &state,
            issue_id,
            auth.user_id,
            ActivityAction::LabelRemoved,
            FieldChange::new("label", Some(label.name.clone()), None),
        )
        .await?;
    }

    let labels = Label::for_issues(&state.db, &[issue_id]).await?;
    Ok(ActionResponse::ok(labels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_validation() {
        let ok = CreateLabelRequest {
            name: "bug".to_string(),
            color: "#D73A4A".to_string(),
        };
        assert!(validate_request(&ok).is_ok());

        let long = CreateLabelRequest {
            name: "x".repeat(31),
            color: "#D73A4A".to_string(),
        };
        assert!(validate_request(&long).is_err());
    }
}
