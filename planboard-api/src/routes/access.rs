/// Resource lookup plus membership checks shared by the handlers
///
/// Each helper loads a live resource (404 when missing or soft-deleted),
/// resolves its team and checks the caller's role (403 otherwise).

use planboard_shared::{
    auth::authorization::{check_role, require_membership},
    models::{
        issue::Issue,
        notification::{NewNotification, Notification},
        project::Project,
        team::Team,
        team_member::TeamRole,
    },
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};

/// A live team and the caller's role in it
pub async fn team_access(
    state: &AppState,
    team_id: Uuid,
    user_id: Uuid,
    required: TeamRole,
) -> ApiResult<(Team, TeamRole)> {
    let team = Team::find_by_id(&state.db, team_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))?;

    let role = require_membership(&state.db, team.id, user_id).await?;
    check_role(role, required)?;
    Ok((team, role))
}

pub async fn project_access(
    state: &AppState,
    project_id: Uuid,
    user_id: Uuid,
    required: TeamRole,
) -> ApiResult<(Project, TeamRole)> {
    let project = Project::find_by_id(&state.db, project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;

    let role = require_membership(&state.db, project.team_id, user_id).await?;
    check_role(role, required)?;
    Ok((project, role))
}

/// A live issue, its project, and the caller's role in the owning team
pub async fn issue_access(
    state: &AppState,
    issue_id: Uuid,
    user_id: Uuid,
    required: TeamRole,
) -> ApiResult<(Issue, Project, TeamRole)> {
    let issue = Issue::find_by_id(&state.db, issue_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Issue not found".to_string()))?;

    let (project, role) = project_access(state, issue.project_id, user_id, required).await?;
    Ok((issue, project, role))
}

/// Writes a notification outside the triggering transaction
///
/// Failures are logged and swallowed; the action that caused the
/// notification has already committed.
pub async fn notify(pool: &PgPool, notification: NewNotification) {
    let user_id = notification.user_id;
    let kind = notification.kind.as_str();
    if let Err(e) = Notification::create(pool, notification).await {
        tracing::warn!(user_id = %user_id, kind, error = %e, "Failed to create notification");
    }
}
