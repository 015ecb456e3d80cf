/// Dashboard endpoints
///
/// - `GET /v1/teams/:team_id/stats`
/// - `GET /v1/projects/:project_id/stats`
///
/// Computed on every request; "today" is the server's UTC date.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use planboard_shared::{
    auth::middleware::AuthContext,
    models::team_member::TeamRole,
    stats::{self, Dashboard, StatsScope},
};
use uuid::Uuid;

use super::access::{project_access, team_access};
use crate::{
    app::AppState,
    error::{ActionResponse, ApiResult},
};

async fn build(state: &AppState, scope: StatsScope, user_id: Uuid) -> ApiResult<Dashboard> {
    let today = Utc::now().date_naive();
    Ok(stats::dashboard(&state.db, scope, user_id, today).await?)
}

pub async fn team_stats(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<Dashboard>>> {
    let (team, _) = team_access(&state, team_id, auth.user_id, TeamRole::Member).await?;

    let dashboard = build(&state, StatsScope::Team(team.id), auth.user_id).await?;
    Ok(ActionResponse::ok(dashboard))
}

pub async fn project_stats(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<Dashboard>>> {
    let (project, _) = project_access(&state, project_id, auth.user_id, TeamRole::Member).await?;

    let dashboard = build(&state, StatsScope::Project(project.id), auth.user_id).await?;
    Ok(ActionResponse::ok(dashboard))
}
