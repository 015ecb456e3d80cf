/// Issue history: `GET /v1/issues/:issue_id/activity`, newest first

use axum::{
    extract::{Path, State},
    Json,
};
use planboard_shared::{
    auth::middleware::AuthContext,
    models::{
        activity::{ActivityEntry, IssueActivity},
        team_member::TeamRole,
    },
};
use uuid::Uuid;

use super::access::issue_access;
use crate::{
    app::AppState,
    error::{ActionResponse, ApiResult},
};

pub async fn list_activity(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(issue_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<Vec<ActivityEntry>>>> {
    let (issue, _, _) = issue_access(&state, issue_id, auth.user_id, TeamRole::Member).await?;

    let entries = IssueActivity::list_by_issue(&state.db, issue.id).await?;
    Ok(ActionResponse::ok(entries))
}
