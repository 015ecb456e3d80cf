/// Team and membership endpoints
///
/// | Method | Path                               | Role   |
/// |--------|------------------------------------|--------|
/// | POST   | /v1/teams                          | any    |
/// | GET    | /v1/teams                          | any    |
/// | GET    | /v1/teams/:team_id                 | member |
/// | PATCH  | /v1/teams/:team_id                 | admin  |
/// | DELETE | /v1/teams/:team_id                 | owner  |
/// | GET    | /v1/teams/:team_id/members         | member |
/// | PATCH  | /v1/teams/:team_id/members/:user_id| admin  |
/// | DELETE | /v1/teams/:team_id/members/:user_id| admin  |
/// | POST   | /v1/teams/:team_id/leave           | member |
///
/// A team always keeps at least one owner, and only owners may grant,
/// revoke or remove the owner role.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use planboard_shared::{
    auth::middleware::AuthContext,
    models::{
        team::{CreateTeam, Team, TeamWithRole, UpdateTeam},
        team_member::{MemberWithUser, TeamMember, TeamRole},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{access::team_access, check_length, check_optional_length, nullable, Deleted};
use crate::{
    app::AppState,
    error::{validate_request, ActionResponse, ApiError, ApiResult},
    extract::JsonBody,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTeamRequest {
    #[validate(length(min = 1, max = 50, message = "Team name must be 1-50 characters"))]
    pub name: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTeamRequest {
    pub name: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: TeamRole,
}

#[derive(Debug, Serialize)]
pub struct TeamDetail {
    #[serde(flatten)]
    pub team: Team,
    pub role: TeamRole,
}

/// Whether `actor` may move `target` from `current` to `new`
///
/// Admins manage members and admins; anything touching the owner role
/// needs an owner.
pub fn can_change_role(actor: TeamRole, current: TeamRole, new: TeamRole) -> bool {
    if !actor.can_manage_members() {
        return false;
    }
    if current == TeamRole::Owner || new == TeamRole::Owner {
        return actor == TeamRole::Owner;
    }
    true
}

/// Whether `actor` may remove a member holding `target`
pub fn can_remove(actor: TeamRole, target: TeamRole) -> bool {
    actor.can_manage_members() && (target != TeamRole::Owner || actor == TeamRole::Owner)
}

fn last_owner_error() -> ApiError {
    ApiError::Conflict("A team must keep at least one owner".to_string())
}

async fn member_role(state: &AppState, team_id: Uuid, user_id: Uuid) -> ApiResult<TeamRole> {
    TeamMember::get_role(&state.db, team_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))
}

/// Creates a team; the caller becomes its owner
pub async fn create_team(
    State(state): State<AppState>,
    auth: AuthContext,
    JsonBody(req): JsonBody<CreateTeamRequest>,
) -> ApiResult<(StatusCode, Json<ActionResponse<TeamDetail>>)> {
    validate_request(&req)?;
    check_length("name", Some(&req.name), 1, 50)?;

    let mut tx = state.db.begin().await?;

    let team = Team::create(
        &mut *tx,
        CreateTeam {
            name: req.name.trim().to_string(),
            description: req.description,
        },
    )
    .await?;
    TeamMember::create(&mut *tx, team.id, auth.user_id, TeamRole::Owner).await?;

    tx.commit().await?;

    tracing::info!(team_id = %team.id, user_id = %auth.user_id, "Team created");

    Ok(ActionResponse::created(TeamDetail {
        team,
        role: TeamRole::Owner,
    }))
}

/// Teams the caller belongs to, with their role
pub async fn list_teams(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<ActionResponse<Vec<TeamWithRole>>>> {
    let teams = Team::list_for_user(&state.db, auth.user_id).await?;
    Ok(ActionResponse::ok(teams))
}

pub async fn get_team(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<TeamDetail>>> {
    let (team, role) = team_access(&state, team_id, auth.user_id, TeamRole::Member).await?;
    Ok(ActionResponse::ok(TeamDetail { team, role }))
}

pub async fn update_team(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(team_id): Path<Uuid>,
    JsonBody(req): JsonBody<UpdateTeamRequest>,
) -> ApiResult<Json<ActionResponse<TeamDetail>>> {
    let (_, role) = team_access(&state, team_id, auth.user_id, TeamRole::Admin).await?;

    check_length("name", req.name.as_deref(), 1, 50)?;
    check_optional_length("description", &req.description, 500)?;

    let team = Team::update(
        &state.db,
        team_id,
        UpdateTeam {
            name: req.name.map(|n| n.trim().to_string()),
            description: req.description,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))?;

    Ok(ActionResponse::ok(TeamDetail { team, role }))
}

/// Soft-deletes a team; its projects and issues become unreachable
pub async fn delete_team(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<Deleted>>> {
    team_access(&state, team_id, auth.user_id, TeamRole::Owner).await?;

    if !Team::soft_delete(&state.db, team_id).await? {
        return Err(ApiError::NotFound("Team not found".to_string()));
    }

    Ok(ActionResponse::ok(Deleted::new(team_id)))
}

pub async fn list_members(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<Vec<MemberWithUser>>>> {
    team_access(&state, team_id, auth.user_id, TeamRole::Member).await?;

    let members = TeamMember::list_by_team(&state.db, team_id).await?;
    Ok(ActionResponse::ok(members))
}

pub async fn change_member_role(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((team_id, user_id)): Path<(Uuid, Uuid)>,
    JsonBody(req): JsonBody<ChangeRoleRequest>,
) -> ApiResult<Json<ActionResponse<TeamMember>>> {
    let (_, actor_role) = team_access(&state, team_id, auth.user_id, TeamRole::Admin).await?;
    let current = member_role(&state, team_id, user_id).await?;

    if !can_change_role(actor_role, current, req.role) {
        return Err(ApiError::Forbidden(
            "Only owners can grant or revoke the owner role".to_string(),
        ));
    }

    if current == TeamRole::Owner
        && req.role != TeamRole::Owner
        && TeamMember::count_owners(&state.db, team_id).await? <= 1
    {
        return Err(last_owner_error());
    }

    let member = TeamMember::update_role(&state.db, team_id, user_id, req.role)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    tracing::info!(
        team_id = %team_id,
        user_id = %user_id,
        from = current.as_str(),
        to = req.role.as_str(),
        "Member role changed"
    );

    Ok(ActionResponse::ok(member))
}

pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((team_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<ActionResponse<Deleted>>> {
    let (_, actor_role) = team_access(&state, team_id, auth.user_id, TeamRole::Admin).await?;
    let target = member_role(&state, team_id, user_id).await?;

    if !can_remove(actor_role, target) {
        return Err(ApiError::Forbidden(
            "Admins cannot remove an owner".to_string(),
        ));
    }

    if target == TeamRole::Owner && TeamMember::count_owners(&state.db, team_id).await? <= 1 {
        return Err(last_owner_error());
    }

    TeamMember::delete(&state.db, team_id, user_id).await?;
    tracing::info!(team_id = %team_id, user_id = %user_id, "Member removed");

    Ok(ActionResponse::ok(Deleted::new(user_id)))
}

pub async fn leave_team(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<Deleted>>> {
    let (_, role) = team_access(&state, team_id, auth.user_id, TeamRole::Member).await?;

    if role == TeamRole::Owner && TeamMember::count_owners(&state.db, team_id).await? <= 1 {
        return Err(ApiError::Conflict(
            "Transfer ownership before leaving the team".to_string(),
        ));
    }

    TeamMember::delete(&state.db, team_id, auth.user_id).await?;
    tracing::info!(team_id = %team_id, user_id = %auth.user_id, "Member left team");

    Ok(ActionResponse::ok(Deleted::new(auth.user_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use TeamRole::{Admin, Member, Owner};

    #[test]
    fn test_admin_manages_non_owners() {
        assert!(can_change_role(Admin, Member, Admin));
        assert!(can_change_role(Admin, Admin, Member));
        assert!(!can_change_role(Admin, Member, Owner));
        assert!(!can_change_role(Admin, Owner, Member));
        assert!(!can_change_role(Member, Member, Admin));
    }

    #[test]
    fn test_owner_manages_owner_role() {
        assert!(can_change_role(Owner, Member, Owner));
        assert!(can_change_role(Owner, Owner, Admin));
    }

    #[test]
    fn test_can_remove() {
        assert!(can_remove(Owner, Owner));
        assert!(can_remove(Owner, Member));
        assert!(can_remove(Admin, Member));
        assert!(can_remove(Admin, Admin));
        assert!(!can_remove(Admin, Owner));
        assert!(!can_remove(Member, Member));
    }

    #[test]
    fn test_update_request_nullable_description() {
        let req: UpdateTeamRequest = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert!(req.name.is_none());
        assert_eq!(req.description, Some(None));
    }
}
