/// Team invitation endpoints
///
/// - `POST   /v1/teams/:team_id/invites` (admin) - invite an email, returns the token once
/// - `GET    /v1/teams/:team_id/invites` (admin)
/// - `DELETE /v1/teams/:team_id/invites/:invite_id` (admin) - revoke a pending invite
/// - `GET    /v1/invites` - pending invites addressed to me
/// - `POST   /v1/invites/accept` / `POST /v1/invites/decline` - `{ "token": "inv_..." }`
///
/// No mail is sent. When the invited email already has an account, the
/// invitee gets an in-app notification.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use planboard_shared::{
    auth::{
        invite_token::{generate_invite_token, hash_invite_token, validate_invite_token_format},
        middleware::AuthContext,
    },
    models::{
        notification::{NewNotification, NotificationKind},
        team::Team,
        team_invite::{CreateTeamInvite, InviteForUser, InviteStatus, TeamInvite},
        team_member::{TeamMember, TeamRole},
        user::{normalize_email, User},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::access::{notify, team_access};
use crate::{
    app::AppState,
    error::{validate_request, ActionResponse, ApiError, ApiResult},
    extract::JsonBody,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInviteRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[serde(default = "default_invite_role")]
    pub role: TeamRole,
}

fn default_invite_role() -> TeamRole {
    TeamRole::Member
}

#[derive(Debug, Deserialize)]
pub struct InviteTokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedInvite {
    pub invite: TeamInvite,

    /// Shown only in this response
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct InviteResolution {
    pub invite_id: Uuid,
    pub team_id: Uuid,
    pub status: InviteStatus,
}

fn invite_not_found() -> ApiError {
    ApiError::NotFound("Invite not found".to_string())
}

/// Loads the invite behind `token` and checks it can be answered by the caller
///
/// An invite found past its expiry is marked `expired` on the way out.
async fn usable_invite(state: &AppState, token: &str, user: &User) -> ApiResult<TeamInvite> {
    let token = token.trim();
    if !validate_invite_token_format(token) {
        return Err(invite_not_found());
    }

    let invite = TeamInvite::find_by_token_hash(&state.db, &hash_invite_token(token))
        .await?
        .ok_or_else(invite_not_found)?;

    if Team::find_by_id(&state.db, invite.team_id).await?.is_none() {
        return Err(invite_not_found());
    }

    if invite.email != normalize_email(&user.email) {
        tracing::warn!(invite_id = %invite.id, user_id = %user.id, "Invite used by another account");
        return Err(ApiError::Forbidden(
            "This invite was sent to a different email address".to_string(),
        ));
    }

    if invite.is_usable(Utc::now()) {
        return Ok(invite);
    }

    if invite.status != InviteStatus::Pending {
        return Err(ApiError::Conflict(format!(
            "Invite is already {}",
            invite.status.as_str()
        )));
    }

    TeamInvite::resolve(&state.db, invite.id, InviteStatus::Expired).await?;
    Err(ApiError::Conflict("Invite has expired".to_string()))
}

async fn current_user(state: &AppState, auth: &AuthContext) -> ApiResult<User> {
    User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))
}

pub async fn create_invite(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(team_id): Path<Uuid>,
    JsonBody(req): JsonBody<CreateInviteRequest>,
) -> ApiResult<(StatusCode, Json<ActionResponse<CreatedInvite>>)> {
    let (team, _) = team_access(&state, team_id, auth.user_id, TeamRole::Admin).await?;
    validate_request(&req)?;

    if req.role == TeamRole::Owner {
        return Err(ApiError::validation(
            "role",
            "Invites can grant admin or member only",
        ));
    }

    let email = normalize_email(&req.email);

    if TeamMember::email_is_member(&state.db, team.id, &email).await? {
        return Err(ApiError::Conflict(
            "This person is already a member of the team".to_string(),
        ));
    }
    if TeamInvite::has_pending(&state.db, team.id, &email).await? {
        return Err(ApiError::Conflict(
            "A pending invite already exists for this email".to_string(),
        ));
    }

    let (token, token_hash) = generate_invite_token();
    let invite = TeamInvite::create(
        &state.db,
        CreateTeamInvite {
            team_id: team.id,
            email: email.clone(),
            role: req.role,
            token_hash,
            invited_by: auth.user_id,
        },
    )
    .await?;

    if let Some(invitee) = User::find_by_email(&state.db, &email).await? {
        notify(
            &state.db,
            NewNotification {
                user_id: invitee.id,
                kind: NotificationKind::TeamInvite,
                title: format!("You were invited to join {}", team.name),
                body: Some(format!("Role: {}", invite.role.as_str())),
                link_issue_id: None,
                link_team_id: Some(team.id),
            },
        )
        .await;
    }

    Ok(ActionResponse::created(CreatedInvite { invite, token }))
}

pub async fn list_team_invites(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<Vec<TeamInvite>>>> {
    team_access(&state, team_id, auth.user_id, TeamRole::Admin).await?;

    let invites = TeamInvite::list_by_team(&state.db, team_id).await?;
    Ok(ActionResponse::ok(invites))
}

pub async fn revoke_invite(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((team_id, invite_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<ActionResponse<InviteResolution>>> {
    team_access(&state, team_id, auth.user_id, TeamRole::Admin).await?;

    let invite = TeamInvite::find_by_id(&state.db, invite_id)
        .await?
        .filter(|i| i.team_id == team_id)
        .ok_or_else(invite_not_found)?;

    if !TeamInvite::resolve(&state.db, invite.id, InviteStatus::Revoked).await? {
        return Err(ApiError::Conflict(format!(
            "Invite is already {}",
            invite.status.as_str()
        )));
    }

    tracing::info!(invite_id = %invite.id, team_id = %team_id, "Invite revoked");

    Ok(ActionResponse::ok(InviteResolution {
        invite_id: invite.id,
        team_id,
        status: InviteStatus::Revoked,
    }))
}

pub async fn list_my_invites(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<ActionResponse<Vec<InviteForUser>>>> {
    let user = current_user(&state, &auth).await?;
    let invites = TeamInvite::list_pending_for_email(&state.db, &user.email).await?;
    Ok(ActionResponse::ok(invites))
}

/// Joins the team; membership and the status change commit together
pub async fn accept_invite(
    State(state): State<AppState>,
    auth: AuthContext,
    JsonBody(req): JsonBody<InviteTokenRequest>,
) -> ApiResult<Json<ActionResponse<InviteResolution>>> {
    let user = current_user(&state, &auth).await?;
    let invite = usable_invite(&state, &req.token, &user).await?;

    if TeamMember::is_member(&state.db, invite.team_id, user.id).await? {
        return Err(ApiError::Conflict(
            "You are already a member of this team".to_string(),
        ));
    }

    let mut tx = state.db.begin().await?;

    if !TeamInvite::resolve(&mut *tx, invite.id, InviteStatus::Accepted).await? {
        // answered concurrently
        return Err(ApiError::Conflict("Invite is no longer pending".to_string()));
    }
    TeamMember::create(&mut *tx, invite.team_id, user.id, invite.role).await?;

    tx.commit().await?;

    tracing::info!(
        invite_id = %invite.id,
        team_id = %invite.team_id,
        user_id = %user.id,
        "Invite accepted"
    );

    Ok(ActionResponse::ok(InviteResolution {
        invite_id: invite.id,
        team_id: invite.team_id,
        status: InviteStatus::Accepted,
    }))
}

pub async fn decline_invite(
    State(state): State<AppState>,
    auth: AuthContext,
    JsonBody(req): JsonBody<InviteTokenRequest>,
) -> ApiResult<Json<ActionResponse<InviteResolution>>> {
    let user = current_user(&state, &auth).await?;
    let invite = usable_invite(&state, &req.token, &user).await?;

    if !TeamInvite::resolve(&state.db, invite.id, InviteStatus::Declined).await? {
        return Err(ApiError::Conflict("Invite is no longer pending".to_string()));
    }

    tracing::info!(invite_id = %invite.id, user_id = %user.id, "Invite declined");

    Ok(ActionResponse::ok(InviteResolution {
        invite_id: invite.id,
        team_id: invite.team_id,
        status: InviteStatus::Declined,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_role_defaults_to_member() {
        let req: CreateInviteRequest =
            serde_json::from_str(r#"{"email": "bo@example.com"}"#).unwrap();
        assert_eq!(req.role, TeamRole::Member);

        let req: CreateInviteRequest =
            serde_json::from_str(r#"{"email": "bo@example.com", "role": "admin"}"#).unwrap();
        assert_eq!(req.role, TeamRole::Admin);
    }

    #[test]
    fn test_invite_email_validated() {
        let req = CreateInviteRequest {
            email: "not-an-email".to_string(),
            role: TeamRole::Member,
        };
        assert!(validate_request(&req).is_err());
    }
}
