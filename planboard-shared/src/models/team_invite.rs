/// Team invitation model
///
/// Invites are addressed to an email and carry a role (never owner). The
/// plaintext token is handed to the inviter once; only its SHA-256 hash is
/// stored, see [`crate::auth::invite_token`].
///
/// # Lifecycle
///
/// ```text
/// pending → accepted
///         → declined
///         → expired   (discovered lazily when someone tries to use it)
///         → revoked   (by a team admin)
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::team_member::TeamRole;
use super::user::normalize_email;

/// How long an invite stays usable
pub const INVITE_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invite_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
    Revoked,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteStatus::Pending => "pending",
            InviteStatus::Accepted => "accepted",
            InviteStatus::Declined => "declined",
            InviteStatus::Expired => "expired",
            InviteStatus::Revoked => "revoked",
        }
    }
}

/// Invite row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamInvite {
    pub id: Uuid,
    pub team_id: Uuid,
    pub email: String,
    pub role: TeamRole,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub invited_by: Option<Uuid>,
    pub status: InviteStatus,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Pending invite shown to the invitee, with the team name
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InviteForUser {
    pub id: Uuid,
    pub team_id: Uuid,
    pub team_name: String,
    pub role: TeamRole,
    pub invited_by_name: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTeamInvite {
    pub team_id: Uuid,
    pub email: String,
    pub role: TeamRole,
    pub token_hash: String,
    pub invited_by: Uuid,
}

const INVITE_COLUMNS: &str = "id, team_id, email, role, token_hash, invited_by, status, \
                              expires_at, responded_at, created_at";

impl TeamInvite {
    /// Whether the invite can still be accepted or declined at `now`
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status == InviteStatus::Pending && now < self.expires_at
    }

    pub async fn create(pool: &PgPool, data: CreateTeamInvite) -> Result<Self, sqlx::Error> {
        let expires_at = Utc::now() + Duration::days(INVITE_TTL_DAYS);

        let invite = sqlx::query_as::<_, TeamInvite>(&format!(
            r#"
            INSERT INTO team_invites (team_id, email, role, token_hash, invited_by, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {INVITE_COLUMNS}
            "#
        ))
        .bind(data.team_id)
        .bind(normalize_email(&data.email))
        .bind(data.role)
        .bind(data.token_hash)
        .bind(data.invited_by)
        .bind(expires_at)
        .fetch_one(pool)
        .await?;

        tracing::info!(invite_id = %invite.id, team_id = %invite.team_id, "Team invite created");
        Ok(invite)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TeamInvite>(&format!(
            "SELECT {INVITE_COLUMNS} FROM team_invites WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_token_hash(
        pool: &PgPool,
        token_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TeamInvite>(&format!(
            "SELECT {INVITE_COLUMNS} FROM team_invites WHERE token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(pool)
        .await
    }

    /// Whether a still-usable invite exists for this team + email
    pub async fn has_pending(
        pool: &PgPool,
        team_id: Uuid,
        email: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM team_invites
                WHERE team_id = $1 AND email = $2
                  AND status = 'pending' AND expires_at > NOW()
            )
            "#,
        )
        .bind(team_id)
        .bind(normalize_email(email))
        .fetch_one(pool)
        .await
    }

    /// All invites of a team, newest first
    pub async fn list_by_team(pool: &PgPool, team_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TeamInvite>(&format!(
            "SELECT {INVITE_COLUMNS} FROM team_invites WHERE team_id = $1 ORDER BY created_at DESC"
        ))
        .bind(team_id)
        .fetch_all(pool)
        .await
    }

    /// Usable invites addressed to an email, across live teams
    pub async fn list_pending_for_email(
        pool: &PgPool,
        email: &str,
    ) -> Result<Vec<InviteForUser>, sqlx::Error> {
        sqlx::query_as::<_, InviteForUser>(
            r#"
            SELECT i.id, i.team_id, t.name AS team_name, i.role,
                   u.name AS invited_by_name, i.expires_at, i.created_at
            FROM team_invites i
            JOIN teams t ON t.id = i.team_id
            LEFT JOIN users u ON u.id = i.invited_by
            WHERE i.email = $1 AND i.status = 'pending'
              AND i.expires_at > NOW() AND t.deleted_at IS NULL
            ORDER BY i.created_at DESC
            "#,
        )
        .bind(normalize_email(email))
        .fetch_all(pool)
        .await
    }

    /// Moves a pending invite to a final status
    ///
    /// Only rows still `pending` are touched, so a second acceptance of the
    /// same invite updates nothing and returns `false`.
    pub async fn resolve<'e, E>(
        executor: E,
        id: Uuid,
        status: InviteStatus,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE team_invites
            SET status = $2, responded_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(status)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invite(status: InviteStatus, expires_in: Duration) -> TeamInvite {
        TeamInvite {
            id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            email: "dev@example.com".to_string(),
            role: TeamRole::Member,
            token_hash: "0".repeat(64),
            invited_by: None,
            status,
            expires_at: Utc::now() + expires_in,
            responded_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_pending_unexpired_is_usable() {
        let invite = invite(InviteStatus::Pending, Duration::days(1));
        assert!(invite.is_usable(Utc::now()));
    }

    #[test]
    fn test_expired_is_not_usable() {
        let invite = invite(InviteStatus::Pending, Duration::seconds(-1));
        assert!(!invite.is_usable(Utc::now()));
    }

    #[test]
    fn test_resolved_is_not_usable() {
        for status in [
            InviteStatus::Accepted,
            InviteStatus::Declined,
            InviteStatus::Revoked,
            InviteStatus::Expired,
        ] {
            assert!(!invite(status, Duration::days(1)).is_usable(Utc::now()));
        }
    }

    #[test]
    fn test_token_hash_not_serialized() {
        let json = serde_json::to_value(invite(InviteStatus::Pending, Duration::days(1))).unwrap();
        assert!(json.get("token_hash").is_none());
        assert_eq!(json["status"], "pending");
    }
}
