/// Team membership model with roles
///
/// # Schema
///
/// ```sql
/// CREATE TYPE team_role AS ENUM ('owner', 'admin', 'member');
///
/// CREATE TABLE team_members (
///     team_id UUID NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role team_role NOT NULL DEFAULT 'member',
///     joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (team_id, user_id)
/// );
/// ```
///
/// # Roles
///
/// - **owner**: everything, including deleting the team and granting ownership
/// - **admin**: manage members, invites, statuses, labels; delete projects
/// - **member**: create and edit projects, issues, comments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Role of a user within a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "team_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Owner,
    Admin,
    Member,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Owner => "owner",
            TeamRole::Admin => "admin",
            TeamRole::Member => "member",
        }
    }

    /// Invite, remove and re-role members
    pub fn can_manage_members(&self) -> bool {
        matches!(self, TeamRole::Owner | TeamRole::Admin)
    }

    /// Whether this role is at least `required`
    ///
    /// Hierarchy: Owner > Admin > Member
    pub fn has_permission(&self, required: &TeamRole) -> bool {
        self.permission_level() >= required.permission_level()
    }

    fn permission_level(&self) -> u8 {
        match self {
            TeamRole::Owner => 3,
            TeamRole::Admin => 2,
            TeamRole::Member => 1,
        }
    }
}

/// Membership row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamMember {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
}

/// Membership joined with the member's public profile
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MemberWithUser {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
}

impl TeamMember {
    /// Adds a user to a team
    ///
    /// # Errors
    ///
    /// Primary-key violation if the user is already a member.
    pub async fn create<'e, E>(
        executor: E,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, TeamMember>(
            r#"
            INSERT INTO team_members (team_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING team_id, user_id, role, joined_at
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(executor)
        .await
    }

    /// Returns the user's role in a live team, if they are a member
    pub async fn get_role(
        pool: &PgPool,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamRole>, sqlx::Error> {
        sqlx::query_scalar::<_, TeamRole>(
            r#"
            SELECT m.role
            FROM team_members m
            JOIN teams t ON t.id = m.team_id
            WHERE m.team_id = $1 AND m.user_id = $2 AND t.deleted_at IS NULL
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn is_member(
        pool: &PgPool,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        Ok(Self::get_role(pool, team_id, user_id).await?.is_some())
    }

    /// Whether any member of the team has this email
    pub async fn email_is_member(
        pool: &PgPool,
        team_id: Uuid,
        email: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM team_members m
                JOIN users u ON u.id = m.user_id
                WHERE m.team_id = $1 AND u.email = $2
            )
            "#,
        )
        .bind(team_id)
        .bind(super::user::normalize_email(email))
        .fetch_one(pool)
        .await
    }

    pub async fn update_role(
        pool: &PgPool,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TeamMember>(
            r#"
            UPDATE team_members
            SET role = $3
            WHERE team_id = $1 AND user_id = $2
            RETURNING team_id, user_id, role, joined_at
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(pool)
        .await
    }

    /// Removes a member; true if a row was deleted
    pub async fn delete(pool: &PgPool, team_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM team_members WHERE team_id = $1 AND user_id = $2")
            .bind(team_id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists members with their profiles, owners first
    pub async fn list_by_team(
        pool: &PgPool,
        team_id: Uuid,
    ) -> Result<Vec<MemberWithUser>, sqlx::Error> {
        sqlx::query_as::<_, MemberWithUser>(
            r#"
            SELECT u.id AS user_id, u.email, u.name, u.avatar_url, m.role, m.joined_at
            FROM team_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.team_id = $1
            ORDER BY m.role ASC, m.joined_at ASC
            "#,
        )
        .bind(team_id)
        .fetch_all(pool)
        .await
    }

    pub async fn count_owners(pool: &PgPool, team_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM team_members WHERE team_id = $1 AND role = 'owner'",
        )
        .bind(team_id)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_role_as_str() {
        assert_eq!(TeamRole::Owner.as_str(), "owner");
        assert_eq!(TeamRole::Admin.as_str(), "admin");
        assert_eq!(TeamRole::Member.as_str(), "member");
    }

    #[test]
    fn test_role_hierarchy() {
        assert!(TeamRole::Owner.has_permission(&TeamRole::Admin));
        assert!(TeamRole::Owner.has_permission(&TeamRole::Member));
        assert!(TeamRole::Admin.has_permission(&TeamRole::Admin));
        assert!(TeamRole::Admin.has_permission(&TeamRole::Member));
        assert!(!TeamRole::Admin.has_permission(&TeamRole::Owner));
        assert!(!TeamRole::Member.has_permission(&TeamRole::Admin));
    }

    #[test]
    fn test_role_capabilities() {
        assert!(TeamRole::Owner.can_manage_members());
        assert!(TeamRole::Admin.can_manage_members());
        assert!(!TeamRole::Member.can_manage_members());
    }

    #[test]
    fn test_role_serde_lowercase() {
        let json = serde_json::to_string(&TeamRole::Admin).unwrap();
        assert_eq!(json, "\"admin\"");
        let role: TeamRole = serde_json::from_str("\"member\"").unwrap();
        assert_eq!(role, TeamRole::Member);
    }
}
