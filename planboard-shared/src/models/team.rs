/// Team model and database operations
///
/// Teams are the tenant boundary: projects, labels and invites hang off a
/// team, and every action checks the caller's membership first.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE teams (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(50) NOT NULL,
///     description VARCHAR(500),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted_at TIMESTAMPTZ
/// );
/// ```
///
/// Deletion is soft: `deleted_at` is stamped and every query below filters
/// it out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::team_member::TeamRole;

/// Team row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A team as seen by one of its members
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamWithRole {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub role: TeamRole,
    pub member_count: i64,
}

/// Input for creating a team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTeam {
    pub name: String,
    pub description: Option<String>,
}

/// Partial update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTeam {
    pub name: Option<String>,

    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,
}

impl Team {
    /// Inserts a team. Callers add the owner membership in the same transaction.
    pub async fn create<'e, E>(executor: E, data: CreateTeam) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Team>(
            r#"
            INSERT INTO teams (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at, updated_at, deleted_at
            "#,
        )
        .bind(data.name)
        .bind(data.description)
        .fetch_one(executor)
        .await
    }

    /// Finds a live (not soft-deleted) team
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Team>(
            r#"
            SELECT id, name, description, created_at, updated_at, deleted_at
            FROM teams
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Lists the live teams a user belongs to, with their role in each
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<TeamWithRole>, sqlx::Error> {
        sqlx::query_as::<_, TeamWithRole>(
            r#"
            SELECT t.id, t.name, t.description, t.created_at, m.role,
                   (SELECT COUNT(*) FROM team_members tm WHERE tm.team_id = t.id) AS member_count
            FROM teams t
            JOIN team_members m ON m.team_id = t.id
            WHERE m.user_id = $1 AND t.deleted_at IS NULL
            ORDER BY t.created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Applies a partial update, returning the new row
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateTeam,
    ) -> Result<Option<Self>, sqlx::Error> {
        let (set_description, description) = match data.description {
            Some(value) => (true, value),
            None => (false, None),
        };

        sqlx::query_as::<_, Team>(
            r#"
            UPDATE teams
            SET name = COALESCE($2, name),
                description = CASE WHEN $3 THEN $4 ELSE description END,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, name, description, created_at, updated_at, deleted_at
            "#,
        )
        .bind(id)
        .bind(data.name)
        .bind(set_description)
        .bind(description)
        .fetch_optional(pool)
        .await
    }

    /// Soft-deletes a team
    pub async fn soft_delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE teams SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!(team_id = %id, "Team soft-deleted");
        }

        Ok(result.rows_affected() > 0)
    }

    /// Removes a team and everything under it (test cleanup only)
    pub async fn purge(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM teams WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_team_default_touches_nothing() {
        let update = UpdateTeam::default();
        assert!(update.name.is_none());
        assert!(update.description.is_none());
    }

    #[test]
    fn test_deleted_at_hidden_when_live() {
        let team = Team {
            id: Uuid::new_v4(),
            name: "Platform".to_string(),
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };

        let json = serde_json::to_value(&team).unwrap();
        assert!(json.get("deleted_at").is_none());
        assert_eq!(json["name"], "Platform");
    }
}
