/// Project model
///
/// A project belongs to a team and owns the issues, the custom board columns
/// and the per-project issue numbering (`KEY-123`).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE projects (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     team_id UUID NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
///     name VARCHAR(100) NOT NULL,
///     key VARCHAR(10) NOT NULL,
///     description VARCHAR(2000),
///     created_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted_at TIMESTAMPTZ
/// );
/// CREATE UNIQUE INDEX idx_projects_team_key ON projects(team_id, key) WHERE deleted_at IS NULL;
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub key: String,
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Project with open/total issue counts for list views
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectSummary {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub key: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub issue_count: i64,
    pub open_issue_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub team_id: Uuid,
    pub name: String,
    pub key: String,
    pub description: Option<String>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

const PROJECT_COLUMNS: &str =
    "id, team_id, name, key, description, created_by, created_at, updated_at, deleted_at";

impl Project {
    /// Formats the human identifier of an issue in this project
    pub fn issue_identifier(&self, number: i32) -> String {
        format!("{}-{}", self.key, number)
    }

    pub async fn create(pool: &PgPool, data: CreateProject) -> Result<Self, sqlx::Error> {
        let project = sqlx::query_as::<_, Project>(&format!(
            r#"
            INSERT INTO projects (team_id, name, key, description, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(data.team_id)
        .bind(data.name)
        .bind(data.key.to_uppercase())
        .bind(data.description)
        .bind(data.created_by)
        .fetch_one(pool)
        .await?;

        tracing::info!(project_id = %project.id, team_id = %project.team_id, "Project created");
        Ok(project)
    }

    /// Finds a live project whose team is also live
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT p.id, p.team_id, p.name, p.key, p.description, p.created_by,
                   p.created_at, p.updated_at, p.deleted_at
            FROM projects p
            JOIN teams t ON t.id = p.team_id
            WHERE p.id = $1 AND p.deleted_at IS NULL AND t.deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn key_exists(pool: &PgPool, team_id: Uuid, key: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM projects WHERE team_id = $1 AND key = $2 AND deleted_at IS NULL)",
        )
        .bind(team_id)
        .bind(key.to_uppercase())
        .fetch_one(pool)
        .await
    }

    pub async fn list_by_team(
        pool: &PgPool,
        team_id: Uuid,
    ) -> Result<Vec<ProjectSummary>, sqlx::Error> {
        sqlx::query_as::<_, ProjectSummary>(
            r#"
            SELECT p.id, p.team_id, p.name, p.key, p.description, p.created_at,
                   COUNT(i.id) AS issue_count,
                   COUNT(i.id) FILTER (WHERE i.status NOT IN ('done', 'cancelled')) AS open_issue_count
            FROM projects p
            LEFT JOIN issues i ON i.project_id = p.id AND i.deleted_at IS NULL
            WHERE p.team_id = $1 AND p.deleted_at IS NULL
            GROUP BY p.id
            ORDER BY p.created_at ASC
            "#,
        )
        .bind(team_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProject,
    ) -> Result<Option<Self>, sqlx::Error> {
        let (set_description, description) = match data.description {
            Some(value) => (true, value),
            None => (false, None),
        };

        sqlx::query_as::<_, Project>(&format!(
            r#"
            UPDATE projects
            SET name = COALESCE($2, name),
                description = CASE WHEN $3 THEN $4 ELSE description END,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(data.name)
        .bind(set_description)
        .bind(description)
        .fetch_optional(pool)
        .await
    }

    pub async fn soft_delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE projects SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
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
    fn test_issue_identifier() {
        let project = Project {
            id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            name: "Web".to_string(),
            key: "WEB".to_string(),
            description: None,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };

        assert_eq!(project.issue_identifier(42), "WEB-42");
    }
}
