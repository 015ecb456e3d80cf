/// Team-wide labels and their attachment to issues

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Label {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

/// Label attached to an issue, keyed by issue for batch loads
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IssueLabel {
    pub issue_id: Uuid,
    pub label_id: Uuid,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLabel {
    pub team_id: Uuid,
    pub name: String,
    pub color: String,
}

impl Label {
    /// # Errors
    ///
    /// Unique violation (`labels_team_name_key`) if the team already has a
    /// label with this name.
    pub async fn create(pool: &PgPool, data: CreateLabel) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Label>(
            r#"
            INSERT INTO labels (team_id, name, color)
            VALUES ($1, $2, $3)
            RETURNING id, team_id, name, color, created_at
            "#,
        )
        .bind(data.team_id)
        .bind(data.name)
        .bind(data.color)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Label>(
            "SELECT id, team_id, name, color, created_at FROM labels WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_by_team(pool: &PgPool, team_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Label>(
            "SELECT id, team_id, name, color, created_at FROM labels WHERE team_id = $1 ORDER BY name ASC",
        )
        .bind(team_id)
        .fetch_all(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM labels WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Attaches a label to an issue; attaching twice is a no-op
    pub async fn attach(pool: &PgPool, issue_id: Uuid, label_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO issue_labels (issue_id, label_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(issue_id)
        .bind(label_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn detach(pool: &PgPool, issue_id: Uuid, label_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM issue_labels WHERE issue_id = $1 AND label_id = $2")
            .bind(issue_id)
            .bind(label_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Labels of many issues at once
    pub async fn for_issues(pool: &PgPool, issue_ids: &[Uuid]) -> Result<Vec<IssueLabel>, sqlx::Error> {
        if issue_ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, IssueLabel>(
            r#"
            SELECT il.issue_id, l.id AS label_id, l.name, l.color
            FROM issue_labels il
            JOIN labels l ON l.id = il.label_id
            WHERE il.issue_id = ANY($1)
            ORDER BY l.name ASC
            "#,
        )
        .bind(issue_ids)
        .fetch_all(pool)
        .await
    }
}
