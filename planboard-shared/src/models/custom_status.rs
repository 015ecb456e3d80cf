/// Custom board columns
///
/// A custom status is an extra Kanban column on one project. Its `category`
/// is one of the built-in issue statuses, and issues moved into the column
/// take that status. An optional `wip_limit` caps how many live issues the
/// column may hold.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::issue::IssueStatus;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CustomStatus {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub color: String,
    pub category: IssueStatus,
    pub position: i32,
    pub wip_limit: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomStatus {
    pub project_id: Uuid,
    pub name: String,
    pub color: String,
    pub category: IssueStatus,
    pub wip_limit: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCustomStatus {
    pub name: Option<String>,
    pub color: Option<String>,

    /// `Some(None)` removes the limit
    pub wip_limit: Option<Option<i32>>,
}

const STATUS_COLUMNS: &str =
    "id, project_id, name, color, category, position, wip_limit, created_at";

impl CustomStatus {
    /// Whether adding one more issue to a column of `current` issues would
    /// exceed the limit
    pub fn would_exceed(&self, current: i64) -> bool {
        match self.wip_limit {
            Some(limit) => current >= i64::from(limit),
            None => false,
        }
    }

    /// Appends a status after the project's existing ones
    pub async fn create(pool: &PgPool, data: CreateCustomStatus) -> Result<Self, sqlx::Error> {
        let status = sqlx::query_as::<_, CustomStatus>(&format!(
            r#"
            INSERT INTO custom_statuses (project_id, name, color, category, wip_limit, position)
            VALUES ($1, $2, $3, $4, $5,
                    (SELECT COUNT(*)::INT FROM custom_statuses WHERE project_id = $1))
            RETURNING {STATUS_COLUMNS}
            "#
        ))
        .bind(data.project_id)
        .bind(data.name)
        .bind(data.color)
        .bind(data.category)
        .bind(data.wip_limit)
        .fetch_one(pool)
        .await?;

        tracing::info!(status_id = %status.id, project_id = %status.project_id, "Custom status created");
        Ok(status)
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, CustomStatus>(&format!(
            "SELECT {STATUS_COLUMNS} FROM custom_statuses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn list_by_project(
        pool: &PgPool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, CustomStatus>(&format!(
            "SELECT {STATUS_COLUMNS} FROM custom_statuses WHERE project_id = $1 ORDER BY position ASC, created_at ASC"
        ))
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    /// Updates name, color and limit. Column order goes through
    /// [`crate::board::update_custom_status`].
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: UpdateCustomStatus,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let (set_limit, wip_limit) = match data.wip_limit {
            Some(value) => (true, value),
            None => (false, None),
        };

        sqlx::query_as::<_, CustomStatus>(&format!(
            r#"
            UPDATE custom_statuses
            SET name = COALESCE($2, name),
                color = COALESCE($3, color),
                wip_limit = CASE WHEN $4 THEN $5 ELSE wip_limit END
            WHERE id = $1
            RETURNING {STATUS_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(data.name)
        .bind(data.color)
        .bind(set_limit)
        .bind(wip_limit)
        .fetch_optional(executor)
        .await
    }

    /// A project's column ids in display order, optionally without one
    pub async fn ordered_ids<'e, E>(
        executor: E,
        project_id: Uuid,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Uuid>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(
            r#"
            SELECT id FROM custom_statuses
            WHERE project_id = $1 AND ($2::UUID IS NULL OR id <> $2)
            ORDER BY position ASC, created_at ASC, id ASC
            "#,
        )
        .bind(project_id)
        .bind(exclude)
        .fetch_all(executor)
        .await
    }

    pub async fn write_positions<'e, E>(
        executor: E,
        positions: &[(Uuid, i32)],
    ) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let (ids, values): (Vec<Uuid>, Vec<i32>) = positions.iter().copied().unzip();

        sqlx::query(
            r#"
            UPDATE custom_statuses SET position = v.position
            FROM UNNEST($1::UUID[], $2::INT[]) AS v(id, position)
            WHERE custom_statuses.id = v.id AND custom_statuses.position <> v.position
            "#,
        )
        .bind(&ids)
        .bind(&values)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Deletes a column. Its issues fall back to their category column
    /// through `ON DELETE SET NULL`.
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM custom_statuses WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(wip_limit: Option<i32>) -> CustomStatus {
        CustomStatus {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: "QA".to_string(),
            color: "#22AA88".to_string(),
            category: IssueStatus::InReview,
            position: 0,
            wip_limit,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_wip_limit() {
        let limited = status(Some(3));
        assert!(!limited.would_exceed(2));
        assert!(limited.would_exceed(3));
        assert!(limited.would_exceed(4));
    }

    #[test]
    fn test_no_wip_limit() {
        assert!(!status(None).would_exceed(10_000));
    }
}
