/// Checklist items under an issue

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subtask {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub title: String,
    pub completed: bool,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Completed/total counts for an issue's checklist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SubtaskProgress {
    pub completed: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateSubtask {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

const SUBTASK_COLUMNS: &str = "id, issue_id, title, completed, position, created_at, updated_at";

impl Subtask {
    /// Appends a subtask to the end of the issue's checklist
    pub async fn create(pool: &PgPool, issue_id: Uuid, title: &str) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Subtask>(&format!(
            r#"
            INSERT INTO subtasks (issue_id, title, position)
            VALUES ($1, $2, (SELECT COALESCE(MAX(position) + 1, 0) FROM subtasks WHERE issue_id = $1))
            RETURNING {SUBTASK_COLUMNS}
            "#
        ))
        .bind(issue_id)
        .bind(title)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Subtask>(&format!(
            "SELECT {SUBTASK_COLUMNS} FROM subtasks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_by_issue(pool: &PgPool, issue_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Subtask>(&format!(
            "SELECT {SUBTASK_COLUMNS} FROM subtasks WHERE issue_id = $1 ORDER BY position ASC, created_at ASC"
        ))
        .bind(issue_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateSubtask,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Subtask>(&format!(
            r#"
            UPDATE subtasks
            SET title = COALESCE($2, title),
                completed = COALESCE($3, completed),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {SUBTASK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(data.title)
        .bind(data.completed)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM subtasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn progress(pool: &PgPool, issue_id: Uuid) -> Result<SubtaskProgress, sqlx::Error> {
        sqlx::query_as::<_, SubtaskProgress>(
            r#"
            SELECT COUNT(*) FILTER (WHERE completed) AS completed, COUNT(*) AS total
            FROM subtasks
            WHERE issue_id = $1
            "#,
        )
        .bind(issue_id)
        .fetch_one(pool)
        .await
    }
}
