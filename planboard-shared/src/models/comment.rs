/// Issue comments
///
/// Comments are soft-deleted; only the author may edit one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub author_id: Option<Uuid>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Comment with its author's display fields
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommentWithAuthor {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub author_id: Option<Uuid>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COMMENT_COLUMNS: &str = "id, issue_id, author_id, body, created_at, updated_at, deleted_at";

impl Comment {
    pub async fn create<'e, E>(
        executor: E,
        issue_id: Uuid,
        author_id: Uuid,
        body: &str,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Comment>(&format!(
            "INSERT INTO comments (issue_id, author_id, body) VALUES ($1, $2, $3) RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(issue_id)
        .bind(author_id)
        .bind(body)
        .fetch_one(executor)
        .await
    }

    /// Finds a live comment on a live issue
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.issue_id, c.author_id, c.body, c.created_at, c.updated_at, c.deleted_at
            FROM comments c
            JOIN issues i ON i.id = c.issue_id
            WHERE c.id = $1 AND c.deleted_at IS NULL AND i.deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Live comments of an issue, oldest first
    pub async fn list_by_issue(
        pool: &PgPool,
        issue_id: Uuid,
    ) -> Result<Vec<CommentWithAuthor>, sqlx::Error> {
        sqlx::query_as::<_, CommentWithAuthor>(
            r#"
            SELECT c.id, c.issue_id, c.author_id, u.name AS author_name, u.email AS author_email,
                   c.body, c.created_at, c.updated_at
            FROM comments c
            LEFT JOIN users u ON u.id = c.author_id
            WHERE c.issue_id = $1 AND c.deleted_at IS NULL
            ORDER BY c.created_at ASC
            "#,
        )
        .bind(issue_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update_body(
        pool: &PgPool,
        id: Uuid,
        body: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            r#"
            UPDATE comments SET body = $2, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(body)
        .fetch_optional(pool)
        .await
    }

    pub async fn soft_delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE comments SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
