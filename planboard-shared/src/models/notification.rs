/// In-app notifications
///
/// Notifications are written alongside the mutation that causes them and
/// read by their recipient only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Hard cap on a single list request
pub const MAX_LIST_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    TeamInvite,
    IssueAssigned,
    IssueCommented,
    StatusChanged,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::TeamInvite => "team_invite",
            NotificationKind::IssueAssigned => "issue_assigned",
            NotificationKind::IssueCommented => "issue_commented",
            NotificationKind::StatusChanged => "status_changed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub body: Option<String>,
    pub link_issue_id: Option<Uuid>,
    pub link_team_id: Option<Uuid>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: Option<String>,
    pub link_issue_id: Option<Uuid>,
    pub link_team_id: Option<Uuid>,
}

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, title, body, link_issue_id, link_team_id, read_at, created_at";

/// Clamps a requested page size into `1..=MAX_LIST_LIMIT`, defaulting to 50
pub fn clamp_limit(requested: Option<i64>) -> i64 {
    requested.unwrap_or(50).clamp(1, MAX_LIST_LIMIT)
}

impl Notification {
    pub async fn create<'e, E>(executor: E, data: NewNotification) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications (user_id, kind, title, body, link_issue_id, link_team_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(data.user_id)
        .bind(data.kind.as_str())
        .bind(data.title)
        .bind(data.body)
        .bind(data.link_issue_id)
        .bind(data.link_team_id)
        .fetch_one(executor)
        .await?;

        tracing::debug!(
            notification_id = %notification.id,
            user_id = %notification.user_id,
            kind = %notification.kind,
            "Notification created"
        );
        Ok(notification)
    }

    /// Newest first
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR read_at IS NULL)
            ORDER BY created_at DESC
            LIMIT $3
            "#
        ))
        .bind(user_id)
        .bind(unread_only)
        .bind(limit.clamp(1, MAX_LIST_LIMIT))
        .fetch_all(pool)
        .await
    }

    pub async fn unread_count(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// Marks one of the user's notifications read; false if it is not theirs
    pub async fn mark_read(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE notifications SET read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns how many notifications were newly marked read
    pub async fn mark_all_read(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = NOW() WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
