/// Issue activity log
///
/// Each mutation of an issue writes one `issue_activity` row (`created`,
/// `updated`, `status_changed`, `commented`, ...) and one `issue_changes`
/// row per field it touched.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// What happened to an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityAction {
    Created,
    Updated,
    StatusChanged,
    Reordered,
    Commented,
    LabelAdded,
    LabelRemoved,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Created => "created",
            ActivityAction::Updated => "updated",
            ActivityAction::StatusChanged => "status_changed",
            ActivityAction::Reordered => "reordered",
            ActivityAction::Commented => "commented",
            ActivityAction::LabelAdded => "label_added",
            ActivityAction::LabelRemoved => "label_removed",
        }
    }
}

/// One changed field, as text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl FieldChange {
    pub fn new(field: &str, old_value: Option<String>, new_value: Option<String>) -> Self {
        Self {
            field: field.to_string(),
            old_value,
            new_value,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IssueActivity {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ChangeRow {
    activity_id: Uuid,
    field: String,
    old_value: Option<String>,
    new_value: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ActivityRow {
    id: Uuid,
    issue_id: Uuid,
    actor_id: Option<Uuid>,
    actor_name: Option<String>,
    action: String,
    created_at: DateTime<Utc>,
}

/// Activity entry with its actor and field changes, as listed to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub actor_name: Option<String>,
    pub action: String,
    pub changes: Vec<FieldChange>,
    pub created_at: DateTime<Utc>,
}

impl IssueActivity {
    /// Writes an activity row and its field changes on one connection
    ///
    /// Pass a transaction (`&mut *tx`) to make the entry part of the
    /// surrounding mutation.
    pub async fn record(
        conn: &mut PgConnection,
        issue_id: Uuid,
        actor_id: Uuid,
        action: ActivityAction,
        changes: &[FieldChange],
    ) -> Result<Self, sqlx::Error> {
        let activity = sqlx::query_as::<_, IssueActivity>(
            r#"
            INSERT INTO issue_activity (issue_id, actor_id, action)
            VALUES ($1, $2, $3)
            RETURNING id, issue_id, actor_id, action, created_at
            "#,
        )
        .bind(issue_id)
        .bind(actor_id)
        .bind(action.as_str())
        .fetch_one(&mut *conn)
        .await?;

        for change in changes {
            sqlx::query(
                r#"
                INSERT INTO issue_changes (activity_id, field, old_value, new_value)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(activity.id)
            .bind(&change.field)
            .bind(&change.old_value)
            .bind(&change.new_value)
            .execute(&mut *conn)
            .await?;
        }

        tracing::debug!(
            issue_id = %issue_id,
            action = action.as_str(),
            changes = changes.len(),
            "Issue activity recorded"
        );

        Ok(activity)
    }

    /// Activity of an issue, newest first, with changes attached
    pub async fn list_by_issue(
        pool: &PgPool,
        issue_id: Uuid,
    ) -> Result<Vec<ActivityEntry>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT a.id, a.issue_id, a.actor_id, u.name AS actor_name, a.action, a.created_at
            FROM issue_activity a
            LEFT JOIN users u ON u.id = a.actor_id
            WHERE a.issue_id = $1
            ORDER BY a.created_at DESC, a.id DESC
            "#,
        )
        .bind(issue_id)
        .fetch_all(pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let change_rows = sqlx::query_as::<_, ChangeRow>(
            r#"
            SELECT activity_id, field, old_value, new_value
            FROM issue_changes
            WHERE activity_id = ANY($1)
            ORDER BY field ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(pool)
        .await?;

        let mut by_activity: HashMap<Uuid, Vec<FieldChange>> = HashMap::new();
        for row in change_rows {
            by_activity
                .entry(row.activity_id)
                .or_default()
                .push(FieldChange {
                    field: row.field,
                    old_value: row.old_value,
                    new_value: row.new_value,
                });
        }

        Ok(rows
            .into_iter()
            .map(|row| ActivityEntry {
                changes: by_activity.remove(&row.id).unwrap_or_default(),
                id: row.id,
                issue_id: row.issue_id,
                actor_id: row.actor_id,
                actor_name: row.actor_name,
                action: row.action,
                created_at: row.created_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names() {
        assert_eq!(ActivityAction::Created.as_str(), "created");
        assert_eq!(ActivityAction::StatusChanged.as_str(), "status_changed");
        assert_eq!(ActivityAction::LabelRemoved.as_str(), "label_removed");
    }

    #[test]
    fn test_field_change_new() {
        let change = FieldChange::new("title", Some("a".into()), Some("b".into()));
        assert_eq!(change.field, "title");
        assert_eq!(change.old_value.as_deref(), Some("a"));
    }
}
