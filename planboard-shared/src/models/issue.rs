/// Issue model and database operations
///
/// An issue always has a built-in `status`. When `custom_status_id` is set
/// the issue sits in that custom column instead of its status column, and
/// `status` mirrors the column's category. `position` orders issues within a
/// column, see [`crate::board`].
///
/// # Schema
///
/// ```sql
/// CREATE TABLE issues (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     number INTEGER NOT NULL,
///     title VARCHAR(200) NOT NULL,
///     description TEXT,
///     status issue_status NOT NULL DEFAULT 'todo',
///     custom_status_id UUID REFERENCES custom_statuses(id) ON DELETE SET NULL,
///     priority issue_priority NOT NULL DEFAULT 'none',
///     position INTEGER NOT NULL DEFAULT 0,
///     assignee_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     reporter_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     due_date DATE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted_at TIMESTAMPTZ,
///     CONSTRAINT issues_project_number_key UNIQUE (project_id, number)
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::activity::FieldChange;

/// Built-in workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "issue_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Backlog,
    Todo,
    InProgress,
    InReview,
    Done,
    Cancelled,
}

impl IssueStatus {
    /// Board order of the built-in columns
    pub const ALL: [IssueStatus; 6] = [
        IssueStatus::Backlog,
        IssueStatus::Todo,
        IssueStatus::InProgress,
        IssueStatus::InReview,
        IssueStatus::Done,
        IssueStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Backlog => "backlog",
            IssueStatus::Todo => "todo",
            IssueStatus::InProgress => "in_progress",
            IssueStatus::InReview => "in_review",
            IssueStatus::Done => "done",
            IssueStatus::Cancelled => "cancelled",
        }
    }

    /// Open issues count towards workload, due-soon and overdue figures
    pub fn is_open(&self) -> bool {
        !matches!(self, IssueStatus::Done | IssueStatus::Cancelled)
    }
}

impl Default for IssueStatus {
    fn default() -> Self {
        IssueStatus::Todo
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "issue_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IssuePriority {
    None,
    Low,
    Medium,
    High,
    Urgent,
}

impl IssuePriority {
    pub const ALL: [IssuePriority; 5] = [
        IssuePriority::None,
        IssuePriority::Low,
        IssuePriority::Medium,
        IssuePriority::High,
        IssuePriority::Urgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssuePriority::None => "none",
            IssuePriority::Low => "low",
            IssuePriority::Medium => "medium",
            IssuePriority::High => "high",
            IssuePriority::Urgent => "urgent",
        }
    }
}

impl Default for IssuePriority {
    fn default() -> Self {
        IssuePriority::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Issue {
    pub id: Uuid,
    pub project_id: Uuid,
    pub number: i32,
    pub title: String,
    pub description: Option<String>,
    pub status: IssueStatus,
    pub custom_status_id: Option<Uuid>,
    pub priority: IssuePriority,
    pub position: i32,
    pub assignee_id: Option<Uuid>,
    pub reporter_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateIssue {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: IssueStatus,
    pub custom_status_id: Option<Uuid>,
    pub priority: IssuePriority,
    pub assignee_id: Option<Uuid>,
    pub reporter_id: Uuid,
    pub due_date: Option<NaiveDate>,
}

/// Partial update; `Some(None)` clears a nullable field
#[derive(Debug, Clone, Default)]
pub struct UpdateIssue {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<IssuePriority>,
    pub assignee_id: Option<Option<Uuid>>,
    pub due_date: Option<Option<NaiveDate>>,
}

/// List filters, all optional and combined with AND
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueFilter {
    pub status: Option<IssueStatus>,
    pub priority: Option<IssuePriority>,
    pub assignee_id: Option<Uuid>,
    pub label_id: Option<Uuid>,
    pub search: Option<String>,
}

const ISSUE_COLUMNS: &str = "id, project_id, number, title, description, status, custom_status_id, \
                             priority, position, assignee_id, reporter_id, due_date, \
                             created_at, updated_at, deleted_at";

fn changed<T: PartialEq + ToString>(
    field: &str,
    old: &Option<T>,
    new: &Option<T>,
) -> Option<FieldChange> {
    if old == new {
        return None;
    }
    Some(FieldChange::new(
        field,
        old.as_ref().map(ToString::to_string),
        new.as_ref().map(ToString::to_string),
    ))
}

impl Issue {
    /// Field-level differences an update would make, in a stable order
    ///
    /// Fields the update leaves untouched or sets to their current value are
    /// not reported.
    pub fn diff(&self, update: &UpdateIssue) -> Vec<FieldChange> {
        let mut changes = Vec::new();

        if let Some(title) = &update.title {
            if title != &self.title {
                changes.push(FieldChange::new(
                    "title",
                    Some(self.title.clone()),
                    Some(title.clone()),
                ));
            }
        }
        if let Some(description) = &update.description {
            changes.extend(changed("description", &self.description, description));
        }
        if let Some(priority) = update.priority {
            if priority != self.priority {
                changes.push(FieldChange::new(
                    "priority",
                    Some(self.priority.as_str().to_string()),
                    Some(priority.as_str().to_string()),
                ));
            }
        }
        if let Some(assignee_id) = &update.assignee_id {
            changes.extend(changed("assignee_id", &self.assignee_id, assignee_id));
        }
        if let Some(due_date) = &update.due_date {
            changes.extend(changed("due_date", &self.due_date, due_date));
        }

        changes
    }

    /// Inserts an issue at the bottom of its column
    ///
    /// `number` is the project's highest number (deleted issues included) plus
    /// one. Run inside the caller's transaction so the number and position
    /// reads see the same snapshot as the insert.
    pub async fn create<'e, E>(executor: E, data: CreateIssue) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Issue>(&format!(
            r#"
            INSERT INTO issues (project_id, number, title, description, status, custom_status_id,
                                priority, position, assignee_id, reporter_id, due_date)
            VALUES (
                $1,
                (SELECT COALESCE(MAX(number), 0) + 1 FROM issues WHERE project_id = $1),
                $2, $3, $4, $5, $6,
                (SELECT COUNT(*)::INT FROM issues
                 WHERE project_id = $1 AND deleted_at IS NULL
                   AND CASE WHEN $5::UUID IS NULL
                            THEN custom_status_id IS NULL AND status = $4
                            ELSE custom_status_id = $5 END),
                $7, $8, $9
            )
            RETURNING {ISSUE_COLUMNS}
            "#
        ))
        .bind(data.project_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.status)
        .bind(data.custom_status_id)
        .bind(data.priority)
        .bind(data.assignee_id)
        .bind(data.reporter_id)
        .bind(data.due_date)
        .fetch_one(executor)
        .await
    }

    /// Finds a live issue whose project and team are also live
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Issue>(
            r#"
            SELECT i.id, i.project_id, i.number, i.title, i.description, i.status,
                   i.custom_status_id, i.priority, i.position, i.assignee_id, i.reporter_id,
                   i.due_date, i.created_at, i.updated_at, i.deleted_at
            FROM issues i
            JOIN projects p ON p.id = i.project_id
            JOIN teams t ON t.id = p.team_id
            WHERE i.id = $1
              AND i.deleted_at IS NULL AND p.deleted_at IS NULL AND t.deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Lists a project's live issues, by status then position
    pub async fn list(
        pool: &PgPool,
        project_id: Uuid,
        filter: &IssueFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")));

        sqlx::query_as::<_, Issue>(&format!(
            r#"
            SELECT {ISSUE_COLUMNS}
            FROM issues
            WHERE project_id = $1 AND deleted_at IS NULL
              AND ($2::issue_status IS NULL OR status = $2)
              AND ($3::issue_priority IS NULL OR priority = $3)
              AND ($4::UUID IS NULL OR assignee_id = $4)
              AND ($5::UUID IS NULL OR EXISTS (
                    SELECT 1 FROM issue_labels il WHERE il.issue_id = issues.id AND il.label_id = $5))
              AND ($6::TEXT IS NULL OR title ILIKE $6 OR description ILIKE $6)
            ORDER BY status ASC, position ASC, number ASC
            "#
        ))
        .bind(project_id)
        .bind(filter.status)
        .bind(filter.priority)
        .bind(filter.assignee_id)
        .bind(filter.label_id)
        .bind(search)
        .fetch_all(pool)
        .await
    }

    /// Applies a partial update to a live issue
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: UpdateIssue,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let (set_description, description) = split_nullable(data.description);
        let (set_assignee, assignee_id) = split_nullable(data.assignee_id);
        let (set_due_date, due_date) = split_nullable(data.due_date);

        sqlx::query_as::<_, Issue>(&format!(
            r#"
            UPDATE issues
            SET title = COALESCE($2, title),
                description = CASE WHEN $3 THEN $4 ELSE description END,
                priority = COALESCE($5, priority),
                assignee_id = CASE WHEN $6 THEN $7 ELSE assignee_id END,
                due_date = CASE WHEN $8 THEN $9 ELSE due_date END,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {ISSUE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(data.title)
        .bind(set_description)
        .bind(description)
        .bind(data.priority)
        .bind(set_assignee)
        .bind(assignee_id)
        .bind(set_due_date)
        .bind(due_date)
        .fetch_optional(executor)
        .await
    }

    /// Moves an issue to another column without touching positions
    pub async fn set_column<'e, E>(
        executor: E,
        id: Uuid,
        status: IssueStatus,
        custom_status_id: Option<Uuid>,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE issues
            SET status = $2, custom_status_id = $3, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(custom_status_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn soft_delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE issues SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(executor)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!(issue_id = %id, "Issue soft-deleted");
        }

        Ok(result.rows_affected() > 0)
    }
}

fn split_nullable<T>(value: Option<Option<T>>) -> (bool, Option<T>) {
    match value {
        Some(inner) => (true, inner),
        None => (false, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue() -> Issue {
        Issue {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            number: 7,
            title: "Fix login".to_string(),
            description: None,
            status: IssueStatus::Todo,
            custom_status_id: None,
            priority: IssuePriority::Low,
            position: 0,
            assignee_id: None,
            reporter_id: None,
            due_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_status_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&IssueStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        let status: IssueStatus = serde_json::from_str("\"in_review\"").unwrap();
        assert_eq!(status, IssueStatus::InReview);
        assert_eq!(IssueStatus::InReview.as_str(), "in_review");
    }

    #[test]
    fn test_open_statuses() {
        assert!(IssueStatus::Backlog.is_open());
        assert!(IssueStatus::InReview.is_open());
        assert!(!IssueStatus::Done.is_open());
        assert!(!IssueStatus::Cancelled.is_open());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(IssueStatus::default(), IssueStatus::Todo);
        assert_eq!(IssuePriority::default(), IssuePriority::None);
    }

    #[test]
    fn test_diff_reports_only_real_changes() {
        let issue = issue();
        let assignee = Uuid::new_v4();
        let update = UpdateIssue {
            title: Some("Fix login".to_string()),
            description: Some(Some("Steps to reproduce".to_string())),
            priority: Some(IssuePriority::High),
            assignee_id: Some(Some(assignee)),
            due_date: None,
        };

        let changes = issue.diff(&update);
        let fields: Vec<&str> = changes.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["description", "priority", "assignee_id"]);

        assert_eq!(changes[1].old_value.as_deref(), Some("low"));
        assert_eq!(changes[1].new_value.as_deref(), Some("high"));
        assert_eq!(changes[2].old_value, None);
        assert_eq!(changes[2].new_value, Some(assignee.to_string()));
    }

    #[test]
    fn test_diff_clearing_due_date() {
        let mut issue = issue();
        issue.due_date = NaiveDate::from_ymd_opt(2025, 3, 1);

        let changes = issue.diff(&UpdateIssue {
            due_date: Some(None),
            ..Default::default()
        });

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "due_date");
        assert_eq!(changes[0].old_value.as_deref(), Some("2025-03-01"));
        assert_eq!(changes[0].new_value, None);
    }

    #[test]
    fn test_empty_update_has_no_changes() {
        assert!(issue().diff(&UpdateIssue::default()).is_empty());
    }
}
