/// Kanban board: columns, positions and moves
///
/// A column is either one of the six built-in statuses (issues with no
/// custom status) or a project's custom status. Within a column, issue
/// positions are always `0..n` in display order.
///
/// # Moving an issue
///
/// ```text
/// 1. load destination column ordered by position, without the moved issue
/// 2. splice the moved issue in at the clamped target index
/// 3. renumber the destination column 0..n
/// 4. if the column changed: renumber the source column 0..n
/// ```
///
/// Everything runs in one transaction. There is no version check, so two
/// concurrent moves of the same column resolve last-writer-wins.

use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::activity::{ActivityAction, FieldChange, IssueActivity};
use crate::models::custom_status::{CustomStatus, UpdateCustomStatus};
use crate::models::issue::{Issue, IssueStatus};

/// Identifies one board column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ColumnKey {
    Status(IssueStatus),
    Custom(Uuid),
}

impl ColumnKey {
    /// The column an issue currently sits in
    pub fn of(issue: &Issue) -> Self {
        match issue.custom_status_id {
            Some(id) => ColumnKey::Custom(id),
            None => ColumnKey::Status(issue.status),
        }
    }

    /// Builds a key from request fields; a custom status wins over a status
    pub fn from_parts(status: Option<IssueStatus>, custom_status_id: Option<Uuid>) -> Option<Self> {
        match (custom_status_id, status) {
            (Some(id), _) => Some(ColumnKey::Custom(id)),
            (None, Some(status)) => Some(ColumnKey::Status(status)),
            (None, None) => None,
        }
    }

    pub fn custom_status_id(&self) -> Option<Uuid> {
        match self {
            ColumnKey::Custom(id) => Some(*id),
            ColumnKey::Status(_) => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("Issue not found")]
    IssueNotFound,

    #[error("Status does not belong to this project")]
    StatusNotInProject,

    #[error("Column \"{column}\" is at its WIP limit of {limit}")]
    WipLimitExceeded { column: String, limit: i32 },

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Splices `moved` into `column` at `index` (clamped to the column length)
/// and returns the new order
///
/// `column` must not contain `moved`.
pub fn reorder(column: &[Uuid], moved: Uuid, index: usize) -> Vec<Uuid> {
    let at = index.min(column.len());
    let mut ordered = Vec::with_capacity(column.len() + 1);
    ordered.extend_from_slice(&column[..at]);
    ordered.push(moved);
    ordered.extend_from_slice(&column[at..]);
    ordered
}

/// Sequential positions for an ordered column
pub fn compact(ordered: &[Uuid]) -> Vec<(Uuid, i32)> {
    ordered
        .iter()
        .enumerate()
        .map(|(position, id)| (*id, position as i32))
        .collect()
}

/// Result of a move, for the response and notifications
#[derive(Debug, Clone, Serialize)]
pub struct MoveOutcome {
    pub issue_id: Uuid,
    pub column: ColumnKey,
    pub column_name: String,
    pub status: IssueStatus,
    pub position: i32,
    pub previous_status: IssueStatus,
    pub column_changed: bool,
}

async fn column_issue_ids(
    conn: &mut PgConnection,
    project_id: Uuid,
    column: ColumnKey,
    exclude: Option<Uuid>,
) -> Result<Vec<Uuid>, sqlx::Error> {
    let (status, custom_status_id) = match column {
        ColumnKey::Status(status) => (Some(status), None),
        ColumnKey::Custom(id) => (None, Some(id)),
    };

    sqlx::query_scalar(
        r#"
        SELECT id FROM issues
        WHERE project_id = $1 AND deleted_at IS NULL
          AND CASE WHEN $3::UUID IS NULL
                   THEN custom_status_id IS NULL AND status = $2
                   ELSE custom_status_id = $3 END
          AND ($4::UUID IS NULL OR id <> $4)
        ORDER BY position ASC, created_at ASC, id ASC
        "#,
    )
    .bind(project_id)
    .bind(status)
    .bind(custom_status_id)
    .bind(exclude)
    .fetch_all(&mut *conn)
    .await
}

async fn write_positions(
    conn: &mut PgConnection,
    positions: &[(Uuid, i32)],
) -> Result<(), sqlx::Error> {
    if positions.is_empty() {
        return Ok(());
    }

    let (ids, values): (Vec<Uuid>, Vec<i32>) = positions.iter().copied().unzip();

    sqlx::query(
        r#"
        UPDATE issues SET position = v.position
        FROM UNNEST($1::UUID[], $2::INT[]) AS v(id, position)
        WHERE issues.id = v.id AND issues.position <> v.position
        "#,
    )
    .bind(&ids)
    .bind(&values)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Renumbers a column 0..n in its current order
pub async fn compact_column(
    conn: &mut PgConnection,
    project_id: Uuid,
    column: ColumnKey,
) -> Result<(), sqlx::Error> {
    let ids = column_issue_ids(conn, project_id, column, None).await?;
    write_positions(conn, &compact(&ids)).await
}

/// Resolves the status a destination column imposes, checking that a custom
/// column belongs to the project
async fn resolve_column(
    conn: &mut PgConnection,
    project_id: Uuid,
    column: ColumnKey,
) -> Result<(IssueStatus, Option<CustomStatus>), BoardError> {
    match column {
        ColumnKey::Status(status) => Ok((status, None)),
        ColumnKey::Custom(id) => {
            let custom = CustomStatus::find_by_id(&mut *conn, id)
                .await?
                .filter(|s| s.project_id == project_id)
                .ok_or(BoardError::StatusNotInProject)?;
            Ok((custom.category, Some(custom)))
        }
    }
}

/// Fails if adding one issue to a custom column would break its WIP limit
pub async fn ensure_wip_capacity(
    conn: &mut PgConnection,
    project_id: Uuid,
    custom: &CustomStatus,
) -> Result<(), BoardError> {
    let Some(limit) = custom.wip_limit else {
        return Ok(());
    };

    let current = column_issue_ids(conn, project_id, ColumnKey::Custom(custom.id), None)
        .await?
        .len() as i64;

    if custom.would_exceed(current) {
        tracing::debug!(status_id = %custom.id, current, limit, "WIP limit reached");
        return Err(BoardError::WipLimitExceeded {
            column: custom.name.clone(),
            limit,
        });
    }

    Ok(())
}

/// Moves an issue to `target` at `index`, possibly within its own column
///
/// Records a `status_changed` activity when the column changes and a
/// `reordered` one otherwise.
pub async fn move_issue(
    pool: &PgPool,
    issue_id: Uuid,
    target: ColumnKey,
    index: usize,
    actor_id: Uuid,
) -> Result<MoveOutcome, BoardError> {
    let mut tx = pool.begin().await?;

    let issue = Issue::find_by_id(&mut *tx, issue_id)
        .await?
        .ok_or(BoardError::IssueNotFound)?;

    let source = ColumnKey::of(&issue);
    let column_changed = source != target;
    let (status, custom) = resolve_column(&mut tx, issue.project_id, target).await?;
    let column_name = custom
        .as_ref()
        .map_or_else(|| status_title(status).to_string(), |c| c.name.clone());

    if column_changed {
        if let Some(custom) = &custom {
            ensure_wip_capacity(&mut tx, issue.project_id, custom).await?;
        }
        Issue::set_column(&mut *tx, issue.id, status, target.custom_status_id()).await?;
    }

    let others = column_issue_ids(&mut tx, issue.project_id, target, Some(issue.id)).await?;
    let ordered = reorder(&others, issue.id, index);
    let position = ordered.iter().position(|id| *id == issue.id).unwrap_or(0) as i32;
    write_positions(&mut tx, &compact(&ordered)).await?;

    if column_changed {
        compact_column(&mut tx, issue.project_id, source).await?;

        let mut changes = Vec::new();
        if status != issue.status {
            changes.push(FieldChange::new(
                "status",
                Some(issue.status.as_str().to_string()),
                Some(status.as_str().to_string()),
            ));
        }
        if issue.custom_status_id != target.custom_status_id() {
            changes.push(FieldChange::new(
                "custom_status_id",
                issue.custom_status_id.map(|id| id.to_string()),
                target.custom_status_id().map(|id| id.to_string()),
            ));
        }
        IssueActivity::record(&mut tx, issue.id, actor_id, ActivityAction::StatusChanged, &changes)
            .await?;
    } else if position != issue.position {
        let change = FieldChange::new(
            "position",
            Some(issue.position.to_string()),
            Some(position.to_string()),
        );
        IssueActivity::record(&mut tx, issue.id, actor_id, ActivityAction::Reordered, &[change])
            .await?;
    }

    tx.commit().await?;

    tracing::info!(
        issue_id = %issue.id,
        from = ?source,
        to = ?target,
        position,
        "Issue moved"
    );

    Ok(MoveOutcome {
        issue_id: issue.id,
        column: target,
        column_name,
        status,
        position,
        previous_status: issue.status,
        column_changed,
    })
}

/// Moves an issue within the column it is already in
pub async fn reorder_issue(
    pool: &PgPool,
    issue: &Issue,
    index: usize,
    actor_id: Uuid,
) -> Result<MoveOutcome, BoardError> {
    move_issue(pool, issue.id, ColumnKey::of(issue), index, actor_id).await
}

/// Soft-deletes an issue and closes the gap it leaves in its column
pub async fn remove_issue(pool: &PgPool, issue: &Issue) -> Result<bool, BoardError> {
    let mut tx = pool.begin().await?;

    let deleted = Issue::soft_delete(&mut *tx, issue.id).await?;
    if deleted {
        compact_column(&mut tx, issue.project_id, ColumnKey::of(issue)).await?;
    }

    tx.commit().await?;
    Ok(deleted)
}

/// Deletes a custom column; its issues drop back into their category column
/// and are appended after the issues already there
pub async fn remove_custom_status(pool: &PgPool, status: &CustomStatus) -> Result<bool, BoardError> {
    let mut tx = pool.begin().await?;

    // Push the orphans past the end of the category column before they land
    // in it, so compaction keeps them after the existing issues.
    sqlx::query(
        "UPDATE issues SET position = position + 1000000 WHERE custom_status_id = $1 AND deleted_at IS NULL",
    )
    .bind(status.id)
    .execute(&mut *tx)
    .await?;

    let deleted = CustomStatus::delete(&mut *tx, status.id).await?;
    if deleted {
        compact_column(&mut tx, status.project_id, ColumnKey::Status(status.category)).await?;

        let remaining = CustomStatus::ordered_ids(&mut *tx, status.project_id, None).await?;
        CustomStatus::write_positions(&mut *tx, &compact(&remaining)).await?;
    }

    tx.commit().await?;
    Ok(deleted)
}

/// Updates a custom column and, when `index` is given, moves it there among
/// the project's custom columns, renumbering them 0..n
pub async fn update_custom_status(
    pool: &PgPool,
    status: &CustomStatus,
    data: UpdateCustomStatus,
    index: Option<usize>,
) -> Result<Option<CustomStatus>, BoardError> {
    let mut tx = pool.begin().await?;

    if CustomStatus::update(&mut *tx, status.id, data).await?.is_none() {
        return Ok(None);
    }

    if let Some(index) = index {
        let others = CustomStatus::ordered_ids(&mut *tx, status.project_id, Some(status.id)).await?;
        let ordered = reorder(&others, status.id, index);
        CustomStatus::write_positions(&mut *tx, &compact(&ordered)).await?;
    }

    let updated = CustomStatus::find_by_id(&mut *tx, status.id).await?;
    tx.commit().await?;
    Ok(updated)
}

/// One rendered column of the board
#[derive(Debug, Clone, Serialize)]
pub struct BoardColumn {
    pub key: ColumnKey,
    pub name: String,
    pub color: Option<String>,
    pub category: IssueStatus,
    pub wip_limit: Option<i32>,
    pub issue_count: usize,
    pub at_limit: bool,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Board {
    pub project_id: Uuid,
    pub columns: Vec<BoardColumn>,
}

fn status_title(status: IssueStatus) -> &'static str {
    match status {
        IssueStatus::Backlog => "Backlog",
        IssueStatus::Todo => "Todo",
        IssueStatus::InProgress => "In Progress",
        IssueStatus::InReview => "In Review",
        IssueStatus::Done => "Done",
        IssueStatus::Cancelled => "Cancelled",
    }
}

/// Groups issues into the built-in columns followed by the custom ones
///
/// Issues pointing at a custom status missing from `statuses` are shown in
/// their status column.
pub fn build_columns(statuses: &[CustomStatus], issues: Vec<Issue>) -> Vec<BoardColumn> {
    let mut columns: Vec<BoardColumn> = IssueStatus::ALL
        .iter()
        .map(|status| BoardColumn {
            key: ColumnKey::Status(*status),
            name: status_title(*status).to_string(),
            color: None,
            category: *status,
            wip_limit: None,
            issue_count: 0,
            at_limit: false,
            issues: Vec::new(),
        })
        .chain(statuses.iter().map(|custom| BoardColumn {
            key: ColumnKey::Custom(custom.id),
            name: custom.name.clone(),
            color: Some(custom.color.clone()),
            category: custom.category,
            wip_limit: custom.wip_limit,
            issue_count: 0,
            at_limit: false,
            issues: Vec::new(),
        }))
        .collect();

    for issue in issues {
        let key = ColumnKey::of(&issue);
        let fallback = ColumnKey::Status(issue.status);
        let slot = columns
            .iter()
            .position(|c| c.key == key)
            .or_else(|| columns.iter().position(|c| c.key == fallback));
        if let Some(index) = slot {
            columns[index].issues.push(issue);
        }
    }

    for column in &mut columns {
        column
            .issues
            .sort_by(|a, b| a.position.cmp(&b.position).then(a.created_at.cmp(&b.created_at)));
        column.issue_count = column.issues.len();
        column.at_limit = column
            .wip_limit
            .is_some_and(|limit| column.issue_count as i64 >= i64::from(limit));
    }

    columns
}

/// Loads a project's board
pub async fn load_board(pool: &PgPool, project_id: Uuid) -> Result<Board, sqlx::Error> {
    let statuses = CustomStatus::list_by_project(pool, project_id).await?;
    let issues = sqlx::query_as::<_, Issue>(
        r#"
        SELECT id, project_id, number, title, description, status, custom_status_id,
               priority, position, assignee_id, reporter_id, due_date,
               created_at, updated_at, deleted_at
        FROM issues
        WHERE project_id = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(Board {
        project_id,
        columns: build_columns(&statuses, issues),
    })
}
