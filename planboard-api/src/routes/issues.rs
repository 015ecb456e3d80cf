/// Issue endpoints
///
/// # Endpoints
///
/// - `POST   /v1/projects/:project_id/issues`
/// - `GET    /v1/projects/:project_id/issues?status=&priority=&assignee_id=&label_id=&search=`
/// - `GET    /v1/issues/:issue_id` - with labels and subtask progress
/// - `PATCH  /v1/issues/:issue_id` - title, description, priority, assignee, due date
/// - `DELETE /v1/issues/:issue_id` - reporter or admin
///
/// Status and position changes go through the board endpoints.

use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use planboard_shared::{
    auth::{authorization::require_author, middleware::AuthContext},
    board::{self, BoardError},
    models::{
        activity::{ActivityAction, IssueActivity},
        custom_status::CustomStatus,
        issue::{CreateIssue, Issue, IssueFilter, IssuePriority, IssueStatus, UpdateIssue},
        label::{IssueLabel, Label},
        notification::{NewNotification, NotificationKind},
        project::Project,
        subtask::{Subtask, SubtaskProgress},
        team_member::{TeamMember, TeamRole},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{
    access::{issue_access, notify, project_access},
    check_length, check_optional_length, nullable, Deleted,
};
use crate::{
    app::AppState,
    error::{validate_request, ActionResponse, ApiError, ApiResult},
    extract::{JsonBody, QueryParams},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateIssueRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(max = 10000, message = "Description must be at most 10000 characters"))]
    pub description: Option<String>,

    #[serde(default)]
    pub status: IssueStatus,

    /// Places the issue in a custom column; its category overrides `status`
    pub custom_status_id: Option<Uuid>,

    #[serde(default)]
    pub priority: IssuePriority,

    pub assignee_id: Option<Uuid>,

    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateIssueRequest {
    pub title: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,

    pub priority: Option<IssuePriority>,

    #[serde(default, deserialize_with = "nullable")]
    pub assignee_id: Option<Option<Uuid>>,

    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<NaiveDate>>,
}

impl UpdateIssueRequest {
    fn check(&self) -> ApiResult<()> {
        check_length("title", self.title.as_deref(), 1, 200)?;
        check_optional_length("description", &self.description, 10000)
    }

    fn into_update(self) -> UpdateIssue {
        UpdateIssue {
            title: self.title.map(|t| t.trim().to_string()),
            description: self.description,
            priority: self.priority,
            assignee_id: self.assignee_id,
            due_date: self.due_date,
        }
    }
}

/// Issue as returned by list and write endpoints
#[derive(Debug, Serialize)]
pub struct IssueView {
    #[serde(flatten)]
    pub issue: Issue,

    /// e.g. `WEB-42`
    pub identifier: String,

    pub labels: Vec<IssueLabel>,
}

#[derive(Debug, Serialize)]
pub struct IssueDetail {
    #[serde(flatten)]
    pub view: IssueView,

    pub subtasks: SubtaskProgress,
}

impl IssueView {
    fn new(project: &Project, issue: Issue, labels: Vec<IssueLabel>) -> Self {
        Self {
            identifier: project.issue_identifier(issue.number),
            issue,
            labels,
        }
    }
}

/// Attaches each issue's labels, loaded in one query
async fn with_labels(
    state: &AppState,
    project: &Project,
    issues: Vec<Issue>,
) -> ApiResult<Vec<IssueView>> {
    let ids: Vec<Uuid> = issues.iter().map(|i| i.id).collect();

    let mut by_issue: HashMap<Uuid, Vec<IssueLabel>> = HashMap::new();
    for label in Label::for_issues(&state.db, &ids).await? {
        by_issue.entry(label.issue_id).or_default().push(label);
    }

    Ok(issues
        .into_iter()
        .map(|issue| {
            let labels = by_issue.remove(&issue.id).unwrap_or_default();
            IssueView::new(project, issue, labels)
        })
        .collect())
}

async fn ensure_assignable(state: &AppState, team_id: Uuid, assignee_id: Uuid) -> ApiResult<()> {
    if TeamMember::is_member(&state.db, team_id, assignee_id).await? {
        Ok(())
    } else {
        Err(ApiError::validation(
            "assignee_id",
            "Assignee must be a member of the team",
        ))
    }
}

async fn notify_assignee(state: &AppState, project: &Project, issue: &Issue, actor_id: Uuid) {
    let Some(assignee_id) = issue.assignee_id.filter(|id| *id != actor_id) else {
        return;
    };

    notify(
        &state.db,
        NewNotification {
            user_id: assignee_id,
            kind: NotificationKind::IssueAssigned,
            title: format!(
                "{} was assigned to you",
                project.issue_identifier(issue.number)
            ),
            body: Some(issue.title.clone()),
            link_issue_id: Some(issue.id),
            link_team_id: Some(project.team_id),
        },
    )
    .await;
}

/// Creates an issue at the bottom of its column
///
/// Numbering, the WIP check, the insert and the `created` activity share
/// one transaction.
pub async fn create_issue(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
    JsonBody(req): JsonBody<CreateIssueRequest>,
) -> ApiResult<(StatusCode, Json<ActionResponse<IssueView>>)> {
    let (project, _) = project_access(&state, project_id, auth.user_id, TeamRole::Member).await?;
    validate_request(&req)?;
    check_length("title", Some(&req.title), 1, 200)?;

    if let Some(assignee_id) = req.assignee_id {
        ensure_assignable(&state, project.team_id, assignee_id).await?;
    }

    let mut tx = state.db.begin().await?;

    let status = match req.custom_status_id {
        Some(custom_status_id) => {
            let custom = CustomStatus::find_by_id(&mut *tx, custom_status_id)
                .await?
                .filter(|s| s.project_id == project.id)
                .ok_or(BoardError::StatusNotInProject)?;
            board::ensure_wip_capacity(&mut tx, project.id, &custom).await?;
            custom.category
        }
        None => req.status,
    };

    let issue = Issue::create(
        &mut *tx,
        CreateIssue {
            project_id: project.id,
            title: req.title.trim().to_string(),
            description: req.description,
            status,
            custom_status_id: req.custom_status_id,
            priority: req.priority,
            assignee_id: req.assignee_id,
            reporter_id: auth.user_id,
            due_date: req.due_date,
        },
    )
    .await?;

    IssueActivity::record(&mut tx, issue.id, auth.user_id, ActivityAction::Created, &[]).await?;

    tx.commit().await?;

    tracing::info!(
        issue_id = %issue.id,
        identifier = %project.issue_identifier(issue.number),
        user_id = %auth.user_id,
        "Issue created"
    );

    notify_assignee(&state, &project, &issue, auth.user_id).await;

    Ok(ActionResponse::created(IssueView::new(&project, issue, Vec::new())))
}

pub async fn list_issues(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
    QueryParams(filter): QueryParams<IssueFilter>,
) -> ApiResult<Json<ActionResponse<Vec<IssueView>>>> {
    let (project, _) = project_access(&state, project_id, auth.user_id, TeamRole::Member).await?;

    let issues = Issue::list(&state.db, project.id, &filter).await?;
    let views = with_labels(&state, &project, issues).await?;
    Ok(ActionResponse::ok(views))
}

pub async fn get_issue(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(issue_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<IssueDetail>>> {
    let (issue, project, _) = issue_access(&state, issue_id, auth.user_id, TeamRole::Member).await?;

    let labels = Label::for_issues(&state.db, &[issue.id]).await?;
    let subtasks = Subtask::progress(&state.db, issue.id).await?;

    Ok(ActionResponse::ok(IssueDetail {
        view: IssueView::new(&project, issue, labels),
        subtasks,
    }))
}

/// Applies a partial update; each changed field is recorded under a single
/// `updated` activity
pub async fn update_issue(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(issue_id): Path<Uuid>,
    JsonBody(req): JsonBody<UpdateIssueRequest>,
) -> ApiResult<Json<ActionResponse<IssueView>>> {
    let (current, project, _) =
        issue_access(&state, issue_id, auth.user_id, TeamRole::Member).await?;
    req.check()?;

    if let Some(Some(assignee_id)) = req.assignee_id {
        ensure_assignable(&state, project.team_id, assignee_id).await?;
    }

    let update = req.into_update();
    let changes = current.diff(&update);

    let mut tx = state.db.begin().await?;

    let issue = Issue::update(&mut *tx, issue_id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Issue not found".to_string()))?;

    if !changes.is_empty() {
        IssueActivity::record(&mut tx, issue.id, auth.user_id, ActivityAction::Updated, &changes)
            .await?;
    }

    tx.commit().await?;

    if issue.assignee_id != current.assignee_id {
        notify_assignee(&state, &project, &issue, auth.user_id).await;
    }

    let labels = Label::for_issues(&state.db, &[issue.id]).await?;
    Ok(ActionResponse::ok(IssueView::new(&project, issue, labels)))
}

pub async fn delete_issue(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(issue_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<Deleted>>> {
    let (issue, _, role) = issue_access(&state, issue_id, auth.user_id, TeamRole::Member).await?;
    require_author(auth.user_id, issue.reporter_id, role, true)?;

    if !board::remove_issue(&state.db, &issue).await? {
        return Err(ApiError::NotFound("Issue not found".to_string()));
    }

    Ok(ActionResponse::ok(Deleted::new(issue_id)))
}
