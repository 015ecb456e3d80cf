/// Comment endpoints
///
/// Comments are listed oldest first. Only the author may edit; the author
/// or a team admin may delete.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use planboard_shared::{
    auth::{authorization::require_author, middleware::AuthContext},
    models::{
        activity::{ActivityAction, IssueActivity},
        comment::{Comment, CommentWithAuthor},
        issue::Issue,
        notification::{NewNotification, NotificationKind},
        team_member::TeamRole,
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{
    access::{issue_access, notify},
    check_length, Deleted,
};
use crate::{
    app::AppState,
    error::{validate_request, ActionResponse, ApiError, ApiResult},
    extract::JsonBody,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 5000, message = "Comment must be 1-5000 characters"))]
    pub body: String,
}

impl CommentRequest {
    fn check(&self) -> ApiResult<()> {
        validate_request(self)?;
        check_length("body", Some(&self.body), 1, 5000)
    }
}

/// Assignee and reporter, minus the comment author
pub fn comment_recipients(issue: &Issue, author_id: Uuid) -> Vec<Uuid> {
    let mut recipients = Vec::with_capacity(2);
    for user_id in [issue.assignee_id, issue.reporter_id].into_iter().flatten() {
        if user_id != author_id && !recipients.contains(&user_id) {
            recipients.push(user_id);
        }
    }
    recipients
}

/// The comment and the caller's role in its team
async fn comment_access(
    state: &AppState,
    comment_id: Uuid,
    user_id: Uuid,
) -> ApiResult<(Comment, TeamRole)> {
    let comment = Comment::find_by_id(&state.db, comment_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))?;

    let (_, _, role) = issue_access(state, comment.issue_id, user_id, TeamRole::Member).await?;
    Ok((comment, role))
}

pub async fn create_comment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(issue_id): Path<Uuid>,
    JsonBody(req): JsonBody<CommentRequest>,
) -> ApiResult<(StatusCode, Json<ActionResponse<Comment>>)> {
    let (issue, project, _) = issue_access(&state, issue_id, auth.user_id, TeamRole::Member).await?;
    req.check()?;

    let mut tx = state.db.begin().await?;

    let comment = Comment::create(&mut *tx, issue.id, auth.user_id, req.body.trim()).await?;
    IssueActivity::record(&mut tx, issue.id, auth.user_id, ActivityAction::Commented, &[]).await?;

    tx.commit().await?;

    let identifier = project.issue_identifier(issue.number);
    for user_id in comment_recipients(&issue, auth.user_id) {
        notify(
            &state.db,
            NewNotification {
                user_id,
                kind: NotificationKind::IssueCommented,
                title: format!("New comment on {}", identifier),
                body: Some(comment.body.chars().take(200).collect()),
                link_issue_id: Some(issue.id),
                link_team_id: Some(project.team_id),
            },
        )
        .await;
    }

    Ok(ActionResponse::created(comment))
}

pub async fn list_comments(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(issue_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<Vec<CommentWithAuthor>>>> {
    let (issue, _, _) = issue_access(&state, issue_id, auth.user_id, TeamRole::Member).await?;

    let comments = Comment::list_by_issue(&state.db, issue.id).await?;
    Ok(ActionResponse::ok(comments))
}

pub async fn update_comment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(comment_id): Path<Uuid>,
    JsonBody(req): JsonBody<CommentRequest>,
) -> ApiResult<Json<ActionResponse<Comment>>> {
    let (comment, role) = comment_access(&state, comment_id, auth.user_id).await?;
    require_author(auth.user_id, comment.author_id, role, false)?;
    req.check()?;

    let comment = Comment::update_body(&state.db, comment.id, req.body.trim())
        .await?
        .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))?;

    Ok(ActionResponse::ok(comment))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(comment_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<Deleted>>> {
    let (comment, role) = comment_access(&state, comment_id, auth.user_id).await?;
    require_author(auth.user_id, comment.author_id, role, true)?;

    if !Comment::soft_delete(&state.db, comment.id).await? {
        return Err(ApiError::NotFound("Comment not found".to_string()));
    }

    Ok(ActionResponse::ok(Deleted::new(comment_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use planboard_shared::models::issue::{IssuePriority, IssueStatus};

    fn issue(assignee_id: Option<Uuid>, reporter_id: Option<Uuid>) -> Issue {
        Issue {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            number: 1,
            title: "Broken link".to_string(),
            description: None,
            status: IssueStatus::Todo,
            custom_status_id: None,
            priority: IssuePriority::None,
            position: 0,
            assignee_id,
            reporter_id,
            due_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_recipients_skip_author() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(comment_recipients(&issue(Some(a), Some(b)), a), vec![b]);
        assert_eq!(comment_recipients(&issue(Some(a), Some(b)), Uuid::new_v4()), vec![a, b]);
        assert_eq!(comment_recipients(&issue(Some(a), Some(a)), b), vec![a]);
        assert!(comment_recipients(&issue(None, Some(a)), a).is_empty());
    }

    #[test]
    fn test_blank_comment_rejected() {
        let req = CommentRequest {
            body: "   ".to_string(),
        };
        assert!(req.check().is_err());
    }
}
