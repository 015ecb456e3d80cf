/// AI assistance endpoints
///
/// - `POST /v1/issues/:issue_id/ai/summary` - summary of the issue and its comments
/// - `POST /v1/issues/:issue_id/ai/subtasks` - suggested subtask titles (not saved)
/// - `GET  /v1/ai/usage` - the caller's counters and limits
///
/// Every call to the provider counts against the caller's per-minute and
/// per-day limits, whether or not the provider succeeds.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use planboard_shared::{
    ai_limit::AiUsage,
    auth::middleware::AuthContext,
    models::{comment::Comment, subtask::Subtask, team_member::TeamRole},
};
use serde::Serialize;
use uuid::Uuid;

use super::access::issue_access;
use crate::{
    ai::{
        parse_subtask_suggestions, subtask_prompt, summary_prompt, AiClient,
        SUBTASK_SYSTEM_PROMPT, SUMMARY_SYSTEM_PROMPT,
    },
    app::AppState,
    error::{ActionResponse, ApiError, ApiResult},
};

#[derive(Debug, Serialize)]
pub struct IssueSummary {
    pub issue_id: Uuid,
    pub summary: String,
    pub usage: AiUsage,
}

#[derive(Debug, Serialize)]
pub struct SubtaskSuggestions {
    pub issue_id: Uuid,
    pub suggestions: Vec<String>,
    pub usage: AiUsage,
}

fn client(state: &AppState) -> ApiResult<Arc<dyn AiClient>> {
    state
        .ai
        .clone()
        .ok_or_else(|| ApiError::ServiceUnavailable("AI features are not configured".to_string()))
}

pub async fn summarize_issue(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(issue_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<IssueSummary>>> {
    let ai = client(&state)?;
    let (issue, project, _) = issue_access(&state, issue_id, auth.user_id, TeamRole::Member).await?;

    let comments = Comment::list_by_issue(&state.db, issue.id).await?;
    let prompt = summary_prompt(&project.issue_identifier(issue.number), &issue, &comments);

    let usage = state.ai_limiter.check_and_increment(auth.user_id).await?;
    let summary = ai.complete(SUMMARY_SYSTEM_PROMPT, &prompt).await?;

    tracing::info!(
        issue_id = %issue.id,
        user_id = %auth.user_id,
        comments = comments.len(),
        "Issue summarized"
    );

    Ok(ActionResponse::ok(IssueSummary {
        issue_id: issue.id,
        summary: summary.trim().to_string(),
        usage,
    }))
}

pub async fn suggest_subtasks(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(issue_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<SubtaskSuggestions>>> {
    let ai = client(&state)?;
    let (issue, project, _) = issue_access(&state, issue_id, auth.user_id, TeamRole::Member).await?;

    let existing: Vec<String> = Subtask::list_by_issue(&state.db, issue.id)
        .await?
        .into_iter()
        .map(|s| s.title)
        .collect();
    let prompt = subtask_prompt(&project.issue_identifier(issue.number), &issue, &existing);

    let usage = state.ai_limiter.check_and_increment(auth.user_id).await?;
    let completion = ai.complete(SUBTASK_SYSTEM_PROMPT, &prompt).await?;

    let suggestions: Vec<String> = parse_subtask_suggestions(&completion)
        .into_iter()
        .filter(|s| !existing.iter().any(|e| e.eq_ignore_ascii_case(s)))
        .collect();

    tracing::info!(
        issue_id = %issue.id,
        user_id = %auth.user_id,
        suggestions = suggestions.len(),
        "Subtasks suggested"
    );

    Ok(ActionResponse::ok(SubtaskSuggestions {
        issue_id: issue.id,
        suggestions,
        usage,
    }))
}

pub async fn usage(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<ActionResponse<AiUsage>>> {
    let usage = state.ai_limiter.usage(auth.user_id).await?;
    Ok(ActionResponse::ok(usage))
}
