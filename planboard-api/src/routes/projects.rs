/// Project endpoints
///
/// Projects live under a team. The `key` (e.g. `WEB`) prefixes issue
/// identifiers and is unique per team; it is uppercased before validation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use planboard_shared::{
    auth::middleware::AuthContext,
    models::{
        project::{CreateProject, Project, ProjectSummary, UpdateProject},
        team_member::TeamRole,
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{
    access::{project_access, team_access},
    check_length, check_optional_length, nullable, validate_project_key, Deleted,
};
use crate::{
    app::AppState,
    error::{validate_request, ActionResponse, ApiError, ApiResult},
    extract::JsonBody,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 100, message = "Project name must be 1-100 characters"))]
    pub name: String,

    #[validate(custom(function = "validate_project_key"))]
    pub key: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
}

pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(team_id): Path<Uuid>,
    JsonBody(mut req): JsonBody<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<ActionResponse<Project>>)> {
    team_access(&state, team_id, auth.user_id, TeamRole::Member).await?;

    req.key = req.key.trim().to_ascii_uppercase();
    validate_request(&req)?;
    check_length("name", Some(&req.name), 1, 100)?;

    if Project::key_exists(&state.db, team_id, &req.key).await? {
        return Err(ApiError::Conflict(format!(
            "Project key {} is already used in this team",
            req.key
        )));
    }

    let project = Project::create(
        &state.db,
        CreateProject {
            team_id,
            name: req.name.trim().to_string(),
            key: req.key,
            description: req.description,
            created_by: auth.user_id,
        },
    )
    .await?;

    tracing::info!(project_id = %project.id, team_id = %team_id, key = %project.key, "Project created");

    Ok(ActionResponse::created(project))
}

/// Team projects with issue counts
pub async fn list_projects(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<Vec<ProjectSummary>>>> {
    team_access(&state, team_id, auth.user_id, TeamRole::Member).await?;

    let projects = Project::list_by_team(&state.db, team_id).await?;
    Ok(ActionResponse::ok(projects))
}

pub async fn get_project(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<Project>>> {
    let (project, _) = project_access(&state, project_id, auth.user_id, TeamRole::Member).await?;
    Ok(ActionResponse::ok(project))
}

/// The key is fixed after creation
pub async fn update_project(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
    JsonBody(req): JsonBody<UpdateProjectRequest>,
) -> ApiResult<Json<ActionResponse<Project>>> {
    project_access(&state, project_id, auth.user_id, TeamRole::Member).await?;

    check_length("name", req.name.as_deref(), 1, 100)?;
    check_optional_length("description", &req.description, 2000)?;

    let project = Project::update(
        &state.db,
        project_id,
        UpdateProject {
            name: req.name.map(|n| n.trim().to_string()),
            description: req.description,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;

    Ok(ActionResponse::ok(project))
}

pub async fn delete_project(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<Deleted>>> {
    project_access(&state, project_id, auth.user_id, TeamRole::Admin).await?;

    if !Project::soft_delete(&state.db, project_id).await? {
        return Err(ApiError::NotFound("Project not found".to_string()));
    }

    tracing::info!(project_id = %project_id, user_id = %auth.user_id, "Project deleted");

    Ok(ActionResponse::ok(Deleted::new(project_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(key: &str) -> CreateProjectRequest {
        CreateProjectRequest {
            name: "Website".to_string(),
            key: key.to_string(),
            description: None,
        }
    }

    #[test]
    fn test_project_key_rules() {
        assert!(validate_request(&request("WEB")).is_ok());
        assert!(validate_request(&request("W")).is_err());
        assert!(validate_request(&request("web")).is_err());
    }

    #[test]
    fn test_long_description_rejected() {
        let mut req = request("WEB");
        req.description = Some("x".repeat(2001));
        assert!(validate_request(&req).is_err());
    }
}
