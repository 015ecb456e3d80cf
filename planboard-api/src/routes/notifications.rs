/// Notification endpoints, always scoped to the caller
///
/// - `GET   /v1/notifications?unread_only=true&limit=20` (limit at most 100)
/// - `GET   /v1/notifications/unread-count`
/// - `POST  /v1/notifications/:notification_id/read`
/// - `POST  /v1/notifications/read-all`

use axum::{
    extract::{Path, State},
    Json,
};
use planboard_shared::{
    auth::middleware::AuthContext,
    models::notification::{clamp_limit, Notification},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    app::AppState,
    error::{ActionResponse, ApiError, ApiResult},
    extract::QueryParams,
};

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthContext,
    QueryParams(query): QueryParams<NotificationQuery>,
) -> ApiResult<Json<ActionResponse<Vec<Notification>>>> {
    let notifications = Notification::list_for_user(
        &state.db,
        auth.user_id,
        query.unread_only,
        clamp_limit(query.limit),
    )
    .await?;

    Ok(ActionResponse::ok(notifications))
}

pub async fn unread_count(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<ActionResponse<UnreadCount>>> {
    let unread = Notification::unread_count(&state.db, auth.user_id).await?;
    Ok(ActionResponse::ok(UnreadCount { unread }))
}

/// Someone else's notification is reported as missing
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(notification_id): Path<Uuid>,
) -> ApiResult<Json<ActionResponse<MarkedRead>>> {
    if !Notification::mark_read(&state.db, notification_id, auth.user_id).await? {
        return Err(ApiError::NotFound("Notification not found".to_string()));
    }

    Ok(ActionResponse::ok(MarkedRead { updated: 1 }))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<ActionResponse<MarkedRead>>> {
    let updated = Notification::mark_all_read(&state.db, auth.user_id).await?;
    Ok(ActionResponse::ok(MarkedRead { updated }))
}
