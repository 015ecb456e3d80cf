/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use planboard_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = planboard_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{ai::AiClient, config::Config, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use planboard_shared::{
    ai_limit::AiRateLimiter,
    auth::middleware::{jwt_auth_middleware, AuthError},
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,

    pub config: Arc<Config>,

    /// `None` when no AI provider is configured
    pub ai: Option<Arc<dyn AiClient>>,

    pub ai_limiter: AiRateLimiter,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        let ai_limiter = AiRateLimiter::new(db.clone(), config.ai.limits());
        Self {
            db,
            config: Arc::new(config),
            ai: None,
            ai_limiter,
        }
    }

    pub fn with_ai_client(mut self, client: Arc<dyn AiClient>) -> Self {
        self.ai = Some(client);
        self
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete router
///
/// ```text
/// /health                                   public
/// /v1/auth/{register,login,refresh}         public
/// /v1/auth/me                               bearer
/// /v1/teams[/:team_id[/members|invites|projects|labels|stats|leave]]
/// /v1/invites[/accept|/decline]
/// /v1/projects/:project_id[/issues|statuses|board|stats]
/// /v1/statuses/:status_id
/// /v1/labels/:label_id
/// /v1/issues/:issue_id[/move|position|labels|comments|subtasks|activity|ai]
/// /v1/comments/:comment_id
/// /v1/subtasks/:subtask_id
/// /v1/notifications[/unread-count|/read-all|/:notification_id/read]
/// /v1/ai/usage
/// ```
///
/// Layers, outermost first: security headers, CORS, tracing, then bearer
/// authentication on everything except health and the public auth routes.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let public_auth_routes = Router::new()
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh));

    let protected_routes = Router::new()
        .route("/auth/me", get(routes::auth::me))
        // teams and membership
        .route(
            "/teams",
            get(routes::teams::list_teams).post(routes::teams::create_team),
        )
        .route(
            "/teams/:team_id",
            get(routes::teams::get_team)
                .patch(routes::teams::update_team)
                .delete(routes::teams::delete_team),
        )
        .route("/teams/:team_id/members", get(routes::teams::list_members))
        .route(
            "/teams/:team_id/members/:user_id",
            axum::routing::patch(routes::teams::change_member_role)
                .delete(routes::teams::remove_member),
        )
        .route("/teams/:team_id/leave", post(routes::teams::leave_team))
        // invites
        .route(
            "/teams/:team_id/invites",
            get(routes::invites::list_team_invites).post(routes::invites::create_invite),
        )
        .route(
            "/teams/:team_id/invites/:invite_id",
            axum::routing::delete(routes::invites::revoke_invite),
        )
        .route("/invites", get(routes::invites::list_my_invites))
        .route("/invites/accept", post(routes::invites::accept_invite))
        .route("/invites/decline", post(routes::invites::decline_invite))
        // projects
        .route(
            "/teams/:team_id/projects",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/projects/:project_id",
            get(routes::projects::get_project)
                .patch(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        // custom statuses
        .route(
            "/projects/:project_id/statuses",
            get(routes::statuses::list_statuses).post(routes::statuses::create_status),
        )
        .route(
            "/statuses/:status_id",
            axum::routing::patch(routes::statuses::update_status)
                .delete(routes::statuses::delete_status),
        )
        // labels
        .route(
            "/teams/:team_id/labels",
            get(routes::labels::list_labels).post(routes::labels::create_label),
        )
        .route(
            "/labels/:label_id",
            axum::routing::delete(routes::labels::delete_label),
        )
        .route(
            "/issues/:issue_id/labels/:label_id",
            post(routes::labels::attach_label).delete(routes::labels::detach_label),
        )
        // issues and board
        .route(
            "/projects/:project_id/issues",
            get(routes::issues::list_issues).post(routes::issues::create_issue),
        )
        .route(
            "/issues/:issue_id",
            get(routes::issues::get_issue)
                .patch(routes::issues::update_issue)
                .delete(routes::issues::delete_issue),
        )
        .route("/projects/:project_id/board", get(routes::board::get_board))
        .route("/issues/:issue_id/move", post(routes::board::move_issue))
        .route("/issues/:issue_id/position", post(routes::board::update_position))
        // comments, subtasks, activity
        .route(
            "/issues/:issue_id/comments",
            get(routes::comments::list_comments).post(routes::comments::create_comment),
        )
        .route(
            "/comments/:comment_id",
            axum::routing::patch(routes::comments::update_comment)
                .delete(routes::comments::delete_comment),
        )
        .route(
            "/issues/:issue_id/subtasks",
            get(routes::subtasks::list_subtasks).post(routes::subtasks::create_subtask),
        )
        .route(
            "/subtasks/:subtask_id",
            axum::routing::patch(routes::subtasks::update_subtask)
                .delete(routes::subtasks::delete_subtask),
        )
        .route("/issues/:issue_id/activity", get(routes::activity::list_activity))
        // notifications
        .route("/notifications", get(routes::notifications::list_notifications))
        .route(
            "/notifications/unread-count",
            get(routes::notifications::unread_count),
        )
        .route(
            "/notifications/read-all",
            post(routes::notifications::mark_all_read),
        )
        .route(
            "/notifications/:notification_id/read",
            post(routes::notifications::mark_read),
        )
        // dashboards
        .route("/teams/:team_id/stats", get(routes::stats::team_stats))
        .route("/projects/:project_id/stats", get(routes::stats::project_stats))
        // ai
        .route("/issues/:issue_id/ai/summary", post(routes::ai::summarize_issue))
        .route("/issues/:issue_id/ai/subtasks", post(routes::ai::suggest_subtasks))
        .route("/ai/usage", get(routes::ai::usage))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let v1_routes = Router::new()
        .merge(public_auth_routes)
        .merge(protected_routes);

    let cors = if state.config.allows_any_origin() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

async fn jwt_auth_layer(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    jwt_auth_middleware(state.jwt_secret(), req, next).await
}
