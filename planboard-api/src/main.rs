//! # Planboard API Server
//!
//! JSON API for teams, projects, Kanban boards and issues.
//!
//! ## Startup
//!
//! 1. Load configuration from the environment (`.env` in development)
//! 2. Connect to PostgreSQL and apply pending migrations
//! 3. Build the AI client when `AI_API_KEY` is set
//! 4. Serve until Ctrl+C, then drain the pool
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p planboard-api
//! ```

use std::sync::Arc;

use anyhow::Context;
use planboard_api::{
    ai::OpenAiClient,
    app::{build_router, AppState},
    config::Config,
};
use planboard_shared::db::{migrations::run_migrations, pool};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "planboard_api=debug,planboard_shared=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Planboard API v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("Failed to load configuration")?;

    let db = pool::create_pool(config.database.pool_config())
        .await
        .context("Failed to connect to the database")?;
    run_migrations(&db)
        .await
        .context("Failed to run database migrations")?;

    let ai_client = OpenAiClient::from_config(&config.ai).context("Failed to build AI client")?;
    let bind_address = config.bind_address();

    let mut state = AppState::new(db.clone(), config);
    match ai_client {
        Some(client) => {
            tracing::info!(model = %state.config.ai.model, "AI features enabled");
            state = state.with_ai_client(Arc::new(client));
        }
        None => tracing::warn!("AI_API_KEY not set, AI routes will answer 503"),
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool::close_pool(db).await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
