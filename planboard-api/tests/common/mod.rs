//! Common test utilities for integration tests
//!
//! Provides:
//! - Database setup (migrations applied) from `DATABASE_URL`
//! - A seeded owner and team
//! - JWT generation for any user
//! - Request helpers that drive the router with `tower::Service::call`
//!
//! Run with `--test-threads=1`; every context cleans up after itself.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use planboard_api::{
    ai::{AiClient, AiClientError},
    app::{build_router, AppState},
    config::{AiConfig, ApiConfig, Config, DatabaseConfig, JwtConfig},
};
use planboard_shared::{
    auth::jwt::{create_token, Claims, TokenType},
    db::migrations::run_migrations,
    models::{
        team::{CreateTeam, Team},
        team_member::{TeamMember, TeamRole},
        user::{CreateUser, User},
    },
};
use serde_json::Value;
use sqlx::PgPool;
use tower::Service as _;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-secret-key-at-least-32-characters-long";

/// Per-minute AI limit used by every test context
pub const TEST_AI_PER_MINUTE: u32 = 2;

/// AI client that answers every prompt with the same text
pub struct StubAi {
    pub reply: String,
}

#[async_trait]
impl AiClient for StubAi {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, AiClientError> {
        Ok(self.reply.clone())
    }
}

pub fn test_config() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL")?;

    Ok(Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            production: false,
        },
        database: DatabaseConfig {
            url,
            max_connections: 5,
        },
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
        },
        ai: AiConfig {
            base_url: "http://localhost:9".to_string(),
            api_key: None,
            model: "test-model".to_string(),
            requests_per_minute: TEST_AI_PER_MINUTE,
            requests_per_day: 50,
        },
    })
}

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: PgPool,
    pub app: axum::Router,
    pub config: Config,
    pub team: Team,

    /// Owner of `team`
    pub user: User,

    pub jwt_token: String,

    extra_users: Mutex<Vec<Uuid>>,
}

impl TestContext {
    pub async fn new() -> anyhow::Result<Self> {
        Self::build(None).await
    }

    /// Context whose AI routes answer with `reply`
    pub async fn with_ai(reply: &str) -> anyhow::Result<Self> {
        Self::build(Some(Arc::new(StubAi {
            reply: reply.to_string(),
        })))
        .await
    }

    async fn build(ai: Option<Arc<dyn AiClient>>) -> anyhow::Result<Self> {
        let config = test_config()?;

        let db = PgPool::connect(&config.database.url).await?;
        run_migrations(&db).await?;

        let user = insert_user(&db, "owner").await?;

        let team = Team::create(
            &db,
            CreateTeam {
                name: format!("Test Team {}", Uuid::new_v4()),
                description: None,
            },
        )
        .await?;
        TeamMember::create(&db, team.id, user.id, TeamRole::Owner).await?;

        let jwt_token = token_for(user.id)?;

        let mut state = AppState::new(db.clone(), config.clone());
        if let Some(ai) = ai {
            state = state.with_ai_client(ai);
        }
        let app = build_router(state);

        Ok(TestContext {
            db,
            app,
            config,
            team,
            user,
            jwt_token,
            extra_users: Mutex::new(Vec::new()),
        })
    }

    /// Creates another user, removed again by [`cleanup`](Self::cleanup)
    pub async fn create_user(&self, label: &str) -> anyhow::Result<(User, String)> {
        let user = insert_user(&self.db, label).await?;
        self.extra_users
            .lock()
            .map_err(|_| anyhow::anyhow!("user list poisoned"))?
            .push(user.id);
        let token = token_for(user.id)?;
        Ok((user, token))
    }

    /// Creates a user who belongs to the seeded team with `role`
    pub async fn create_member(&self, role: TeamRole) -> anyhow::Result<(User, String)> {
        let (user, token) = self.create_user(role.as_str()).await?;
        TeamMember::create(&self.db, self.team.id, user.id, role).await?;
        Ok((user, token))
    }

    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.jwt_token)
    }

    /// Sends a request as the seeded owner
    pub async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send_as(&self.jwt_token, method, uri, body).await
    }

    /// Sends a request with `token` and returns the status and JSON body
    pub async fn send_as(
        &self,
        token: &str,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", token));

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().call(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, json)
    }

    /// Creates a project in the seeded team and returns its id
    pub async fn create_project(&self, key: &str) -> Uuid {
        let (status, body) = self
            .send(
                "POST",
                &format!("/v1/teams/{}/projects", self.team.id),
                Some(serde_json::json!({ "name": format!("Project {}", key), "key": key })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create project: {}", body);
        parse_id(&body)
    }

    /// Creates an issue and returns its id
    pub async fn create_issue(&self, project_id: Uuid, body: Value) -> Uuid {
        let (status, response) = self
            .send("POST", &format!("/v1/projects/{}/issues", project_id), Some(body))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create issue: {}", response);
        parse_id(&response)
    }

    /// Removes the seeded team (cascading to its projects and issues) and
    /// every user this context created
    pub async fn cleanup(&self) -> anyhow::Result<()> {
        Team::purge(&self.db, self.team.id).await?;

        let extra: Vec<Uuid> = self
            .extra_users
            .lock()
            .map_err(|_| anyhow::anyhow!("user list poisoned"))?
            .clone();
        for id in extra {
            User::delete(&self.db, id).await?;
        }
        User::delete(&self.db, self.user.id).await?;
        Ok(())
    }
}

async fn insert_user(db: &PgPool, label: &str) -> anyhow::Result<User> {
    let user = User::create(
        db,
        CreateUser {
            email: format!("{}-{}@example.com", label, Uuid::new_v4()),
            password_hash: "unused".to_string(),
            name: Some(format!("Test {}", label)),
            avatar_url: None,
        },
    )
    .await?;
    Ok(user)
}

pub fn token_for(user_id: Uuid) -> anyhow::Result<String> {
    let claims = Claims::new(user_id, TokenType::Access);
    Ok(create_token(&claims, TEST_JWT_SECRET)?)
}

/// `data.id` of an action response
pub fn parse_id(body: &Value) -> Uuid {
    body["data"]["id"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("response has no data.id: {}", body))
}
