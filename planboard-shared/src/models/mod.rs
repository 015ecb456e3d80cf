/// Database models for Planboard
///
/// Each module owns one table (or a small group of tables) and exposes its
/// queries as `impl Model { async fn ... }`.
///
/// # Models
///
/// - `user`: accounts and email normalization
/// - `team`, `team_member`, `team_invite`: tenancy, roles and invitations
/// - `project`, `custom_status`, `label`: project structure
/// - `issue`, `comment`, `subtask`, `activity`: issue tracking
/// - `notification`: in-app notifications
/// - `ai_rate_limit`: per-user AI request windows
///
/// # Example
///
/// ```no_run
/// use planboard_shared::models::user::{User, CreateUser};
/// use planboard_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let new_user = CreateUser {
///     email: "user@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     name: Some("Jane Doe".to_string()),
///     avatar_url: None,
/// };
///
/// let user = User::create(&pool, new_user).await?;
/// # Ok(())
/// # }
/// ```

pub mod activity;
pub mod ai_rate_limit;
pub mod comment;
pub mod custom_status;
pub mod issue;
pub mod label;
pub mod notification;
pub mod project;
pub mod subtask;
pub mod team;
pub mod team_invite;
pub mod team_member;
pub mod user;
