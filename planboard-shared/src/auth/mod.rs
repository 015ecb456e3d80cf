/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id hashing and strength rules
/// - [`jwt`]: HS256 access/refresh tokens
/// - [`invite_token`]: team invitation tokens (SHA-256 at rest)
/// - [`middleware`]: bearer-token middleware and the `AuthContext` extractor
/// - [`authorization`]: team membership and role checks
///
/// # Example
///
/// ```no_run
/// use planboard_shared::auth::password::{hash_password, verify_password};
/// use planboard_shared::auth::jwt::issue_token_pair;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("kanban-board-1")?;
/// assert!(verify_password("kanban-board-1", &hash)?);
///
/// let tokens = issue_token_pair(Uuid::new_v4(), "a-secret-that-is-at-least-32-bytes")?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod invite_token;
pub mod jwt;
pub mod middleware;
pub mod password;
