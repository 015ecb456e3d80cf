/// Team membership and role checks
///
/// Every action resolves the team that owns the resource it touches and
/// calls one of these before doing anything else. Soft-deleted teams count
/// as "not a member".
///
/// # Example
///
/// ```no_run
/// use planboard_shared::auth::authorization::{require_membership, require_role};
/// use planboard_shared::models::team_member::TeamRole;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, team_id: Uuid, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let role = require_membership(&pool, team_id, user_id).await?;
/// require_role(&pool, team_id, user_id, TeamRole::Admin).await?;
/// # Ok(())
/// # }
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::team_member::{TeamMember, TeamRole};

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Not a member of team {0}")]
    NotMember(Uuid),

    #[error("Insufficient permissions: requires {required:?}, has {actual:?}")]
    InsufficientRole { required: TeamRole, actual: TeamRole },

    /// The caller is not the author/reporter of the resource
    #[error("Not authorized to modify this resource")]
    NotAuthor,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Returns the caller's role, or `NotMember`
pub async fn require_membership(
    pool: &PgPool,
    team_id: Uuid,
    user_id: Uuid,
) -> Result<TeamRole, AuthzError> {
    TeamMember::get_role(pool, team_id, user_id)
        .await?
        .ok_or(AuthzError::NotMember(team_id))
}

/// Requires at least `required` (Owner > Admin > Member)
pub async fn require_role(
    pool: &PgPool,
    team_id: Uuid,
    user_id: Uuid,
    required: TeamRole,
) -> Result<TeamRole, AuthzError> {
    let actual = require_membership(pool, team_id, user_id).await?;
    check_role(actual, required)?;
    Ok(actual)
}

pub fn check_role(actual: TeamRole, required: TeamRole) -> Result<(), AuthzError> {
    if actual.has_permission(&required) {
        Ok(())
    } else {
        Err(AuthzError::InsufficientRole { required, actual })
    }
}

/// Passes for the resource's author, or for a team admin when
/// `admin_override` is set
pub fn require_author(
    user_id: Uuid,
    author_id: Option<Uuid>,
    role: TeamRole,
    admin_override: bool,
) -> Result<(), AuthzError> {
    if author_id == Some(user_id) {
        return Ok(());
    }
    if admin_override && role.has_permission(&TeamRole::Admin) {
        return Ok(());
    }
    Err(AuthzError::NotAuthor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_role() {
        assert!(check_role(TeamRole::Owner, TeamRole::Admin).is_ok());
        assert!(check_role(TeamRole::Admin, TeamRole::Admin).is_ok());
        assert!(matches!(
            check_role(TeamRole::Member, TeamRole::Admin),
            Err(AuthzError::InsufficientRole {
                required: TeamRole::Admin,
                actual: TeamRole::Member
            })
        ));
    }

    #[test]
    fn test_require_author() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert!(require_author(me, Some(me), TeamRole::Member, false).is_ok());
        assert!(require_author(me, Some(other), TeamRole::Member, true).is_err());
        assert!(require_author(me, Some(other), TeamRole::Admin, false).is_err());
        assert!(require_author(me, Some(other), TeamRole::Admin, true).is_ok());
        assert!(require_author(me, None, TeamRole::Owner, true).is_ok());
        assert!(matches!(
            require_author(me, None, TeamRole::Member, true),
            Err(AuthzError::NotAuthor)
        ));
    }

    #[test]
    fn test_authz_error_display() {
        let team_id = Uuid::new_v4();
        assert_eq!(
            AuthzError::NotMember(team_id).to_string(),
            format!("Not a member of team {}", team_id)
        );
    }
}
