/// API route handlers, one module per resource
///
/// Every handler authenticates through [`AuthContext`](planboard_shared::auth::middleware::AuthContext),
/// loads the resource through [`access`], then validates and mutates.

pub mod access;
pub mod activity;
pub mod ai;
pub mod auth;
pub mod board;
pub mod comments;
pub mod health;
pub mod invites;
pub mod issues;
pub mod labels;
pub mod notifications;
pub mod projects;
pub mod stats;
pub mod statuses;
pub mod subtasks;
pub mod teams;

use std::borrow::Cow;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::ValidationError;

use crate::error::{ApiError, ApiResult};

/// Body of delete actions
#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: Uuid,
    pub deleted: bool,
}

impl Deleted {
    pub fn new(id: Uuid) -> Self {
        Self { id, deleted: true }
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in PATCH bodies
///
/// Use with `#[serde(default, deserialize_with = "nullable")]`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

/// `#RRGGBB`
pub fn validate_hex_color(value: &str) -> Result<(), ValidationError> {
    let valid = value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(())
    } else {
        Err(invalid("hex_color", "Color must be #RRGGBB"))
    }
}

/// 2-10 of `A-Z` / `0-9`
pub fn validate_project_key(value: &str) -> Result<(), ValidationError> {
    let valid = (2..=10).contains(&value.len())
        && value
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(invalid(
            "project_key",
            "Key must be 2-10 uppercase letters or digits",
        ))
    }
}

/// Length check for nullable PATCH fields, which `validator` does not reach
pub fn check_optional_length(
    field: &str,
    value: &Option<Option<String>>,
    max: usize,
) -> ApiResult<()> {
    if let Some(Some(text)) = value {
        if text.chars().count() > max {
            return Err(ApiError::validation(
                field,
                &format!("{} must be at most {} characters", field, max),
            ));
        }
    }
    Ok(())
}

/// Required-length check for optional PATCH fields
pub fn check_length(field: &str, value: Option<&str>, min: usize, max: usize) -> ApiResult<()> {
    if let Some(text) = value {
        let len = text.trim().chars().count();
        if len < min || len > max {
            return Err(ApiError::validation(
                field,
                &format!("{} must be {}-{} characters", field, min, max),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        description: Option<Option<String>>,
    }

    #[test]
    fn test_nullable_distinguishes_null_from_absent() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.description, None);

        let null: Patch = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(null.description, Some(None));

        let set: Patch = serde_json::from_str(r#"{"description": "x"}"#).unwrap();
        assert_eq!(set.description, Some(Some("x".to_string())));
    }

    #[test]
    fn test_validate_hex_color() {
        assert!(validate_hex_color("#1a2B3c").is_ok());
        assert!(validate_hex_color("1a2b3c").is_err());
        assert!(validate_hex_color("#1a2b3").is_err());
        assert!(validate_hex_color("#gggggg").is_err());
    }

    #[test]
    fn test_validate_project_key() {
        assert!(validate_project_key("WEB").is_ok());
        assert!(validate_project_key("A1").is_ok());
        assert!(validate_project_key("A").is_err());
        assert!(validate_project_key("ABCDEFGHIJK").is_err());
        assert!(validate_project_key("web").is_err());
        assert!(validate_project_key("WE-B").is_err());
    }

    #[test]
    fn test_length_checks() {
        assert!(check_length("name", Some("ok"), 1, 5).is_ok());
        assert!(check_length("name", Some("   "), 1, 5).is_err());
        assert!(check_length("name", None, 1, 5).is_ok());

        let long = Some(Some("x".repeat(11)));
        assert!(check_optional_length("description", &long, 10).is_err());
        assert!(check_optional_length("description", &Some(None), 10).is_ok());
    }
}
