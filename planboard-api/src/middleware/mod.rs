/// Middleware for the API server
///
/// Authentication lives in `planboard_shared::auth::middleware` and is wired
/// up in [`crate::app`].

pub mod security;
