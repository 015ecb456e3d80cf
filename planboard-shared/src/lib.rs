//! # Planboard Shared Library
//!
//! Data layer and domain logic used by the Planboard API server.
//!
//! ## Module Organization
//!
//! - `db`: connection pool and embedded migrations
//! - `models`: one module per table group, with their queries
//! - `auth`: passwords, JWTs, invite tokens, membership checks
//! - `board`: Kanban columns and transactional issue moves
//! - `ai_limit`: per-user AI request windows
//! - `stats`: dashboard aggregation

pub mod ai_limit;
pub mod auth;
pub mod board;
pub mod db;
pub mod models;
pub mod stats;

/// Current version of the Planboard shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
