//! # Planboard API Server Library
//!
//! ## Modules
//!
//! - `ai`: chat-completion client and prompt helpers
//! - `app`: application state and router builder
//! - `config`: configuration from the environment
//! - `error`: error handling and HTTP response mapping
//! - `extract`: body and query extractors that reject with `ApiError`
//! - `middleware`: security headers
//! - `routes`: API route handlers

pub mod ai;
pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
