//! Flow Mail API Server Library
//!
//! This crate provides the HTTP server for Flow Mail: Google sign-in, the
//! session-gated pages and a JSON API over the user's Gmail mailbox.

pub mod auth;
pub mod cookies;
pub mod error;
pub mod extract;
pub mod mail;
pub mod pages;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use server::{create_router, run_server_blocking, spawn_session_purge, start_server, ServerHandle};
pub use state::AppState;
