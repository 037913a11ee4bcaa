//! Google OAuth 2.0 sign-in for Flow Mail
//!
//! This crate covers the whole life of a Gmail session token: building the
//! authorization URL, exchanging the returned code, tracking the session
//! through its states and persisting it between restarts.

pub mod constants;
pub mod error;
pub mod flow;
pub mod sessions;
pub mod storage;
pub mod tokens;

pub use error::{OAuthError, SessionError};
pub use flow::{OAuthClient, OAuthFlow};
pub use sessions::{ExchangeTicket, PendingLogin, SessionManager, SessionStatus, SessionView, UserInfo};
pub use storage::SessionStorage;
pub use tokens::{ExchangeResponse, TokenPair};
