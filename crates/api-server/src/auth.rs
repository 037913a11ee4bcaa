//! Route gating and the signed-in session extractor

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use oauth::{SessionStatus, SessionView};

use crate::cookies;
use crate::error::ApiError;
use crate::state::AppState;

/// Outcome of the gating rules for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Proceed,
    Redirect(&'static str),
}

/// Paths the gate never looks at
pub fn is_excluded(path: &str) -> bool {
    path.starts_with("/api")
        || path.starts_with("/_next/static")
        || path.starts_with("/_next/image")
        || path == "/favicon.ico"
}

/// Decides whether a page request may proceed
pub fn gate(path: &str, authenticated: bool) -> Gate {
    if is_excluded(path) {
        return Gate::Proceed;
    }

    // Always public
    if matches!(path, "/" | "/landing" | "/health") {
        return Gate::Proceed;
    }

    let login_route = matches!(path, "/login" | "/auth/callback" | "/auth/google");
    if !authenticated && !login_route {
        return Gate::Redirect("/login");
    }

    if authenticated && path == "/login" {
        return Gate::Redirect("/");
    }

    Gate::Proceed
}

/// Middleware applying [`gate`] with the session named by the auth cookie
pub async fn require_session(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if is_excluded(&path) {
        return next.run(request).await;
    }

    let authenticated = match cookies::get(request.headers(), state.auth_cookie()) {
        Some(id) => matches!(state.sessions.lookup(&id).await, SessionStatus::Authenticated(_)),
        None => false,
    };

    match gate(&path, authenticated) {
        Gate::Proceed => next.run(request).await,
        Gate::Redirect(to) => {
            tracing::debug!("Redirecting {} to {}", path, to);
            Redirect::to(to).into_response()
        }
    }
}

/// A live, signed-in session; rejects with 401 JSON otherwise
pub struct AuthSession(pub SessionView);

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(id) = cookies::get(&parts.headers, state.auth_cookie()) else {
            return Err(ApiError::Unauthorized("Not signed in".to_string()));
        };

        match state.sessions.lookup(&id).await {
            SessionStatus::Authenticated(view) => Ok(AuthSession(view)),
            SessionStatus::Expired => Err(ApiError::Unauthorized(
                "Authentication expired. Please log in again.".to_string(),
            )),
            SessionStatus::InProgress | SessionStatus::Missing => {
                Err(ApiError::Unauthorized("Not signed in".to_string()))
            }
        }
    }
}
