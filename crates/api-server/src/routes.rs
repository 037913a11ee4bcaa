use axum::{
    extract::{Json, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::Utc;
use oauth::{ExchangeResponse, SessionStatus, TokenPair, UserInfo};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::cookies;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::pages;
use crate::state::AppState;

/// Attaches `Set-Cookie` headers to a response
fn with_cookies(cookies: Vec<HeaderValue>, response: impl IntoResponse) -> Response {
    let mut response = response.into_response();
    for cookie in cookies {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    response
}

fn error_page(status: StatusCode, title: &str, message: &str) -> (StatusCode, Html<String>) {
    (status, Html(pages::error(title, message)))
}

/// Fetches the Gmail profile and remembers it on the session; failures are only logged
async fn remember_profile(state: &AppState, session_id: &str, access_token: &str) {
    match state.gmail(access_token).profile().await {
        Ok(profile) => {
            let info = UserInfo {
                email: profile.email_address,
                messages_total: profile.messages_total,
                threads_total: profile.threads_total,
            };
            if let Err(e) = state.sessions.store_user_info(session_id, info).await {
                warn!("Could not store user info: {}", e);
            }
        }
        Err(e) => warn!("Could not fetch Gmail profile: {}", e),
    }
}

/// Simple health check endpoint
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "ok",
        "service": "flowmail",
        "version": env!("CARGO_PKG_VERSION")
    })))
}

#[derive(Debug, Deserialize)]
pub struct HomeQuery {
    pub access_token: Option<String>,
    pub error: Option<String>,
}

/// Root page
///
/// An `access_token` query parameter (forwarded by `/api/auth/callback`) signs
/// the browser in directly and redirects back here without it.
pub async fn home(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HomeQuery>,
) -> Response {
    let current = cookies::get(&headers, state.auth_cookie());

    if let Some(access_token) = query.access_token.filter(|t| !t.is_empty()) {
        if let Some(previous) = &current {
            state.sessions.clear(previous).await;
        }

        let token = TokenPair {
            access_token: access_token.clone(),
            refresh_token: None,
            expires_in: state.sessions.ttl().num_seconds(),
            issued_at: Utc::now(),
        };
        let session_id = state.sessions.authenticate_direct(token).await;
        remember_profile(&state, &session_id, &access_token).await;

        return with_cookies(
            vec![cookies::session(state.auth_cookie(), &session_id)],
            Redirect::to("/"),
        );
    }

    let (view, stale_cookie) = match &current {
        Some(id) => match state.sessions.lookup(id).await {
            SessionStatus::Authenticated(view) => (Some(view), false),
            SessionStatus::InProgress => (None, false),
            // The gate has usually consumed an expiry already, leaving it missing
            SessionStatus::Expired | SessionStatus::Missing => (None, true),
        },
        None => (None, false),
    };

    let page = Html(pages::home(
        view.as_ref().and_then(|v| v.user.as_ref()),
        view.is_some(),
        query.error.as_deref(),
    ));
    if stale_cookie {
        return with_cookies(vec![cookies::delete(state.auth_cookie())], page);
    }
    page.into_response()
}

pub async fn landing() -> Html<String> {
    Html(pages::landing())
}

/// Sign-in page
///
/// Signed-in browsers never get here (the gate sends them to `/`), so any
/// session cookie that arrives is stale and is dropped.
pub async fn login(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if state.oauth.is_none() {
        return (StatusCode::INTERNAL_SERVER_ERROR, Html(pages::configuration_error())).into_response();
    }

    match cookies::get(&headers, state.auth_cookie()) {
        Some(stale) => {
            state.sessions.clear(&stale).await;
            with_cookies(vec![cookies::delete(state.auth_cookie())], Html(pages::login()))
        }
        None => Html(pages::login()).into_response(),
    }
}

/// Starts the authorization-code flow
pub async fn google_login(State(state): State<AppState>) -> Response {
    let Some(flow) = &state.oauth else {
        return (StatusCode::INTERNAL_SERVER_ERROR, Html(pages::configuration_error())).into_response();
    };

    let login = state.sessions.begin_login().await;
    let url = flow.authorization_url(&login.state, Some(&login.code_challenge));
    info!("Redirecting to Google for sign-in");

    with_cookies(
        vec![cookies::short_lived(
            state.state_cookie(),
            &login.session_id,
            state.config.session.pending_ttl_secs,
        )],
        Redirect::to(&url),
    )
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Google redirects here with `code` and `state`, or with `error`
pub async fn auth_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let pending = cookies::get(&headers, state.state_cookie());
    let mut set_cookies = vec![cookies::delete(state.state_cookie())];

    // A new sign-in replaces whatever session the browser had
    if let Some(previous) = cookies::get(&headers, state.auth_cookie()) {
        state.sessions.clear(&previous).await;
        set_cookies.push(cookies::delete(state.auth_cookie()));
    }

    if let Some(err) = query.error {
        warn!("Google returned an authorization error: {}", err);
        if let Some(pending) = &pending {
            state.sessions.clear(pending).await;
        }
        let message = query.error_description.unwrap_or(err);
        return with_cookies(
            set_cookies,
            error_page(StatusCode::BAD_REQUEST, "Authentication failed", &message),
        );
    }

    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        return with_cookies(
            set_cookies,
            error_page(
                StatusCode::BAD_REQUEST,
                "Authentication failed",
                "No access token or code received",
            ),
        );
    };

    let Some(flow) = &state.oauth else {
        return with_cookies(
            set_cookies,
            (StatusCode::INTERNAL_SERVER_ERROR, Html(pages::configuration_error())),
        );
    };

    let Some(session_id) = pending else {
        warn!("OAuth callback without a pending login");
        return with_cookies(
            set_cookies,
            error_page(
                StatusCode::BAD_REQUEST,
                "Authentication failed",
                "Login session not found. Please sign in again.",
            ),
        );
    };

    let ticket = match state
        .sessions
        .begin_exchange(&session_id, query.state.as_deref())
        .await
    {
        Ok(ticket) => ticket,
        Err(e) => {
            return with_cookies(
                set_cookies,
                error_page(StatusCode::BAD_REQUEST, "Authentication failed", &e.to_string()),
            );
        }
    };

    let token = match flow.exchange_code(&code, ticket.code_verifier.as_deref()).await {
        Ok(token) => token,
        Err(e) => {
            error!("Token exchange failed: {}", e);
            state.sessions.fail(&ticket.session_id).await;
            return with_cookies(
                set_cookies,
                error_page(
                    StatusCode::BAD_GATEWAY,
                    "Authentication failed",
                    "Failed to exchange code for token",
                ),
            );
        }
    };

    let access_token = token.access_token.clone();
    if let Err(e) = state.sessions.complete(&ticket.session_id, token).await {
        error!("Could not complete sign-in: {}", e);
        return with_cookies(
            set_cookies,
            error_page(StatusCode::INTERNAL_SERVER_ERROR, "Authentication failed", &e.to_string()),
        );
    }
    remember_profile(&state, &ticket.session_id, &access_token).await;

    // The deletion of a previous auth cookie is replaced by the new one
    set_cookies.truncate(1);
    set_cookies.push(cookies::session(state.auth_cookie(), &ticket.session_id));
    with_cookies(set_cookies, Redirect::to("/"))
}

#[derive(Debug, Default, Deserialize)]
pub struct ExchangeCodeRequest {
    #[serde(default)]
    pub code: Option<String>,
}

/// Exchanges an authorization code for tokens and returns them as JSON
pub async fn exchange_code(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ExchangeCodeRequest>,
) -> Result<Json<ExchangeResponse>, ApiError> {
    let code = request
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No code provided".to_string()))?;

    let Some(flow) = &state.oauth else {
        error!("Missing Google client credentials");
        return Err(ApiError::NotConfigured);
    };

    let token = flow.exchange_code(&code, None).await?;
    info!("Token exchange successful");
    Ok(Json(ExchangeResponse::from(&token)))
}

#[derive(Debug, Deserialize)]
pub struct TokenCallbackQuery {
    pub error: Option<String>,
    pub access_token: Option<String>,
}

/// Forwards a token (or an error) handed over as query parameters to `/`
pub async fn api_auth_callback(Query(query): Query<TokenCallbackQuery>) -> Redirect {
    if let Some(err) = query.error {
        return Redirect::to(&format!("/?error={}", urlencoding::encode(&err)));
    }
    if let Some(token) = query.access_token {
        return Redirect::to(&format!("/?access_token={}", urlencoding::encode(&token)));
    }
    Redirect::to("/?error=no_token")
}

/// Reports whether the browser's session is signed in
pub async fn session(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let signed_out = json!({
        "authenticated": false,
        "expires_at": null,
        "user": null,
    });

    let Some(id) = cookies::get(&headers, state.auth_cookie()) else {
        return Json(signed_out).into_response();
    };

    match state.sessions.lookup(&id).await {
        SessionStatus::Authenticated(view) => Json(json!({
            "authenticated": true,
            "issued_at": view.issued_at,
            "expires_at": view.expires_at,
            "user": view.user,
        }))
        .into_response(),
        SessionStatus::Expired => {
            with_cookies(vec![cookies::delete(state.auth_cookie())], Json(signed_out))
        }
        SessionStatus::InProgress | SessionStatus::Missing => Json(signed_out).into_response(),
    }
}

/// Clears the session and its cookie
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(id) = cookies::get(&headers, state.auth_cookie()) {
        state.sessions.clear(&id).await;
    }
    with_cookies(vec![cookies::delete(state.auth_cookie())], Redirect::to("/login"))
}
