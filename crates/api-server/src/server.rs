//! Server creation and management utilities
//!
//! This module exposes the server logic for use by both the CLI binary
//! and the integration tests.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use common::config::Config;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth;
use crate::mail;
use crate::routes;
use crate::state::AppState;

/// How often expired sessions and abandoned logins are dropped
pub const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Create the Axum router with all routes configured
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Pages
        .route("/", get(routes::home))
        .route("/landing", get(routes::landing))
        .route("/health", get(routes::health))
        .route("/login", get(routes::login))
        .route("/logout", get(routes::logout).post(routes::logout))
        // Google sign-in
        .route("/auth/google", get(routes::google_login))
        .route("/auth/callback", get(routes::auth_callback))
        .route("/api/auth/exchange-code", post(routes::exchange_code))
        .route("/api/auth/callback", get(routes::api_auth_callback))
        .route("/api/session", get(routes::session))
        // Gmail
        .route("/api/gmail/emails", get(mail::list_emails).post(mail::send_email))
        .route("/api/gmail/emails/{id}", get(mail::get_email).delete(mail::delete_email))
        .route("/api/gmail/emails/{id}/trash", post(mail::trash_email))
        .route("/api/gmail/emails/{id}/untrash", post(mail::untrash_email))
        .route("/api/gmail/emails/{id}/read", post(mail::mark_read))
        .route("/api/gmail/emails/{id}/star", post(mail::set_starred))
        .route("/api/gmail/emails/{id}/important", post(mail::set_important))
        .route("/api/gmail/emails/{id}/archive", post(mail::archive_email))
        .route("/api/gmail/emails/{id}/inbox", post(mail::move_to_inbox))
        .route("/api/gmail/labels", get(mail::labels))
        .route("/api/gmail/profile", get(mail::profile))
        .route("/api/gmail/inbox-count", get(mail::inbox_count))
        .route("/api/gmail/drafts", get(mail::list_drafts).post(mail::create_draft))
        .route("/api/gmail/drafts/{id}", axum::routing::delete(mail::delete_draft))
        .route("/api/gmail/drafts/{id}/send", post(mail::send_draft))
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_session))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Periodically drops expired sessions until the state is dropped by every other owner
pub fn spawn_session_purge(state: &AppState) -> tokio::task::JoinHandle<()> {
    let sessions = std::sync::Arc::downgrade(&state.sessions);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            let Some(sessions) = sessions.upgrade() else {
                break;
            };
            let purged = sessions.purge_expired().await;
            if purged > 0 {
                tracing::info!("Purged {} expired sessions", purged);
            }
        }
    })
}

/// Server handle that can be used to shut down the server
pub struct ServerHandle {
    shutdown_tx: oneshot::Sender<()>,
    /// Address the server is actually listening on
    pub addr: SocketAddr,
}

impl ServerHandle {
    /// Signal the server to shut down gracefully
    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}

async fn bind(host: &str, port: u16) -> anyhow::Result<TcpListener> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    Ok(TcpListener::bind(addr).await?)
}

/// Start the server in a background task, returning a handle for shutdown
pub async fn start_server(config: Config, host: &str, port: u16) -> anyhow::Result<ServerHandle> {
    let state = AppState::new(config)?;
    let listener = bind(host, port).await?;
    let addr = listener.local_addr()?;

    let purge = spawn_session_purge(&state);
    let app = create_router(state);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    // Spawn the server in a background task
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Received shutdown signal");
            })
            .await
            .ok();
        purge.abort();
    });

    tracing::info!("Server started on {}", addr);

    Ok(ServerHandle { shutdown_tx, addr })
}

/// Start the server and block until it shuts down (for CLI usage)
pub async fn run_server_blocking(config: Config, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(config)?;
    let listener = bind(host, port).await?;
    let addr = listener.local_addr()?;

    let purge = spawn_session_purge(&state);
    let app = create_router(state);

    tracing::info!("Server running on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Received Ctrl-C, shutting down");
        })
        .await?;
    purge.abort();

    Ok(())
}
