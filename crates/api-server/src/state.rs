use std::sync::Arc;

use common::config::Config;
use gmail::GmailClient;
use oauth::{OAuthClient, OAuthFlow, SessionError, SessionManager};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Every browser session, pending or signed in
    pub sessions: Arc<SessionManager>,
    /// `None` when the Google client id or secret is not configured
    pub oauth: Option<OAuthFlow>,
    /// Connection pool shared by the per-request Gmail clients
    pub http: reqwest::Client,
}

impl AppState {
    /// Builds the state from config, loading persisted sessions if a storage path is set
    pub fn new(config: Config) -> Result<Self, SessionError> {
        let sessions = SessionManager::from_config(&config.session)?;
        Ok(Self::with_sessions(config, sessions))
    }

    pub fn with_sessions(config: Config, sessions: SessionManager) -> Self {
        let oauth = OAuthClient::from_config(&config).map(OAuthFlow::new);
        if oauth.is_none() {
            tracing::warn!("Google OAuth client id or secret missing; sign-in is disabled");
        }

        Self {
            config: Arc::new(config),
            sessions: Arc::new(sessions),
            oauth,
            http: reqwest::Client::new(),
        }
    }

    /// Gmail client acting with `access_token`
    pub fn gmail(&self, access_token: &str) -> GmailClient {
        GmailClient::with_http(self.http.clone(), &self.config.gmail.base_url, access_token)
    }

    pub fn auth_cookie(&self) -> &str {
        &self.config.session.cookie_name
    }

    pub fn state_cookie(&self) -> &str {
        &self.config.session.state_cookie_name
    }
}
