//! OAuth 2.0 Authorization Code flow with PKCE
//!
//! Implements the server side of Google sign-in:
//! 1. Generate a CSRF state and PKCE code verifier/challenge
//! 2. Build the authorization URL the browser is sent to
//! 3. Exchange the returned authorization code for tokens, retrying transient failures
//! 4. Refresh access tokens when a refresh token is available

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use common::config::{Config, Credentials};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::constants::*;
use crate::error::OAuthError;
use crate::tokens::{TokenErrorResponse, TokenPair, TokenResponse};

/// Generates a cryptographically secure state parameter
pub fn generate_state() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generates PKCE code verifier and challenge
///
/// Returns (verifier, challenge) tuple
pub fn generate_pkce() -> (String, String) {
    let verifier: [u8; 32] = rand::thread_rng().gen();
    let verifier_str = URL_SAFE_NO_PAD.encode(verifier);
    let challenge = pkce_challenge(&verifier_str);
    (verifier_str, challenge)
}

/// S256 challenge for a verifier
pub fn pkce_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Registration details of the Google OAuth client
#[derive(Debug, Clone)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
    /// Total tries for a code exchange, including the first
    pub max_attempts: u32,
    pub retry_base: Duration,
}

impl OAuthClient {
    /// Client against Google's production endpoints with the Gmail scopes
    pub fn new(credentials: Credentials) -> Self {
        Self {
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
            redirect_uri: credentials.redirect_uri,
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            scopes: common::config::DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            max_attempts: 3,
            retry_base: Duration::from_millis(EXCHANGE_RETRY_BASE_MS),
        }
    }

    /// Builds the client from config; `None` when credentials are missing
    pub fn from_config(config: &Config) -> Option<Self> {
        let credentials = config.credentials()?;
        Some(Self {
            auth_url: config.google.auth_url.clone(),
            token_url: config.google.token_url.clone(),
            scopes: config.google.scopes.clone(),
            max_attempts: config.session.exchange_attempts.max(1),
            ..Self::new(credentials)
        })
    }
}

/// Drives the authorization-code exchange against one OAuth client
#[derive(Clone)]
pub struct OAuthFlow {
    client: OAuthClient,
    http: reqwest::Client,
}

impl OAuthFlow {
    pub fn new(client: OAuthClient) -> Self {
        Self {
            client,
            http: reqwest::Client::new(),
        }
    }

    pub fn client(&self) -> &OAuthClient {
        &self.client
    }

    /// Returns the authorization URL to send the browser to
    pub fn authorization_url(&self, state: &str, code_challenge: Option<&str>) -> String {
        let scopes = self.client.scopes.join(" ");
        let mut url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
            self.client.auth_url,
            urlencoding::encode(&self.client.client_id),
            urlencoding::encode(&self.client.redirect_uri),
            urlencoding::encode(&scopes),
            urlencoding::encode(state),
        );
        if let Some(challenge) = code_challenge {
            url.push_str(&format!(
                "&code_challenge={}&code_challenge_method=S256",
                challenge
            ));
        }
        url
    }

    /// Exchanges the authorization code for tokens
    ///
    /// Transport errors and 5xx responses are retried with exponential backoff.
    /// A 4xx (e.g. an already used code) is returned at once.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenPair, OAuthError> {
        info!("Exchanging authorization code for tokens");

        let mut params = vec![
            ("code", code),
            ("client_id", self.client.client_id.as_str()),
            ("client_secret", self.client.client_secret.as_str()),
            ("redirect_uri", self.client.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        if let Some(verifier) = code_verifier {
            params.push(("code_verifier", verifier));
        }

        let attempts = self.client.max_attempts.max(1);
        let mut delay = self.client.retry_base;
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.request_token(&params).await {
                Ok(token) => {
                    info!("Token exchange successful");
                    return Ok(token);
                }
                Err(e) if is_retryable(&e) => {
                    warn!("Token exchange attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }

            if attempt < attempts {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }

        Err(match last_error {
            Some(OAuthError::Unavailable { status, .. }) => {
                OAuthError::Unavailable { status, attempts }
            }
            Some(e) => e,
            None => OAuthError::Unavailable { status: 0, attempts },
        })
    }

    /// Refreshes an access token using a refresh token
    ///
    /// Google does not always rotate the refresh token, so the original one is kept
    /// when the response omits it.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, OAuthError> {
        let params = [
            ("client_id", self.client.client_id.as_str()),
            ("client_secret", self.client.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        match self.request_token(&params).await {
            Ok(mut token) => {
                if token.refresh_token.is_none() {
                    token.refresh_token = Some(refresh_token.to_string());
                }
                Ok(token)
            }
            Err(OAuthError::Rejected { error, .. }) if error == "invalid_grant" => {
                Err(OAuthError::Revoked)
            }
            Err(e) => Err(e),
        }
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> Result<TokenPair, OAuthError> {
        let response = self
            .http
            .post(&self.client.token_url)
            .form(params)
            .send()
            .await?;

        let status = response.status();
        debug!("Google OAuth response status: {}", status);
        let text = response.text().await?;

        if status.is_server_error() {
            return Err(OAuthError::Unavailable {
                status: status.as_u16(),
                attempts: 1,
            });
        }

        if !status.is_success() {
            let (error, description) = match serde_json::from_str::<TokenErrorResponse>(&text) {
                Ok(resp) => (resp.error, resp.error_description),
                Err(_) => (status.to_string(), None),
            };
            return Err(OAuthError::Rejected {
                status: status.as_u16(),
                error,
                description,
                body: text,
            });
        }

        let token: TokenResponse = serde_json::from_str(&text)?;
        Ok(token.into_pair(Utc::now()))
    }
}

fn is_retryable(err: &OAuthError) -> bool {
    matches!(err, OAuthError::Transport(_) | OAuthError::Unavailable { .. })
}
