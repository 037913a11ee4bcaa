//! Session lifecycle for signed-in browsers
//!
//! A session moves through `pending -> exchanging -> authenticated` and ends
//! either `expired` (its token outlived the TTL) or `cleared` (logout, a
//! failed exchange or a new login). Terminal sessions are dropped from the
//! map, so a lookup of an ended session reports `Expired` once and `Missing`
//! afterwards.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use common::config::SessionConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::SessionError;
use crate::flow::{generate_pkce, generate_state};
use crate::storage::{SessionStorage, StoredSession};
use crate::tokens::TokenPair;

/// Profile details remembered alongside the token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub email: String,
    pub messages_total: Option<u64>,
    pub threads_total: Option<u64>,
}

#[derive(Debug, Clone)]
enum Session {
    Pending {
        state: String,
        code_verifier: String,
        created_at: DateTime<Utc>,
    },
    Exchanging,
    Authenticated {
        token: TokenPair,
        user: Option<UserInfo>,
    },
}

impl Session {
    fn name(&self) -> &'static str {
        match self {
            Session::Pending { .. } => "pending",
            Session::Exchanging => "exchanging",
            Session::Authenticated { .. } => "authenticated",
        }
    }
}

/// A login that has been sent to Google and awaits its callback
#[derive(Debug, Clone)]
pub struct PendingLogin {
    pub session_id: String,
    pub state: String,
    pub code_challenge: String,
}

/// Permission to run the code exchange for a session
#[derive(Debug, Clone)]
pub struct ExchangeTicket {
    pub session_id: String,
    pub code_verifier: Option<String>,
}

/// Read-only snapshot of an authenticated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub session_id: String,
    pub access_token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub user: Option<UserInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Authenticated(SessionView),
    /// Login started but not finished
    InProgress,
    /// The token outlived the TTL; the session has now been cleared
    Expired,
    Missing,
}

impl SessionStatus {
    pub fn authenticated(self) -> Option<SessionView> {
        match self {
            SessionStatus::Authenticated(view) => Some(view),
            _ => None,
        }
    }
}

/// Generates an opaque, unguessable session id
fn generate_session_id() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Tracks every session and persists the authenticated ones
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    storage: Option<SessionStorage>,
    ttl: Duration,
    pending_ttl: Duration,
}

impl SessionManager {
    /// Creates an in-memory manager
    pub fn new(ttl: Duration, pending_ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            storage: None,
            ttl,
            pending_ttl,
        }
    }

    /// Creates a manager from config, loading persisted sessions when a path is set
    pub fn from_config(config: &SessionConfig) -> Result<Self, SessionError> {
        let manager = Self::new(
            Duration::seconds(config.ttl_secs),
            Duration::seconds(config.pending_ttl_secs),
        );
        match &config.storage_path {
            Some(path) => manager.with_storage(SessionStorage::new(path)),
            None => Ok(manager),
        }
    }

    /// Attaches persistent storage and loads the sessions that are still live
    pub fn with_storage(mut self, storage: SessionStorage) -> Result<Self, SessionError> {
        let stored = storage.load()?;
        let now = Utc::now();
        let ttl = self.ttl;

        let mut sessions = HashMap::new();
        for s in stored.sessions {
            let token = s.token();
            if token.is_expired_at(now, ttl) {
                debug!("Skipping expired stored session");
                continue;
            }
            sessions.insert(
                s.session_id.clone(),
                Session::Authenticated {
                    token,
                    user: s.user.clone(),
                },
            );
        }

        info!("Loaded {} sessions from {:?}", sessions.len(), storage.path());
        self.sessions = Arc::new(RwLock::new(sessions));
        self.storage = Some(storage);
        Ok(self)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Starts a login: a fresh session holding the CSRF state and PKCE verifier
    pub async fn begin_login(&self) -> PendingLogin {
        let session_id = generate_session_id();
        let state = generate_state();
        let (code_verifier, code_challenge) = generate_pkce();

        self.sessions.write().await.insert(
            session_id.clone(),
            Session::Pending {
                state: state.clone(),
                code_verifier,
                created_at: Utc::now(),
            },
        );
        debug!("Login started");

        PendingLogin {
            session_id,
            state,
            code_challenge,
        }
    }

    /// Validates the callback against the pending login and moves it to `exchanging`
    ///
    /// The pending state is consumed whatever the outcome, so a callback URL
    /// cannot be replayed.
    pub async fn begin_exchange(
        &self,
        session_id: &str,
        returned_state: Option<&str>,
    ) -> Result<ExchangeTicket, SessionError> {
        self.begin_exchange_at(session_id, returned_state, Utc::now())
            .await
    }

    pub async fn begin_exchange_at(
        &self,
        session_id: &str,
        returned_state: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ExchangeTicket, SessionError> {
        let mut sessions = self.sessions.write().await;

        let session = sessions
            .remove(session_id)
            .ok_or(SessionError::UnknownSession)?;

        let (state, code_verifier, created_at) = match session {
            Session::Pending {
                state,
                code_verifier,
                created_at,
            } => (state, code_verifier, created_at),
            other => {
                let actual = other.name();
                sessions.insert(session_id.to_string(), other);
                return Err(SessionError::InvalidTransition {
                    expected: "pending",
                    actual,
                });
            }
        };

        if let Some(returned) = returned_state {
            if returned != state {
                warn!("OAuth callback received with invalid state");
                return Err(SessionError::StateMismatch);
            }
        }

        if now - created_at > self.pending_ttl {
            warn!("OAuth callback arrived after the login window closed");
            return Err(SessionError::LoginExpired);
        }

        sessions.insert(session_id.to_string(), Session::Exchanging);

        Ok(ExchangeTicket {
            session_id: session_id.to_string(),
            code_verifier: Some(code_verifier),
        })
    }

    /// Finishes a successful exchange: `exchanging -> authenticated`
    pub async fn complete(&self, session_id: &str, token: TokenPair) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;

        match sessions.get(session_id) {
            Some(Session::Exchanging) => {}
            Some(other) => {
                return Err(SessionError::InvalidTransition {
                    expected: "exchanging",
                    actual: other.name(),
                })
            }
            None => return Err(SessionError::UnknownSession),
        }

        self.persist(StoredSession::new(session_id, &token, None))
            .await;
        sessions.insert(
            session_id.to_string(),
            Session::Authenticated { token, user: None },
        );
        info!("Session authenticated");
        Ok(())
    }

    /// Abandons a failed exchange: `exchanging -> cleared`
    pub async fn fail(&self, session_id: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(Session::Exchanging) = sessions.get(session_id) {
            sessions.remove(session_id);
            warn!("Token exchange failed, session cleared");
        }
    }

    /// Registers a token obtained outside the redirect flow and returns its session id
    pub async fn authenticate_direct(&self, token: TokenPair) -> String {
        let session_id = generate_session_id();
        let mut sessions = self.sessions.write().await;
        self.persist(StoredSession::new(&session_id, &token, None))
            .await;
        sessions.insert(session_id.clone(), Session::Authenticated { token, user: None });
        drop(sessions);
        info!("Session authenticated from a supplied token");
        session_id
    }

    /// Looks a session up, expiring it if its token is past the TTL
    pub async fn lookup(&self, session_id: &str) -> SessionStatus {
        self.lookup_at(session_id, Utc::now()).await
    }

    pub async fn lookup_at(&self, session_id: &str, now: DateTime<Utc>) -> SessionStatus {
        {
            let sessions = self.sessions.read().await;
            match sessions.get(session_id) {
                None => return SessionStatus::Missing,
                Some(Session::Pending { .. }) | Some(Session::Exchanging) => {
                    return SessionStatus::InProgress
                }
                Some(Session::Authenticated { token, user }) => {
                    if !token.is_expired_at(now, self.ttl) {
                        return SessionStatus::Authenticated(SessionView {
                            session_id: session_id.to_string(),
                            access_token: token.access_token.clone(),
                            issued_at: token.issued_at,
                            expires_at: token.expires_at(self.ttl),
                            user: user.clone(),
                        });
                    }
                }
            }
        }

        // Expired: drop it under the write lock
        info!("Session token expired");
        self.remove(session_id).await;
        SessionStatus::Expired
    }

    /// Remembers the signed-in user's profile
    pub async fn store_user_info(&self, session_id: &str, info: UserInfo) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(Session::Authenticated { token, user }) => {
                *user = Some(info.clone());
                let stored = StoredSession::new(session_id, token, Some(info));
                self.persist(stored).await;
                Ok(())
            }
            Some(other) => Err(SessionError::InvalidTransition {
                expected: "authenticated",
                actual: other.name(),
            }),
            None => Err(SessionError::UnknownSession),
        }
    }

    pub async fn user_info(&self, session_id: &str) -> Option<UserInfo> {
        match self.sessions.read().await.get(session_id) {
            Some(Session::Authenticated { user, .. }) => user.clone(),
            _ => None,
        }
    }

    /// Clears a session and everything stored with it; returns whether it existed
    pub async fn clear(&self, session_id: &str) -> bool {
        let existed = self.remove(session_id).await;
        if existed {
            info!("Session cleared");
        }
        existed
    }

    /// Drops expired sessions and abandoned logins
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now()).await
    }

    pub async fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl;
        let pending_ttl = self.pending_ttl;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|_, session| match session {
            Session::Authenticated { token, .. } => !token.is_expired_at(now, ttl),
            Session::Pending { created_at, .. } => now - *created_at <= pending_ttl,
            Session::Exchanging => true,
        });
        let removed = before - sessions.len();

        self.write_storage("purge stored sessions", move |storage| {
            storage
                .retain(|s| !s.token().is_expired_at(now, ttl))
                .map(|_| ())
        })
        .await;
        drop(sessions);

        if removed > 0 {
            debug!("Purged {} sessions", removed);
        }
        removed
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn remove(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let existed = sessions.remove(session_id).is_some();
        let id = session_id.to_string();
        self.write_storage("remove stored session", move |storage| {
            storage.remove(&id).map(|_| ())
        })
        .await;
        existed
    }

    async fn persist(&self, session: StoredSession) {
        self.write_storage("persist session", move |storage| storage.upsert(session))
            .await;
    }

    /// Runs a file change on the blocking pool.
    ///
    /// Callers hold the `sessions` write guard across this call, which keeps
    /// the file's read-modify-write cycles from overlapping.
    async fn write_storage<F>(&self, action: &'static str, change: F)
    where
        F: FnOnce(&SessionStorage) -> Result<(), SessionError> + Send + 'static,
    {
        let Some(storage) = self.storage.clone() else {
            return;
        };
        match tokio::task::spawn_blocking(move || change(&storage)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Failed to {}: {}", action, e),
            Err(e) => error!("Failed to {}: storage task failed: {}", action, e),
        }
    }
}
