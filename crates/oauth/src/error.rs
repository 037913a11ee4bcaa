use thiserror::Error;

/// Failures talking to Google's token endpoint
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("token endpoint rejected the request ({status}): {error}")]
    Rejected {
        status: u16,
        error: String,
        description: Option<String>,
        /// Raw response body, forwarded to callers as error details
        body: String,
    },

    #[error("token endpoint unavailable ({status}) after {attempts} attempts")]
    Unavailable { status: u16, attempts: u32 },

    #[error("refresh token revoked or expired, sign in again")]
    Revoked,

    #[error("malformed token response: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl OAuthError {
    /// HTTP status reported by Google, if the request got that far
    pub fn status(&self) -> Option<u16> {
        match self {
            OAuthError::Rejected { status, .. } | OAuthError::Unavailable { status, .. } => {
                Some(*status)
            }
            OAuthError::Revoked => Some(400),
            _ => None,
        }
    }
}

/// Violations of the session lifecycle
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Invalid state parameter. Possible CSRF attack.")]
    StateMismatch,

    #[error("login attempt expired, start again")]
    LoginExpired,

    #[error("unknown session")]
    UnknownSession,

    #[error("session is {actual}, expected {expected}")]
    InvalidTransition {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("failed to persist sessions: {0}")]
    Storage(String),
}
