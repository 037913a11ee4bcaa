//! Token types returned by Google and handed to clients

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// An access token plus the moment it was stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// OAuth access token used as the Gmail bearer token
    pub access_token: String,

    /// Present when Google issued one (`access_type=offline`, `prompt=consent`)
    pub refresh_token: Option<String>,

    /// Lifetime Google reported, in seconds
    pub expires_in: i64,

    /// When the token was stored; expiry is measured from here
    pub issued_at: DateTime<Utc>,
}

impl TokenPair {
    /// A token is expired once strictly more than `ttl` has elapsed since it was stored
    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.issued_at > ttl
    }

    pub fn expires_at(&self, ttl: Duration) -> DateTime<Utc> {
        self.issued_at + ttl
    }
}

/// Response from Google's token endpoint
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    pub(crate) fn into_pair(self, issued_at: DateTime<Utc>) -> TokenPair {
        TokenPair {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_in: self.expires_in,
            issued_at,
        }
    }
}

/// Error response from Google's token endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct TokenErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}

/// Body returned by the code exchange endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
}

impl From<&TokenPair> for ExchangeResponse {
    fn from(pair: &TokenPair) -> Self {
        Self {
            access_token: pair.access_token.clone(),
            expires_in: pair.expires_in,
            refresh_token: pair.refresh_token.clone(),
        }
    }
}
