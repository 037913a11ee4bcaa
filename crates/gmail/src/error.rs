use thiserror::Error;

#[derive(Debug, Error)]
pub enum GmailError {
    /// The bearer token was rejected; the session holding it is no longer usable
    #[error("Authentication expired. Please log in again.")]
    Unauthorized,

    #[error("Gmail API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Gmail request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected Gmail response: {0}")]
    Decode(#[from] serde_json::Error),
}
