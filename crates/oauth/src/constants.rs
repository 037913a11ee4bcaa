//! OAuth constants for Google sign-in

/// Google OAuth authorization endpoint
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google OAuth token exchange endpoint
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// First retry delay for the code exchange, doubled on every attempt
pub const EXCHANGE_RETRY_BASE_MS: u64 = 200;
