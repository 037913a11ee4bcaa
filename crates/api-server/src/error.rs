use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gmail::GmailError;
use oauth::OAuthError;
use serde_json::{json, Value};

/// Errors returned by the JSON API
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// No live session, or Gmail rejected the session's token
    Unauthorized(String),
    /// Google client credentials are not configured
    NotConfigured,
    /// Google answered with an error status
    Upstream {
        status: u16,
        message: String,
        details: Option<Value>,
    },
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotConfigured | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "invalid_request_error",
            ApiError::Unauthorized(_) => "authentication_error",
            ApiError::NotConfigured => "configuration_error",
            ApiError::Upstream { .. } => "upstream_error",
            ApiError::Internal(_) => "api_error",
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(m) | ApiError::Unauthorized(m) | ApiError::Internal(m) => m,
            ApiError::NotConfigured => "Server configuration error",
            ApiError::Upstream { message, .. } => message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut error = json!({
            "message": self.message(),
            "type": self.kind(),
        });
        if let ApiError::Upstream {
            details: Some(details),
            ..
        } = &self
        {
            error["details"] = details.clone();
        }

        (self.status(), Json(json!({ "error": error }))).into_response()
    }
}

impl From<OAuthError> for ApiError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::Rejected { status, body, .. } => ApiError::Upstream {
                status,
                message: "Failed to exchange code for token".to_string(),
                details: Some(serde_json::from_str(&body).unwrap_or(Value::String(body))),
            },
            OAuthError::Unavailable { status, .. } => ApiError::Upstream {
                status,
                message: "Failed to exchange code for token".to_string(),
                details: None,
            },
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<GmailError> for ApiError {
    fn from(err: GmailError) -> Self {
        match err {
            GmailError::Unauthorized => ApiError::Unauthorized(err.to_string()),
            GmailError::Api { status, message } => ApiError::Upstream {
                status,
                message,
                details: None,
            },
            other => ApiError::Internal(other.to_string()),
        }
    }
}
