//! JSON API over the Gmail client, scoped to the caller's session

use axum::extract::{Json, Path, Query, State};
use gmail::{normalize, DraftSummary, EmailDetail, EmailSummary, GmailError};
use gmail::types::{Label, Profile};
use oauth::SessionView;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::auth::AuthSession;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Maps a Gmail result to a response; a rejected token ends the session
async fn respond<T>(
    state: &AppState,
    session: &SessionView,
    result: Result<T, GmailError>,
) -> ApiResult<T> {
    match result {
        Ok(value) => Ok(Json(value)),
        Err(GmailError::Unauthorized) => {
            warn!("Gmail rejected the session token, clearing session");
            state.sessions.clear(&session.session_id).await;
            Err(GmailError::Unauthorized.into())
        }
        Err(e) => {
            error!("Gmail request failed: {}", e);
            Err(e.into())
        }
    }
}

fn success() -> Value {
    json!({ "success": true })
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// inbox, sent, drafts, spam, trash, starred, important or a label id
    pub category: Option<String>,
    /// Comma separated label ids, used when no category is given
    pub labels: Option<String>,
    pub max_results: Option<u32>,
}

impl ListQuery {
    fn label_ids(&self) -> Vec<String> {
        self.labels
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect()
    }
}

pub async fn list_emails(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<EmailSummary>> {
    let max = query
        .max_results
        .unwrap_or(state.config.gmail.default_max_results);
    let gmail = state.gmail(&session.access_token);

    let result = match &query.category {
        Some(category) => gmail.emails_by_category(category, max).await,
        None => gmail.fetch_emails(max, &query.label_ids()).await,
    };
    respond(&state, &session, result).await
}

pub async fn get_email(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
) -> ApiResult<EmailDetail> {
    let result = state.gmail(&session.access_token).get_email_details(&id).await;
    respond(&state, &session, result).await
}

#[derive(Debug, Default, Deserialize)]
pub struct ComposeRequest {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

impl ComposeRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.to.trim().is_empty() {
            return Err(ApiError::BadRequest("Recipient is required".to_string()));
        }
        Ok(())
    }
}

pub async fn send_email(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    JsonBody(request): JsonBody<ComposeRequest>,
) -> ApiResult<Value> {
    request.validate()?;
    let result = state
        .gmail(&session.access_token)
        .send_email(&request.to, &request.subject, &request.body)
        .await
        .map(|m| json!({ "id": m.id, "threadId": m.thread_id }));
    respond(&state, &session, result).await
}

pub async fn trash_email(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
) -> ApiResult<EmailSummary> {
    let result = state.gmail(&session.access_token).trash_email(&id).await;
    respond(&state, &session, result.map(|m| normalize::summarize(&m))).await
}

pub async fn untrash_email(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
) -> ApiResult<EmailSummary> {
    let result = state.gmail(&session.access_token).untrash_email(&id).await;
    respond(&state, &session, result.map(|m| normalize::summarize(&m))).await
}

pub async fn delete_email(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let result = state.gmail(&session.access_token).delete_email(&id).await;
    respond(&state, &session, result.map(|_| success())).await
}

/// Body of the flag toggles; an empty object sets the flag
#[derive(Debug, Deserialize)]
pub struct FlagRequest {
    #[serde(default = "default_flag")]
    pub value: bool,
}

fn default_flag() -> bool {
    true
}

impl Default for FlagRequest {
    fn default() -> Self {
        Self {
            value: default_flag(),
        }
    }
}

pub async fn mark_read(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
    JsonBody(flag): JsonBody<FlagRequest>,
) -> ApiResult<EmailSummary> {
    let result = state.gmail(&session.access_token).mark_as_read(&id, flag.value).await;
    respond(&state, &session, result.map(|m| normalize::summarize(&m))).await
}

pub async fn set_starred(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
    JsonBody(flag): JsonBody<FlagRequest>,
) -> ApiResult<EmailSummary> {
    let result = state.gmail(&session.access_token).set_starred(&id, flag.value).await;
    respond(&state, &session, result.map(|m| normalize::summarize(&m))).await
}

pub async fn set_important(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
    JsonBody(flag): JsonBody<FlagRequest>,
) -> ApiResult<EmailSummary> {
    let result = state.gmail(&session.access_token).set_important(&id, flag.value).await;
    respond(&state, &session, result.map(|m| normalize::summarize(&m))).await
}

pub async fn archive_email(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
) -> ApiResult<EmailSummary> {
    let result = state.gmail(&session.access_token).archive_email(&id).await;
    respond(&state, &session, result.map(|m| normalize::summarize(&m))).await
}

pub async fn move_to_inbox(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
) -> ApiResult<EmailSummary> {
    let result = state.gmail(&session.access_token).move_to_inbox(&id).await;
    respond(&state, &session, result.map(|m| normalize::summarize(&m))).await
}

pub async fn labels(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> ApiResult<Vec<Label>> {
    let result = state.gmail(&session.access_token).labels().await;
    respond(&state, &session, result).await
}

pub async fn profile(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> ApiResult<Profile> {
    let result = state.gmail(&session.access_token).profile().await;
    respond(&state, &session, result).await
}

pub async fn inbox_count(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> ApiResult<Value> {
    let result = state
        .gmail(&session.access_token)
        .inbox_count()
        .await
        .map(|count| json!({ "count": count }));
    respond(&state, &session, result).await
}

#[derive(Debug, Default, Deserialize)]
pub struct DraftsQuery {
    pub max_results: Option<u32>,
}

pub async fn list_drafts(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Query(query): Query<DraftsQuery>,
) -> ApiResult<Vec<DraftSummary>> {
    let max = query
        .max_results
        .unwrap_or(state.config.gmail.default_max_results);
    let result = state.gmail(&session.access_token).list_drafts(max).await;
    respond(&state, &session, result).await
}

pub async fn create_draft(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    JsonBody(request): JsonBody<ComposeRequest>,
) -> ApiResult<Value> {
    request.validate()?;
    let result = state
        .gmail(&session.access_token)
        .create_draft(&request.to, &request.subject, &request.body)
        .await
        .map(|d| json!({ "id": d.id }));
    respond(&state, &session, result).await
}

pub async fn delete_draft(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let result = state.gmail(&session.access_token).delete_draft(&id).await;
    respond(&state, &session, result.map(|_| success())).await
}

pub async fn send_draft(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let result = state
        .gmail(&session.access_token)
        .send_draft(&id)
        .await
        .map(|m| json!({ "id": m.id, "threadId": m.thread_id }));
    respond(&state, &session, result).await
}
