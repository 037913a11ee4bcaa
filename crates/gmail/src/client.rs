//! Gmail API HTTP client
//!
//! Every call is a single authenticated request against a static endpoint
//! template. A 401 surfaces as [`GmailError::Unauthorized`] so callers can drop
//! the session that owns the token.

use futures::future::try_join_all;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::compose::raw_message;
use crate::error::GmailError;
use crate::normalize::{self, DraftSummary, EmailDetail, EmailSummary};
use crate::types::{
    ApiErrorResponse, Draft, Label, ListDraftsResponse, ListLabelsResponse, ListMessagesResponse,
    Message, ModifyRequest, Profile,
};

/// Gmail API client bound to one access token
#[derive(Clone)]
pub struct GmailClient {
    http: Client,
    base_url: String,
    access_token: String,
}

impl GmailClient {
    pub fn new(base_url: &str, access_token: &str) -> Self {
        Self::with_http(Client::new(), base_url, access_token)
    }

    /// Reuses an existing connection pool
    pub fn with_http(http: Client, base_url: &str, access_token: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        }
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<String, GmailError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Gmail {} {}", method, path);

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(&self.access_token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::UNAUTHORIZED {
            return Err(GmailError::Unauthorized);
        }
        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown error")
                        .to_string()
                });
            error!("Gmail API error: {} ({})", status, message);
            return Err(GmailError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(text)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GmailError> {
        let text = self.send(Method::GET, path, None).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: Option<Value>) -> Result<T, GmailError> {
        let text = self.send(Method::POST, path, body).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn delete(&self, path: &str) -> Result<(), GmailError> {
        self.send(Method::DELETE, path, None).await.map(|_| ())
    }

    async fn modify(&self, id: &str, request: ModifyRequest) -> Result<Message, GmailError> {
        let body = serde_json::to_value(request)?;
        self.post_json(&format!("/users/me/messages/{}/modify", enc(id)), Some(body))
            .await
    }

    /// Lists the newest messages, optionally restricted to labels, and fetches each one
    ///
    /// Messages are fetched concurrently; the result keeps Gmail's list order.
    pub async fn fetch_emails(
        &self,
        max_results: u32,
        label_ids: &[String],
    ) -> Result<Vec<EmailSummary>, GmailError> {
        let mut path = format!("/users/me/messages?maxResults={}", max_results);
        for label in label_ids {
            path.push_str(&format!("&labelIds={}", enc(label)));
        }

        let list: ListMessagesResponse = self.get_json(&path).await?;
        let refs = list.messages.unwrap_or_default();
        if refs.is_empty() {
            return Ok(vec![]);
        }

        let messages = try_join_all(refs.iter().map(|r| self.get_message(&r.id))).await?;
        Ok(messages.iter().map(normalize::summarize).collect())
    }

    /// Lists a mailbox category such as `inbox`, `sent` or `trash`
    pub async fn emails_by_category(
        &self,
        category: &str,
        max_results: u32,
    ) -> Result<Vec<EmailSummary>, GmailError> {
        self.fetch_emails(max_results, &[normalize::category_label(category)])
            .await
    }

    /// The raw message resource in `full` format
    pub async fn get_message(&self, id: &str) -> Result<Message, GmailError> {
        self.get_json(&format!("/users/me/messages/{}?format=full", enc(id)))
            .await
    }

    /// A message with its headers flattened and its body decoded
    pub async fn get_email_details(&self, id: &str) -> Result<EmailDetail, GmailError> {
        let message = self.get_message(id).await?;
        Ok(normalize::detail(&message))
    }

    pub async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<Message, GmailError> {
        let payload = json!({ "raw": raw_message(to, subject, body) });
        self.post_json("/users/me/messages/send", Some(payload)).await
    }

    pub async fn trash_email(&self, id: &str) -> Result<Message, GmailError> {
        self.post_json(&format!("/users/me/messages/{}/trash", enc(id)), None)
            .await
    }

    pub async fn untrash_email(&self, id: &str) -> Result<Message, GmailError> {
        self.post_json(&format!("/users/me/messages/{}/untrash", enc(id)), None)
            .await
    }

    /// Permanently deletes a message, bypassing trash
    pub async fn delete_email(&self, id: &str) -> Result<(), GmailError> {
        self.delete(&format!("/users/me/messages/{}", enc(id))).await
    }

    pub async fn mark_as_read(&self, id: &str, read: bool) -> Result<Message, GmailError> {
        self.modify(id, ModifyRequest::toggle("UNREAD", !read)).await
    }

    pub async fn set_starred(&self, id: &str, starred: bool) -> Result<Message, GmailError> {
        self.modify(id, ModifyRequest::toggle("STARRED", starred)).await
    }

    pub async fn set_important(&self, id: &str, important: bool) -> Result<Message, GmailError> {
        self.modify(id, ModifyRequest::toggle("IMPORTANT", important))
            .await
    }

    /// Removes the message from the inbox
    pub async fn archive_email(&self, id: &str) -> Result<Message, GmailError> {
        self.modify(id, ModifyRequest::remove("INBOX")).await
    }

    pub async fn move_to_inbox(&self, id: &str) -> Result<Message, GmailError> {
        self.modify(id, ModifyRequest::add("INBOX")).await
    }

    pub async fn labels(&self) -> Result<Vec<Label>, GmailError> {
        let list: ListLabelsResponse = self.get_json("/users/me/labels").await?;
        Ok(list.labels)
    }

    pub async fn profile(&self) -> Result<Profile, GmailError> {
        self.get_json("/users/me/profile").await
    }

    /// Total messages in the inbox, 0 when Gmail omits the count
    pub async fn inbox_count(&self) -> Result<u64, GmailError> {
        let label: Label = self.get_json("/users/me/labels/INBOX").await?;
        Ok(label.messages_total.unwrap_or(0))
    }

    pub async fn create_draft(&self, to: &str, subject: &str, body: &str) -> Result<Draft, GmailError> {
        let payload = json!({ "message": { "raw": raw_message(to, subject, body) } });
        self.post_json("/users/me/drafts", Some(payload)).await
    }

    pub async fn list_drafts(&self, max_results: u32) -> Result<Vec<DraftSummary>, GmailError> {
        let list: ListDraftsResponse = self
            .get_json(&format!("/users/me/drafts?maxResults={}", max_results))
            .await?;
        let refs = list.drafts.unwrap_or_default();
        if refs.is_empty() {
            return Ok(vec![]);
        }

        let drafts = try_join_all(refs.iter().map(|d| async move {
            self.get_json::<Draft>(&format!("/users/me/drafts/{}", enc(&d.id)))
                .await
        }))
        .await?;

        Ok(drafts
            .iter()
            .map(|d| normalize::draft_summary(&d.id, d.message.as_ref()))
            .collect())
    }

    pub async fn delete_draft(&self, id: &str) -> Result<(), GmailError> {
        self.delete(&format!("/users/me/drafts/{}", enc(id))).await
    }

    pub async fn send_draft(&self, id: &str) -> Result<Message, GmailError> {
        self.post_json("/users/me/drafts/send", Some(json!({ "id": id })))
            .await
    }
}

fn enc(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn message_body(id: &str, labels: &[&str]) -> String {
        json!({
            "id": id,
            "threadId": format!("t-{}", id),
            "snippet": format!("snippet {}", id),
            "labelIds": labels,
            "payload": {"headers": [
                {"name": "From", "value": "Jane <jane@example.com>"},
                {"name": "Subject", "value": format!("Subject {}", id)}
            ]}
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_fetch_emails_keeps_list_order() {
        let mut server = mockito::Server::new_async().await;
        let _list = server
            .mock("GET", "/users/me/messages")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("maxResults".into(), "2".into()),
                Matcher::UrlEncoded("labelIds".into(), "INBOX".into()),
            ]))
            .match_header("authorization", "Bearer fake-token")
            .with_status(200)
            .with_body(r#"{"messages":[{"id":"b","threadId":"t-b"},{"id":"a","threadId":"t-a"}]}"#)
            .create_async()
            .await;
        let _b = server
            .mock("GET", "/users/me/messages/b")
            .match_query(Matcher::UrlEncoded("format".into(), "full".into()))
            .with_status(200)
            .with_body(message_body("b", &["INBOX", "UNREAD"]))
            .create_async()
            .await;
        let _a = server
            .mock("GET", "/users/me/messages/a")
            .match_query(Matcher::UrlEncoded("format".into(), "full".into()))
            .with_status(200)
            .with_body(message_body("a", &["INBOX", "STARRED"]))
            .create_async()
            .await;

        let client = GmailClient::new(&server.url(), "fake-token");
        let emails = client.emails_by_category("inbox", 2).await.unwrap();

        assert_eq!(emails.len(), 2);
        assert_eq!(emails[0].id, "b");
        assert!(!emails[0].read);
        assert_eq!(emails[1].id, "a");
        assert!(emails[1].starred);
        assert_eq!(emails[1].sender.email, "jane@example.com");
    }

    #[tokio::test]
    async fn test_fetch_emails_empty_mailbox() {
        let mut server = mockito::Server::new_async().await;
        let _list = server
            .mock("GET", "/users/me/messages")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"resultSizeEstimate":0}"#)
            .create_async()
            .await;

        let client = GmailClient::new(&server.url(), "fake-token");
        assert!(client.fetch_emails(20, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        let _profile = server
            .mock("GET", "/users/me/profile")
            .with_status(401)
            .with_body(r#"{"error":{"code":401,"message":"Invalid Credentials"}}"#)
            .create_async()
            .await;

        let client = GmailClient::new(&server.url(), "stale");
        assert!(matches!(client.profile().await, Err(GmailError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_api_error_message() {
        let mut server = mockito::Server::new_async().await;
        let _msg = server
            .mock("GET", "/users/me/messages/missing")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":404,"message":"Requested entity was not found."}}"#)
            .create_async()
            .await;

        let client = GmailClient::new(&server.url(), "fake-token");
        match client.get_email_details("missing").await {
            Err(GmailError::Api { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "Requested entity was not found.");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mark_as_read_removes_unread() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/users/me/messages/m1/modify")
            .match_body(Matcher::Json(json!({"removeLabelIds": ["UNREAD"]})))
            .with_status(200)
            .with_body(r#"{"id":"m1","threadId":"t1","labelIds":["INBOX"]}"#)
            .create_async()
            .await;

        let client = GmailClient::new(&server.url(), "fake-token");
        let msg = client.mark_as_read("m1", true).await.unwrap();
        assert!(!msg.has_label("UNREAD"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_email_posts_raw() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/users/me/messages/send")
            .match_body(Matcher::Json(json!({
                "raw": raw_message("bob@example.com", "Hi", "Hello")
            })))
            .with_status(200)
            .with_body(r#"{"id":"sent1","threadId":"t9","labelIds":["SENT"]}"#)
            .create_async()
            .await;

        let client = GmailClient::new(&server.url(), "fake-token");
        let sent = client.send_email("bob@example.com", "Hi", "Hello").await.unwrap();
        assert_eq!(sent.id, "sent1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_email_accepts_empty_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/users/me/messages/m1")
            .with_status(204)
            .create_async()
            .await;

        let client = GmailClient::new(&server.url(), "fake-token");
        client.delete_email("m1").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_inbox_count_defaults_to_zero() {
        let mut server = mockito::Server::new_async().await;
        let _label = server
            .mock("GET", "/users/me/labels/INBOX")
            .with_status(200)
            .with_body(r#"{"id":"INBOX","name":"INBOX","type":"system"}"#)
            .create_async()
            .await;

        let client = GmailClient::new(&server.url(), "fake-token");
        assert_eq!(client.inbox_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_drafts() {
        let mut server = mockito::Server::new_async().await;
        let _list = server
            .mock("GET", "/users/me/drafts")
            .match_query(Matcher::UrlEncoded("maxResults".into(), "10".into()))
            .with_status(200)
            .with_body(r#"{"drafts":[{"id":"d1","message":{"id":"m1","threadId":"t1"}}]}"#)
            .create_async()
            .await;
        let _draft = server
            .mock("GET", "/users/me/drafts/d1")
            .with_status(200)
            .with_body(
                r#"{"id":"d1","message":{"id":"m1","threadId":"t1","snippet":"draft text",
                   "payload":{"headers":[{"name":"To","value":"bob@example.com"}]}}}"#,
            )
            .create_async()
            .await;

        let client = GmailClient::new(&server.url(), "fake-token");
        let drafts = client.list_drafts(10).await.unwrap();

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].subject, "(No subject)");
        assert_eq!(drafts[0].to, "bob@example.com");
        assert_eq!(drafts[0].message_id.as_deref(), Some("m1"));
    }

    #[tokio::test]
    async fn test_truncated_body_is_transport_error() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Promises more bytes than it sends, then hangs up
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 100\r\n\r\n{\"emailAddress\"")
                .await
                .unwrap();
        });

        let client = GmailClient::new(&format!("http://{}", addr), "fake-token");
        let err = client.profile().await.unwrap_err();
        assert!(matches!(err, GmailError::Transport(_)), "got {:?}", err);
    }
}
