//! Flattening of Gmail message resources into what the mail views display

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::types::{Message, MessagePart};

/// Gmail bodies are URL-safe base64, sometimes padded, sometimes not
const BODY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sender {
    pub name: String,
    pub email: String,
    pub avatar: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSummary {
    pub id: String,
    pub thread_id: String,
    pub read: bool,
    pub starred: bool,
    pub important: bool,
    pub sender: Sender,
    pub subject: String,
    pub snippet: String,
    pub date: Option<DateTime<Utc>>,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailDetail {
    #[serde(flatten)]
    pub summary: EmailSummary,
    pub to: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSummary {
    pub id: String,
    pub message_id: Option<String>,
    pub thread_id: Option<String>,
    pub snippet: String,
    pub subject: String,
    pub to: String,
}

/// Maps a mailbox category name to its system label id
///
/// Unknown categories are passed through untouched so user labels work too.
pub fn category_label(category: &str) -> String {
    match category.to_lowercase().as_str() {
        "inbox" => "INBOX",
        "sent" => "SENT",
        "drafts" => "DRAFT",
        "spam" => "SPAM",
        "trash" => "TRASH",
        "starred" => "STARRED",
        "important" => "IMPORTANT",
        _ => return category.to_string(),
    }
    .to_string()
}

/// Value of the first header named exactly `name`
pub fn header<'a>(message: &'a Message, name: &str) -> Option<&'a str> {
    message
        .payload
        .as_ref()?
        .headers
        .as_ref()?
        .iter()
        .find(|h| h.name == name)
        .map(|h| h.value.as_str())
}

/// Splits `Name <address>` into its parts; anything else is used as both
pub fn parse_sender(from: &str) -> (String, String) {
    if let (Some(start), Some(end)) = (from.find('<'), from.rfind('>')) {
        if end > start + 1 {
            let email = from[start + 1..end].trim().to_string();
            let name = from[..start].trim().trim_matches('"').trim().to_string();
            let name = if name.is_empty() { email.clone() } else { name };
            return (name, email);
        }
    }
    (from.to_string(), from.to_string())
}

pub fn avatar_url(name: &str) -> String {
    format!(
        "https://ui-avatars.com/api/?name={}&background=random",
        urlencoding::encode(name)
    )
}

/// Parses the `Date` header, falling back to Gmail's `internalDate`
pub fn message_date(message: &Message) -> Option<DateTime<Utc>> {
    header(message, "Date")
        .and_then(parse_rfc2822)
        .or_else(|| {
            let millis = message.internal_date.as_ref()?.parse::<i64>().ok()?;
            Utc.timestamp_millis_opt(millis).single()
        })
}

fn parse_rfc2822(value: &str) -> Option<DateTime<Utc>> {
    // Drop trailing comments such as "(UTC)" or "(PDT)"
    let value = match value.find(" (") {
        Some(idx) => &value[..idx],
        None => value,
    };
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

pub fn decode_body(data: &str) -> Option<String> {
    BODY_ENGINE
        .decode(data)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}

/// Extract the body from the Gmail API message payload.
///
/// - A simple message carries `payload.body.data`
/// - Multipart messages carry `parts[].body.data`, possibly nested; HTML is
///   preferred over plain text
/// - Parts with a `body.attachment_id` are attachments and are skipped
pub fn extract_body(message: &Message) -> String {
    let Some(payload) = &message.payload else {
        return String::new();
    };

    if let Some(data) = payload.body.as_ref().and_then(|b| b.data.as_ref()) {
        if let Some(body) = decode_body(data) {
            return body;
        }
        tracing::error!("Base64 decode failed for message {}", message.id);
    }

    let parts = payload.parts.as_deref().unwrap_or_default();
    find_part(parts, "text/html")
        .or_else(|| find_part(parts, "text/plain"))
        .unwrap_or_default()
}

fn find_part(parts: &[MessagePart], mime_type: &str) -> Option<String> {
    for part in parts {
        if part.mime_type.as_deref() == Some(mime_type) {
            if let Some(body) = &part.body {
                if body.attachment_id.is_some() {
                    continue;
                }
                if let Some(text) = body.data.as_deref().and_then(decode_body) {
                    return Some(text);
                }
            }
        }
        if let Some(nested) = &part.parts {
            if let Some(text) = find_part(nested, mime_type) {
                return Some(text);
            }
        }
    }
    None
}

pub fn summarize(message: &Message) -> EmailSummary {
    let from = header(message, "From").unwrap_or_default();
    let (name, email) = parse_sender(from);

    EmailSummary {
        id: message.id.clone(),
        thread_id: message.thread_id.clone(),
        read: !message.has_label("UNREAD"),
        starred: message.has_label("STARRED"),
        important: message.has_label("IMPORTANT"),
        sender: Sender {
            avatar: avatar_url(&name),
            name,
            email,
        },
        subject: header(message, "Subject").unwrap_or_default().to_string(),
        snippet: message.snippet.clone().unwrap_or_default(),
        date: message_date(message),
        labels: message.label_ids.clone().unwrap_or_default(),
    }
}

pub fn detail(message: &Message) -> EmailDetail {
    EmailDetail {
        summary: summarize(message),
        to: header(message, "To").unwrap_or_default().to_string(),
        body: extract_body(message),
    }
}

pub fn draft_summary(draft_id: &str, message: Option<&Message>) -> DraftSummary {
    DraftSummary {
        id: draft_id.to_string(),
        message_id: message.map(|m| m.id.clone()),
        thread_id: message.map(|m| m.thread_id.clone()),
        snippet: message
            .and_then(|m| m.snippet.clone())
            .unwrap_or_default(),
        subject: message
            .and_then(|m| header(m, "Subject"))
            .unwrap_or("(No subject)")
            .to_string(),
        to: message
            .and_then(|m| header(m, "To"))
            .unwrap_or_default()
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn message(json: serde_json::Value) -> Message {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_parse_sender() {
        assert_eq!(
            parse_sender("Jane Doe <jane@example.com>"),
            ("Jane Doe".to_string(), "jane@example.com".to_string())
        );
        assert_eq!(
            parse_sender("\"Doe, Jane\" <jane@example.com>"),
            ("Doe, Jane".to_string(), "jane@example.com".to_string())
        );
        assert_eq!(
            parse_sender("<jane@example.com>"),
            ("jane@example.com".to_string(), "jane@example.com".to_string())
        );
        assert_eq!(
            parse_sender("jane@example.com"),
            ("jane@example.com".to_string(), "jane@example.com".to_string())
        );
    }

    #[test]
    fn test_category_label() {
        assert_eq!(category_label("Inbox"), "INBOX");
        assert_eq!(category_label("drafts"), "DRAFT");
        assert_eq!(category_label("Label_42"), "Label_42");
    }

    #[test]
    fn test_summarize() {
        let msg = message(serde_json::json!({
            "id": "m1",
            "threadId": "t1",
            "snippet": "Hello there",
            "labelIds": ["INBOX", "UNREAD", "IMPORTANT"],
            "internalDate": "1700000000000",
            "payload": {
                "headers": [
                    {"name": "From", "value": "Jane Doe <jane@example.com>"},
                    {"name": "Subject", "value": "Lunch?"},
                    {"name": "Date", "value": "Tue, 14 Nov 2023 22:13:20 +0000 (UTC)"}
                ]
            }
        }));

        let summary = summarize(&msg);
        assert!(!summary.read);
        assert!(!summary.starred);
        assert!(summary.important);
        assert_eq!(summary.sender.name, "Jane Doe");
        assert_eq!(
            summary.sender.avatar,
            "https://ui-avatars.com/api/?name=Jane%20Doe&background=random"
        );
        assert_eq!(summary.subject, "Lunch?");
        assert_eq!(summary.date.unwrap().timestamp(), 1_700_000_000);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["threadId"], "t1");
    }

    #[test]
    fn test_date_falls_back_to_internal_date() {
        let msg = message(serde_json::json!({
            "id": "m1",
            "threadId": "t1",
            "internalDate": "1700000000000",
            "payload": {"headers": [{"name": "Date", "value": "garbage"}]}
        }));
        assert_eq!(message_date(&msg).unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_extract_body_prefers_html_in_nested_parts() {
        let html = URL_SAFE_NO_PAD.encode("<p>hi</p>");
        let text = URL_SAFE_NO_PAD.encode("hi");
        let msg = message(serde_json::json!({
            "id": "m1",
            "threadId": "t1",
            "payload": {
                "mimeType": "multipart/mixed",
                "parts": [
                    {"mimeType": "text/plain", "body": {"size": 2, "data": text}},
                    {"mimeType": "multipart/alternative", "parts": [
                        {"mimeType": "text/html", "body": {"size": 9, "data": html}}
                    ]},
                    {"mimeType": "text/html", "filename": "a.html",
                     "body": {"size": 100, "attachmentId": "att"}}
                ]
            }
        }));
        assert_eq!(extract_body(&msg), "<p>hi</p>");
    }

    #[test]
    fn test_extract_body_padded_data() {
        let msg = message(serde_json::json!({
            "id": "m1",
            "threadId": "t1",
            "payload": {"body": {"size": 1, "data": "YQ=="}}
        }));
        assert_eq!(extract_body(&msg), "a");
    }

    #[test]
    fn test_draft_summary_defaults() {
        let draft = draft_summary("d1", None);
        assert_eq!(draft.subject, "(No subject)");
        assert_eq!(draft.to, "");
        assert!(draft.message_id.is_none());
    }
}
