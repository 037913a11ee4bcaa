//! Resource shapes from the Gmail API documentation

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRef {
    pub id: String,
    #[serde(rename = "threadId", default)]
    pub thread_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesResponse {
    pub messages: Option<Vec<MessageRef>>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
    #[serde(rename = "resultSizeEstimate")]
    pub result_size_estimate: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "threadId", default)]
    pub thread_id: String,
    pub snippet: Option<String>,
    pub payload: Option<MessagePart>,
    #[serde(rename = "labelIds")]
    pub label_ids: Option<Vec<String>>,
    /// Epoch milliseconds, as a string
    #[serde(rename = "internalDate")]
    pub internal_date: Option<String>,
}

impl Message {
    pub fn has_label(&self, label: &str) -> bool {
        self.label_ids
            .as_ref()
            .is_some_and(|ids| ids.iter().any(|l| l == label))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePartBody {
    #[serde(rename = "attachmentId")]
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub size: u64,
    // Base64 encoded
    pub data: Option<String>,
}

/// The payload and each of its parts share this shape; multipart bodies nest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePart {
    #[serde(rename = "partId")]
    pub part_id: Option<String>,
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,
    pub filename: Option<String>,
    pub headers: Option<Vec<MessageHeader>>,
    pub body: Option<MessagePartBody>,
    pub parts: Option<Vec<MessagePart>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub label_type: Option<String>,
    pub messages_total: Option<u64>,
    pub messages_unread: Option<u64>,
    pub threads_total: Option<u64>,
    pub threads_unread: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ListLabelsResponse {
    #[serde(default)]
    pub labels: Vec<Label>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub email_address: String,
    pub messages_total: Option<u64>,
    pub threads_total: Option<u64>,
    pub history_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub id: String,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct DraftRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListDraftsResponse {
    pub drafts: Option<Vec<DraftRef>>,
}

/// Body of `messages/{id}/modify`
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_label_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_label_ids: Vec<String>,
}

impl ModifyRequest {
    pub fn add(label: &str) -> Self {
        Self {
            add_label_ids: vec![label.to_string()],
            ..Default::default()
        }
    }

    pub fn remove(label: &str) -> Self {
        Self {
            remove_label_ids: vec![label.to_string()],
            ..Default::default()
        }
    }

    /// Adds `label` when `on`, removes it otherwise
    pub fn toggle(label: &str, on: bool) -> Self {
        if on {
            Self::add(label)
        } else {
            Self::remove(label)
        }
    }
}

/// Google's JSON error envelope
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub message: String,
}
