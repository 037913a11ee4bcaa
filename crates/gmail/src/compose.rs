//! RFC 822 message construction for `messages/send` and drafts

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};

/// Header values may not carry line breaks
fn header_value(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// RFC 2047 encoded-word for non-ASCII header text
fn encode_header_text(value: &str) -> String {
    let value = header_value(value);
    if value.is_ascii() {
        value
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

/// Builds an HTML message with CRLF line endings
pub fn build_message(to: &str, subject: &str, body: &str) -> String {
    [
        "Content-Type: text/html; charset=utf-8".to_string(),
        "MIME-Version: 1.0".to_string(),
        format!("To: {}", header_value(to)),
        format!("Subject: {}", encode_header_text(subject)),
        String::new(),
        body.to_string(),
    ]
    .join("\r\n")
}

/// The `raw` field Gmail expects: base64url without padding
pub fn encode_raw(message: &str) -> String {
    URL_SAFE_NO_PAD.encode(message.as_bytes())
}

pub fn raw_message(to: &str, subject: &str, body: &str) -> String {
    encode_raw(&build_message(to, subject, body))
}
