//! Minimal `Cookie` / `Set-Cookie` handling for the two cookies the server uses

use axum::http::{header, HeaderMap, HeaderValue};

/// Value of cookie `name` from the request's `Cookie` headers
pub fn get(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
}

/// A browser-session cookie: no expiry, so it ends when the browser closes
pub fn session(name: &str, value: &str) -> HeaderValue {
    cookie_header(format!("{name}={value}; Path=/; SameSite=Lax; HttpOnly"))
}

/// A cookie that lives for `max_age` seconds
pub fn short_lived(name: &str, value: &str, max_age: i64) -> HeaderValue {
    cookie_header(format!(
        "{name}={value}; Path=/; Max-Age={max_age}; SameSite=Lax; HttpOnly"
    ))
}

pub fn delete(name: &str) -> HeaderValue {
    cookie_header(format!(
        "{name}=; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0"
    ))
}

fn cookie_header(value: String) -> HeaderValue {
    // Names come from config and values are base64url ids, so this only
    // fails on a misconfigured cookie name
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static(""))
}
