//! Server-rendered HTML for the browser-facing routes

use oauth::UserInfo;

const STYLE: &str = r#"
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
               background: #f6f8fc; color: #202124; min-height: 100vh; margin: 0; padding: 40px;
               display: flex; flex-direction: column; align-items: center; }
        .container { max-width: 560px; text-align: center; }
        h1 { color: #1a73e8; font-size: 2.2em; margin-bottom: 0.4em; }
        .card { background: #fff; border: 1px solid #dadce0; padding: 24px; border-radius: 8px; margin: 20px 0; }
        .error { border-color: #d93025; color: #d93025; }
        .button { display: inline-block; background: #1a73e8; color: #fff; padding: 10px 24px;
                  border-radius: 4px; text-decoration: none; border: none; font-size: 1em; cursor: pointer; }
        code { background: #f1f3f4; padding: 2px 8px; border-radius: 4px; }
"#;

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title}</title>
    <style>{STYLE}</style>
</head>
<body>
    <div class="container">
{body}
    </div>
</body>
</html>"#,
        title = escape_html(title),
    )
}

/// Root page: who is signed in, plus any error handed back by a redirect
pub fn home(user: Option<&UserInfo>, signed_in: bool, error: Option<&str>) -> String {
    let status = match (signed_in, user) {
        (true, Some(user)) => format!(
            r#"<div class="card">Signed in as <b>{}</b><br>{} messages in {} threads</div>
        <form method="post" action="/logout"><button class="button">Sign out</button></form>"#,
            escape_html(&user.email),
            user.messages_total.unwrap_or(0),
            user.threads_total.unwrap_or(0),
        ),
        (true, None) => r#"<div class="card">Signed in</div>
        <form method="post" action="/logout"><button class="button">Sign out</button></form>"#
            .to_string(),
        (false, _) => r#"<div class="card">Not signed in</div>
        <a class="button" href="/login">Sign in</a>"#
            .to_string(),
    };

    let error = error
        .map(|e| format!(r#"<div class="card error">{}</div>"#, escape_html(e)))
        .unwrap_or_default();

    layout(
        "Flow Mail",
        &format!("        <h1>Flow Mail</h1>\n        {error}\n        {status}"),
    )
}

pub fn landing() -> String {
    layout(
        "Flow Mail",
        r#"        <h1>Flow Mail</h1>
        <p>Your Gmail inbox, one sign-in away.</p>
        <div class="card">Read, send, star, archive and draft messages through the Gmail API.</div>
        <a class="button" href="/login">Get started</a>"#,
    )
}

pub fn login() -> String {
    layout(
        "Sign in - Flow Mail",
        r#"        <h1>Sign in</h1>
        <div class="card">Flow Mail needs access to your Gmail account.</div>
        <a class="button" href="/auth/google">Sign in with Google</a>"#,
    )
}

/// Shown instead of the sign-in button when no Google client is configured
pub fn configuration_error() -> String {
    error(
        "Configuration error",
        "Google OAuth client ID is not configured. Set GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET.",
    )
}

pub fn error(title: &str, message: &str) -> String {
    layout(
        title,
        &format!(
            r#"        <h1>{}</h1>
        <div class="card error">{}</div>
        <a class="button" href="/login">Back to sign in</a>"#,
            escape_html(title),
            escape_html(message),
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x")</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_home_shows_user() {
        let user = UserInfo {
            email: "jane@example.com".to_string(),
            messages_total: Some(12),
            threads_total: Some(7),
        };
        let html = home(Some(&user), true, None);
        assert!(html.contains("jane@example.com"));
        assert!(html.contains("12 messages in 7 threads"));
    }

    #[test]
    fn test_error_is_escaped() {
        let html = home(None, false, Some("<b>access_denied</b>"));
        assert!(html.contains("&lt;b&gt;access_denied&lt;/b&gt;"));
        assert!(html.contains("Not signed in"));
    }
}
