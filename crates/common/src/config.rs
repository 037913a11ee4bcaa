use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::platform::get_config_path;

/// Gmail scopes requested at sign-in
pub const DEFAULT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/gmail.compose",
];

/// Upper bound for the session and login lifetimes: one year
pub const MAX_SESSION_LIFETIME_SECS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub google: GoogleConfig,
    pub session: SessionConfig,
    pub gmail: GmailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally visible origin, used to derive the OAuth redirect URI
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            public_url: "http://localhost:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Client credentials needed for the code exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl GoogleConfig {
    /// Returns the credentials only when all three values are configured
    pub fn credentials(&self) -> Option<Credentials> {
        let present = |v: &Option<String>| v.as_ref().filter(|s| !s.is_empty()).cloned();
        Some(Credentials {
            client_id: present(&self.client_id)?,
            client_secret: present(&self.client_secret)?,
            redirect_uri: present(&self.redirect_uri)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Lifetime of an access token measured from when it was stored
    pub ttl_secs: i64,
    pub cookie_name: String,
    pub state_cookie_name: String,
    /// How long a login may sit between the Google redirect and the callback
    pub pending_ttl_secs: i64,
    pub exchange_attempts: u32,
    /// Where authenticated sessions are persisted. `None` keeps them in memory only.
    pub storage_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            cookie_name: "auth_token".to_string(),
            state_cookie_name: "oauth_state".to_string(),
            pending_ttl_secs: 600,
            exchange_attempts: 3,
            storage_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GmailConfig {
    pub base_url: String,
    pub default_max_results: u32,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gmail.googleapis.com/gmail/v1".to_string(),
            default_max_results: 20,
        }
    }
}

impl Config {
    /// Loads the config from `path`, or from the platform config file when it
    /// exists, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => get_config_path().filter(|p| p.exists()),
        };

        let mut config = match file {
            Some(path) => {
                info!("Loading config from {:?}", path);
                Self::from_file(&path)?
            }
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_env_with(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects session lifetimes that are not positive or exceed a year
    pub fn validate(&self) -> Result<(), ConfigError> {
        let lifetimes = [
            ("session.ttl_secs", self.session.ttl_secs),
            ("session.pending_ttl_secs", self.session.pending_ttl_secs),
        ];
        for (key, secs) in lifetimes {
            if !(1..=MAX_SESSION_LIFETIME_SECS).contains(&secs) {
                return Err(ConfigError::InvalidValue {
                    key,
                    value: secs.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies environment overrides read through `lookup`
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("GOOGLE_CLIENT_ID") {
            self.google.client_id = Some(v);
        }
        if let Some(v) = lookup("GOOGLE_CLIENT_SECRET") {
            self.google.client_secret = Some(v);
        }
        if let Some(v) = lookup("GOOGLE_REDIRECT_URI") {
            self.google.redirect_uri = Some(v);
        }
        if let Some(v) = lookup("FLOWMAIL_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("FLOWMAIL_PORT") {
            self.server.port = v
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: "FLOWMAIL_PORT", value: v })?;
        }
        if let Some(v) = lookup("FLOWMAIL_PUBLIC_URL") {
            self.server.public_url = v;
        }
        Ok(())
    }

    /// Configured redirect URI, or the callback route on the public origin
    pub fn redirect_uri(&self) -> String {
        match &self.google.redirect_uri {
            Some(uri) if !uri.is_empty() => uri.clone(),
            _ => format!("{}/auth/callback", self.server.public_url.trim_end_matches('/')),
        }
    }

    /// Credentials with the derived redirect URI filled in when none is configured
    pub fn credentials(&self) -> Option<Credentials> {
        let mut google = self.google.clone();
        google.redirect_uri = Some(self.redirect_uri());
        google.credentials()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.session.ttl_secs, 3600);
        assert_eq!(config.session.cookie_name, "auth_token");
        assert_eq!(config.google.scopes.len(), 4);
        assert_eq!(config.redirect_uri(), "http://localhost:3000/auth/callback");
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nport = 8081\n\n[google]\nclient_id = \"abc\"\n\n[session]\nttl_secs = 60"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.google.client_id.as_deref(), Some("abc"));
        assert_eq!(config.session.ttl_secs, 60);
        assert_eq!(config.session.cookie_name, "auth_token");
    }

    #[test]
    fn test_from_file_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("GOOGLE_REDIRECT_URI", "https://mail.example.com/auth/callback"),
            ("FLOWMAIL_PORT", "9000"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env_with(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.port, 9000);
        let creds = config.credentials().unwrap();
        assert_eq!(creds.client_id, "id");
        assert_eq!(creds.redirect_uri, "https://mail.example.com/auth/callback");
    }

    #[test]
    fn test_invalid_port() {
        let mut config = Config::default();
        let result = config.apply_env_with(|k| (k == "FLOWMAIL_PORT").then(|| "nope".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_session_lifetimes_validated() {
        assert!(Config::default().validate().is_ok());

        let mut config = Config::default();
        config.session.ttl_secs = i64::MAX;
        match config.validate() {
            Err(ConfigError::InvalidValue { key, value }) => {
                assert_eq!(key, "session.ttl_secs");
                assert_eq!(value, i64::MAX.to_string());
            }
            other => panic!("expected invalid ttl, got {:?}", other),
        }

        let mut config = Config::default();
        config.session.pending_ttl_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key: "session.pending_ttl_secs", .. })
        ));
    }

    #[test]
    fn test_load_rejects_huge_ttl() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[session]\nttl_secs = 9223372036854775807").unwrap();
        assert!(matches!(
            Config::load(Some(file.path())),
            Err(ConfigError::InvalidValue { key: "session.ttl_secs", .. })
        ));
    }

    #[test]
    fn test_credentials_require_all_values() {
        let mut google = GoogleConfig::default();
        google.client_id = Some("id".into());
        google.redirect_uri = Some("http://localhost:3000/auth/callback".into());
        assert!(google.credentials().is_none());

        google.client_secret = Some(String::new());
        assert!(google.credentials().is_none());

        google.client_secret = Some("secret".into());
        assert!(google.credentials().is_some());
    }
}
