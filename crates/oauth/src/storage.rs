//! Persistent storage of authenticated sessions
//!
//! Sessions are kept in a versioned JSON file so a signed-in browser stays
//! signed in across server restarts:
//! - Linux: ~/.local/share/flowmail/sessions.json
//! - macOS: ~/Library/Application Support/flowmail/sessions.json
//! - Windows: %APPDATA%\flowmail\sessions.json

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::error::SessionError;
use crate::sessions::UserInfo;
use crate::tokens::TokenPair;

/// Storage format version (for future migrations)
const STORAGE_VERSION: u32 = 1;

/// Container for all stored sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSessions {
    /// Version for schema migrations
    pub version: u32,

    pub sessions: Vec<StoredSession>,
}

impl Default for StoredSessions {
    fn default() -> Self {
        Self {
            version: STORAGE_VERSION,
            sessions: vec![],
        }
    }
}

/// A single authenticated session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub session_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub issued_at: DateTime<Utc>,
    #[serde(default)]
    pub user: Option<UserInfo>,
}

impl StoredSession {
    pub fn new(session_id: &str, token: &TokenPair, user: Option<UserInfo>) -> Self {
        Self {
            session_id: session_id.to_string(),
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_in: token.expires_in,
            issued_at: token.issued_at,
            user,
        }
    }

    pub fn token(&self) -> TokenPair {
        TokenPair {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_in: self.expires_in,
            issued_at: self.issued_at,
        }
    }
}

/// Handles persistent storage of sessions
///
/// Clones share one lock, so their read-modify-write cycles never overlap.
#[derive(Debug, Clone)]
pub struct SessionStorage {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl SessionStorage {
    /// Storage backed by `path`; parent directories are created on first save
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    fn exclusive(&self) -> MutexGuard<'_, ()> {
        // The guarded value is empty, so a poisoned lock is still usable
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads all stored sessions from disk
    pub fn load(&self) -> Result<StoredSessions, SessionError> {
        if !self.path.exists() {
            debug!("No sessions file found, returning empty");
            return Ok(StoredSessions::default());
        }

        let content = std::fs::read_to_string(&self.path).map_err(storage_error)?;
        let stored: StoredSessions = serde_json::from_str(&content)
            .map_err(|e| SessionError::Storage(format!("failed to parse sessions file: {}", e)))?;

        debug!("Loaded {} sessions from storage", stored.sessions.len());
        Ok(stored)
    }

    /// Saves sessions to disk
    ///
    /// The file is written beside the target and renamed over it, so a
    /// reader sees either the old or the new contents.
    pub fn save(&self, stored: &StoredSessions) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(storage_error)?;
        }
        let content = serde_json::to_string_pretty(stored).map_err(storage_error)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(storage_error)?;
        std::fs::rename(&tmp, &self.path).map_err(storage_error)?;
        debug!("Saved {} sessions to storage", stored.sessions.len());
        Ok(())
    }

    /// Adds a session or replaces the one with the same id
    pub fn upsert(&self, session: StoredSession) -> Result<(), SessionError> {
        let _guard = self.exclusive();
        let mut stored = self.load()?;

        if let Some(existing) = stored
            .sessions
            .iter_mut()
            .find(|s| s.session_id == session.session_id)
        {
            *existing = session;
        } else {
            info!("Persisting new session");
            stored.sessions.push(session);
        }

        self.save(&stored)
    }

    /// Removes a session by id, returning whether it existed
    pub fn remove(&self, session_id: &str) -> Result<bool, SessionError> {
        let _guard = self.exclusive();
        let mut stored = self.load()?;
        let original_len = stored.sessions.len();

        stored.sessions.retain(|s| s.session_id != session_id);

        if stored.sessions.len() < original_len {
            self.save(&stored)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Keeps only the sessions for which `keep` returns true
    pub fn retain<F>(&self, keep: F) -> Result<usize, SessionError>
    where
        F: Fn(&StoredSession) -> bool,
    {
        let _guard = self.exclusive();
        let mut stored = self.load()?;
        let original_len = stored.sessions.len();
        stored.sessions.retain(|s| keep(s));
        let removed = original_len - stored.sessions.len();
        if removed > 0 {
            self.save(&stored)?;
        }
        Ok(removed)
    }
}

fn storage_error(e: impl std::fmt::Display) -> SessionError {
    SessionError::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (SessionStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = SessionStorage::new(temp_dir.path().join("nested").join("sessions.json"));
        (storage, temp_dir)
    }

    fn session(id: &str, access_token: &str) -> StoredSession {
        let token = TokenPair {
            access_token: access_token.into(),
            refresh_token: None,
            expires_in: 3599,
            issued_at: Utc::now(),
        };
        StoredSession::new(id, &token, None)
    }

    #[test]
    fn test_load_missing_file() {
        let (storage, _temp) = create_test_storage();
        let stored = storage.load().unwrap();
        assert_eq!(stored.version, STORAGE_VERSION);
        assert!(stored.sessions.is_empty());
    }

    #[test]
    fn test_upsert_and_load() {
        let (storage, _temp) = create_test_storage();

        storage.upsert(session("a", "token-1")).unwrap();
        storage.upsert(session("a", "token-2")).unwrap();
        storage.upsert(session("b", "token-3")).unwrap();

        let stored = storage.load().unwrap();
        assert_eq!(stored.sessions.len(), 2);
        assert_eq!(stored.sessions[0].access_token, "token-2");
        assert_eq!(stored.sessions[0].token().access_token, "token-2");
    }

    #[test]
    fn test_remove_session() {
        let (storage, _temp) = create_test_storage();

        storage.upsert(session("a", "token")).unwrap();
        assert!(storage.remove("a").unwrap());
        assert!(!storage.remove("a").unwrap());
        assert!(storage.load().unwrap().sessions.is_empty());
    }

    #[test]
    fn test_save_replaces_file_without_leftovers() {
        let (storage, temp) = create_test_storage();

        storage.upsert(session("a", "token-1")).unwrap();
        storage.upsert(session("b", "token-2")).unwrap();
        assert!(storage.remove("a").unwrap());

        let stored = storage.load().unwrap();
        assert_eq!(stored.sessions.len(), 1);
        assert_eq!(stored.sessions[0].session_id, "b");

        let files: Vec<_> = std::fs::read_dir(temp.path().join("nested"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(files, vec![std::ffi::OsString::from("sessions.json")]);
    }

    #[test]
    fn test_clones_serialize_writes() {
        let (storage, _temp) = create_test_storage();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let storage = storage.clone();
                std::thread::spawn(move || {
                    storage.upsert(session(&format!("s{}", i), "token")).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(storage.load().unwrap().sessions.len(), 16);
    }

    #[test]
    fn test_corrupt_file() {
        let (storage, _temp) = create_test_storage();
        std::fs::create_dir_all(storage.path().parent().unwrap()).unwrap();
        std::fs::write(storage.path(), "not json").unwrap();

        assert!(matches!(storage.load(), Err(SessionError::Storage(_))));
    }
}
