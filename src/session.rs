//! Persisted sign-in session.
//!
//! The auth layer writes `session.json` after login; this crate only reads it
//! (and clears it on logout). Token refresh is not handled here.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const SESSION_FILE: &str = "session.json";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session io error at {path}: {message}")]
    Io { path: PathBuf, message: String },
    #[error("invalid session file {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    #[serde(alias = "id")]
    pub user_id: String,
    pub token: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

// Keep the token out of logs.
impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .field("display_name", &self.display_name)
            .finish()
    }
}

impl AuthSession {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
            display_name: None,
            email: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.user_id.trim().is_empty() && !self.token.trim().is_empty()
    }

    pub fn display_label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("User")
    }
}

/// File-backed session storage.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `Ok(None)` when no session has been stored, or when the stored
    /// one lacks a user id or token.
    pub fn load(&self) -> Result<Option<AuthSession>, SessionError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SessionError::Io {
                    path: self.path.clone(),
                    message: e.to_string(),
                })
            }
        };

        let session: AuthSession =
            serde_json::from_str(&raw).map_err(|e| SessionError::Invalid {
                path: self.path.clone(),
                message: e.to_string(),
            })?;

        if !session.is_valid() {
            tracing::warn!("stored session at {} is incomplete", self.path.display());
            return Ok(None);
        }
        Ok(Some(session))
    }

    pub fn store(&self, session: &AuthSession) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SessionError::Io {
                path: parent.to_path_buf(),
                message: e.to_string(),
            })?;
        }
        let body = serde_json::to_string_pretty(session).map_err(|e| SessionError::Invalid {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&self.path, body).map_err(|e| SessionError::Io {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Io {
                path: self.path.clone(),
                message: e.to_string(),
            }),
        }
    }
}
