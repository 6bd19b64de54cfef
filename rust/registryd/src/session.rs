//! Authenticated identity and its persistence.
//!
//! `SessionContext` is a plain value owned by `AppState`; every transition
//! (`login`, `logout`, `hydrate_from_storage`) consumes the old context and
//! returns the new one.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use thiserror::Error;
use uuid::Uuid;

use crate::logging::redact_token;

pub const ADMIN_ROLE: &str = "Administrador";
pub const DEFAULT_USER_ROLE: &str = "Usuario";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("stored session is unreadable: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[cfg(test)]
    pub fn admin() -> Self {
        Self(ADMIN_ROLE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_admin(&self) -> bool {
        self.0 == ADMIN_ROLE
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub role: Role,
    /// Opaque bearer token issued by the backend.
    pub token: String,
    pub school_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub session_id: String,
    pub identity: Identity,
    pub saved_at: DateTime<Utc>,
}

pub trait SessionStore {
    fn load(&self) -> Result<Option<StoredSession>, SessionError>;
    fn save(&self, session: &StoredSession) -> Result<(), SessionError>;
    fn clear(&self) -> Result<(), SessionError>;
}

impl SessionStore for Connection {
    fn load(&self) -> Result<Option<StoredSession>, SessionError> {
        let row = self
            .query_row(
                "SELECT session_id, username, role, token, school_id, saved_at
                 FROM session WHERE id = 1",
                [],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, String>(3)?,
                        r.get::<_, Option<String>>(4)?,
                        r.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;
        let Some((session_id, username, role, token, school_id, saved_at)) = row else {
            return Ok(None);
        };
        let saved_at = DateTime::parse_from_rfc3339(&saved_at)
            .map_err(|e| SessionError::Corrupt(format!("saved_at: {e}")))?
            .with_timezone(&Utc);
        if token.is_empty() {
            return Err(SessionError::Corrupt("empty token".into()));
        }
        Ok(Some(StoredSession {
            session_id,
            identity: Identity {
                username,
                role: Role::new(role),
                token,
                school_id,
            },
            saved_at,
        }))
    }

    fn save(&self, session: &StoredSession) -> Result<(), SessionError> {
        self.execute(
            "INSERT INTO session(id, session_id, username, role, token, school_id, saved_at)
             VALUES(1, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
               session_id = excluded.session_id,
               username = excluded.username,
               role = excluded.role,
               token = excluded.token,
               school_id = excluded.school_id,
               saved_at = excluded.saved_at",
            (
                &session.session_id,
                &session.identity.username,
                session.identity.role.as_str(),
                &session.identity.token,
                session.identity.school_id.as_deref(),
                session
                    .saved_at
                    .to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        self.execute("DELETE FROM session WHERE id = 1", [])?;
        Ok(())
    }
}

/// Process-local store used until a workspace is selected.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slot: RefCell<Option<StoredSession>>,
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<StoredSession>, SessionError> {
        Ok(self.slot.borrow().clone())
    }

    fn save(&self, session: &StoredSession) -> Result<(), SessionError> {
        *self.slot.borrow_mut() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.slot.borrow_mut() = None;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    current: Option<StoredSession>,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.current.as_ref().map(|s| &s.identity)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.session_id.as_str())
    }

    pub fn token(&self) -> Option<&str> {
        self.identity().map(|i| i.token.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.is_some()
    }

    /// Starts a new session for `identity` and persists it. A storage failure
    /// is logged; the in-memory session is still established.
    pub fn login(self, identity: Identity, store: &dyn SessionStore) -> Self {
        let session = StoredSession {
            session_id: Uuid::new_v4().to_string(),
            identity,
            saved_at: Utc::now(),
        };
        tracing::info!(
            session_id = %session.session_id,
            username = %session.identity.username,
            role = session.identity.role.as_str(),
            token = %redact_token(&session.identity.token),
            "session started"
        );
        if let Err(e) = store.save(&session) {
            tracing::warn!(error = %e, "failed to persist session");
        }
        Self {
            current: Some(session),
        }
    }

    pub fn logout(self, store: &dyn SessionStore) -> Self {
        if let Some(s) = &self.current {
            tracing::info!(session_id = %s.session_id, "session ended");
        }
        if let Err(e) = store.clear() {
            tracing::warn!(error = %e, "failed to clear persisted session");
        }
        Self::anonymous()
    }

    /// Restores a persisted session when none is held in memory. An
    /// in-memory identity always wins over storage.
    pub fn hydrate_from_storage(self, store: &dyn SessionStore) -> Self {
        if self.current.is_some() {
            return self;
        }
        match store.load() {
            Ok(Some(session)) => {
                tracing::info!(session_id = %session.session_id, "session restored from storage");
                Self {
                    current: Some(session),
                }
            }
            Ok(None) => self,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable persisted session");
                self
            }
        }
    }

    /// Writes the current session, if any, to `store`.
    pub fn persist(&self, store: &dyn SessionStore) {
        let Some(session) = &self.current else {
            return;
        };
        if let Err(e) = store.save(session) {
            tracing::warn!(session_id = %session.session_id, error = %e, "failed to persist session");
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match &self.current {
            None => serde_json::json!({ "authenticated": false }),
            Some(s) => serde_json::json!({
                "authenticated": true,
                "sessionId": s.session_id,
                "username": s.identity.username,
                "role": s.identity.role.as_str(),
                "isAdmin": s.identity.role.is_admin(),
                "schoolId": s.identity.school_id,
                "since": s.saved_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            }),
        }
    }
}
