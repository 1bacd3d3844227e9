//! Session entity: one client's server-side state.
//!
//! A session is split in two parts:
//! - [`SessionData`] is the plain record that stores persist and that
//!   calling code (handlers, templates) is allowed to see.
//! - [`Session`] wraps that record together with the store it is bound to
//!   and a `destroyed` flag. Neither of those ever leaves the process.
//!
//! ```text
//!   create() ──→ [fresh] ──save()──→ [persisted] ──destroy()──→ [destroyed]
//!                              ↑          │
//!                              └──save()──┘
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};

use crate::{SessionError, SessionStore};

// ---------------------------------------------------------------------------
// SessionData
// ---------------------------------------------------------------------------

/// The persisted, publicly visible part of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    /// Opaque identifier. Store key and carrier value. Never changes.
    pub id: String,

    /// Time of the last save. `None` until the session is first saved.
    pub mtime: Option<DateTime<Utc>>,

    /// Authentication credential. `None` means unauthenticated.
    pub token: Option<String>,

    /// The authenticated principal, in whatever shape the application uses.
    pub user: Option<serde_json::Value>,

    /// Where to send the client after it authorizes. Set by the gate when
    /// it redirects an unauthenticated request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
}

impl SessionData {
    /// An unsaved, unauthenticated record with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mtime: None,
            token: None,
            user: None,
            redirect_uri: None,
        }
    }

    /// Whether the last save happened strictly before `horizon`.
    ///
    /// A record that was never saved counts as older than any horizon.
    pub fn is_stale(&self, horizon: DateTime<Utc>) -> bool {
        match self.mtime {
            Some(mtime) => mtime < horizon,
            None => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A session bound to the store that persists it.
#[derive(Clone)]
pub struct Session {
    data: SessionData,
    destroyed: bool,
    store: Arc<dyn SessionStore>,
}

impl Session {
    /// Allocates a fresh session bound to `store` with a new random id.
    ///
    /// Nothing is written to the store until [`save`](Self::save).
    pub fn create(store: Arc<dyn SessionStore>) -> Self {
        let mut session = Self {
            data: SessionData::new(generate_id()),
            destroyed: false,
            store,
        };
        session.reset(false);
        tracing::debug!(session_id = %session.data.id, "session created");
        session
    }

    /// Rebinds a record loaded from `store`.
    pub fn bind(store: Arc<dyn SessionStore>, data: SessionData) -> Self {
        Self {
            data,
            destroyed: false,
            store,
        }
    }

    /// Loads the session stored under `id`, bound to `store`.
    ///
    /// Returns `Ok(None)` when `id` is empty or unknown. A backend failure
    /// is returned as [`SessionError::Store`], never as `None`.
    pub async fn find(
        store: &Arc<dyn SessionStore>,
        id: &str,
    ) -> Result<Option<Self>, SessionError> {
        let data = store.get(id).await?;
        Ok(data.map(|data| Self::bind(Arc::clone(store), data)))
    }

    /// Clears credentials and the save time, and sets the destroyed flag.
    pub fn reset(&mut self, destroy: bool) {
        self.destroyed = destroy;
        self.data.mtime = None;
        self.data.token = None;
        self.data.user = None;
        self.data.redirect_uri = None;
    }

    /// Stamps the save time and upserts the session into its store.
    ///
    /// # Errors
    /// - [`SessionError::Destroyed`] if the session was destroyed; nothing
    ///   is written.
    /// - [`SessionError::Store`] if the backend rejects the write.
    pub async fn save(&mut self) -> Result<(), SessionError> {
        if self.destroyed {
            return Err(SessionError::Destroyed(self.data.id.clone()));
        }

        // mtime never moves backwards, even if the wall clock does.
        let now = Utc::now();
        self.data.mtime = Some(match self.data.mtime {
            Some(prev) if prev > now => prev,
            _ => now,
        });

        self.store.set(self.data.clone()).await?;
        tracing::debug!(session_id = %self.data.id, "session saved");
        Ok(())
    }

    /// Marks the session destroyed and deletes it from the store.
    ///
    /// Returns whether the store held an entry. Destroying twice is fine;
    /// the second call reports `false`.
    pub async fn destroy(&mut self) -> Result<bool, SessionError> {
        self.reset(true);
        let existed = self.store.del(&self.data.id).await?;
        tracing::debug!(session_id = %self.data.id, existed, "session destroyed");
        Ok(existed)
    }

    /// The publicly visible fields. The store binding and the destroyed
    /// flag are internal and never included.
    pub fn serialize(&self) -> SessionData {
        self.data.clone()
    }

    pub fn id(&self) -> &str {
        &self.data.id
    }

    pub fn mtime(&self) -> Option<DateTime<Utc>> {
        self.data.mtime
    }

    pub fn token(&self) -> Option<&str> {
        self.data.token.as_deref()
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.data.token = token;
    }

    pub fn user(&self) -> Option<&serde_json::Value> {
        self.data.user.as_ref()
    }

    pub fn set_user(&mut self, user: Option<serde_json::Value>) {
        self.data.user = user;
    }

    pub fn redirect_uri(&self) -> Option<&str> {
        self.data.redirect_uri.as_deref()
    }

    pub fn set_redirect_uri(&mut self, uri: Option<String>) {
        self.data.redirect_uri = uri;
    }

    /// Takes the pending redirect target, leaving none behind.
    pub fn take_redirect_uri(&mut self) -> Option<String> {
        self.data.redirect_uri.take()
    }

    /// `true` once a token has been set.
    pub fn is_authenticated(&self) -> bool {
        self.data.token.is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.data.id)
            .field("mtime", &self.data.mtime)
            .field("authenticated", &self.data.token.is_some())
            .field("destroyed", &self.destroyed)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// A session shared between a request's handler and its completion hook.
///
/// Cloning the handle shares the same session. The id is copied out so it
/// can be read without taking the lock.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Arc<str>,
    inner: Arc<Mutex<Session>>,
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self {
            id: Arc::from(session.id()),
            inner: Arc::new(Mutex::new(session)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Locks the session for reading or mutation.
    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner.lock().await
    }

    /// Whether both handles point at the same session.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Generates a random 32-character hex string (128 bits of entropy).
fn generate_id() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
