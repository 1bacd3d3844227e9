//! Error types for the session layer.

/// Failures raised by a [`SessionStore`](crate::SessionStore) backend.
///
/// A missing session is never an error: stores report it as `Ok(None)`.
/// Everything in this enum means the backend itself could not answer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend is unreachable or refused the operation.
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    /// An I/O operation against the backend failed.
    #[error("session store I/O failed: {0}")]
    Io(#[source] std::io::Error),

    /// A stored record could not be decoded.
    #[error("session {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Errors that can occur while binding, persisting, or authorizing a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The backing store failed. Setup halts and the gate is bypassed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// `save()` was called on a session that has already been destroyed.
    /// Destroyed sessions are terminal and must never be persisted again.
    #[error("session {0} has been destroyed")]
    Destroyed(String),

    /// The session is not authenticated and the requested path is not
    /// exempt. Only surfaced on the connection path; HTTP redirects instead.
    #[error("session is not authenticated")]
    NotAuthenticated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_converts_into_session_error() {
        let err: SessionError = StoreError::Unavailable("redis down".into()).into();
        assert!(matches!(err, SessionError::Store(_)));
        assert!(err.to_string().contains("redis down"));
    }

    #[test]
    fn test_corrupt_error_names_session() {
        let err = StoreError::Corrupt {
            id: "abc".into(),
            reason: "bad json".into(),
        };
        assert_eq!(err.to_string(), "session abc is corrupt: bad json");
    }
}
