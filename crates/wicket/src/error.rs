//! Unified error type for the Wicket framework.

use wicket_session::{SessionError, StoreError};
use wicket_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attributes let `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum WicketError {
    /// A transport-level error (accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A session-level error (store failure, destroyed, not authenticated).
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<StoreError> for WicketError {
    fn from(err: StoreError) -> Self {
        Self::Session(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let wicket_err: WicketError = err.into();
        assert!(matches!(wicket_err, WicketError::Transport(_)));
        assert!(wicket_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::NotAuthenticated;
        let wicket_err: WicketError = err.into();
        assert!(matches!(wicket_err, WicketError::Session(_)));
    }

    #[test]
    fn test_from_store_error_wraps_in_session() {
        let err = StoreError::Unavailable("down".into());
        let wicket_err: WicketError = err.into();
        assert!(matches!(
            wicket_err,
            WicketError::Session(SessionError::Store(_))
        ));
    }
}
