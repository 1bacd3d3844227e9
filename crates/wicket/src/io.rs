//! Connection integration: the session gate for persistent connections.
//!
//! A connection has no per-message request to hang a redirect on, so the
//! gate runs once, before any application logic, against the request the
//! connection was opened with. A denied connection is refused outright.
//!
//! Cookies written while binding have nowhere to go after the upgrade and
//! are dropped.

use std::sync::Arc;

use wicket_session::{
    Binding, CookieCarrier, SessionConfig, SessionError, SessionOptions, SharedConfig,
    binder, gate,
};
use wicket_transport::UpgradeRequest;

/// Session gate for connection-style transports.
#[derive(Debug, Clone)]
pub struct ConnectionGate {
    config: SharedConfig,
    options: Arc<SessionOptions>,
}

/// Builds the connection session gate.
pub fn io(config: SharedConfig, options: SessionOptions) -> ConnectionGate {
    ConnectionGate {
        config,
        options: Arc::new(options),
    }
}

impl ConnectionGate {
    pub fn resolve(&self) -> SessionConfig {
        self.config.resolve(&self.options)
    }

    /// Binds a session to the connection and runs the gate.
    ///
    /// On success the returned [`Binding`] must be completed when the
    /// connection ends so the session is saved.
    ///
    /// # Errors
    /// - [`SessionError::Store`] if the store lookup fails.
    /// - [`SessionError::NotAuthenticated`] if the gate denies the path.
    ///   The session is discarded without being saved.
    pub async fn admit(&self, request: &UpgradeRequest) -> Result<Binding, SessionError> {
        let config = self.resolve();
        let mut carrier = CookieCarrier::from_headers(request.cookies.iter().map(String::as_str));

        let binding = binder::bind(&config, &mut carrier).await?;

        let access = {
            let session = binding.session().lock().await;
            gate::enforce(&config, &session, &request.path)
        };
        if !access.is_allowed() {
            binding.discard();
            return Err(SessionError::NotAuthenticated);
        }

        tracing::debug!(
            session_id = %binding.session().id(),
            path = %request.path,
            ?access,
            "connection admitted"
        );
        Ok(binding)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wicket_session::{MemoryStore, Session, SessionStore};

    use super::*;

    fn shared(store: Arc<dyn SessionStore>) -> SharedConfig {
        SharedConfig::new(SessionConfig {
            store,
            allow_paths: vec!["/public".into()],
            ..SessionConfig::default()
        })
    }

    async fn authenticated(store: &Arc<dyn SessionStore>) -> String {
        let mut session = Session::create(Arc::clone(store));
        session.set_token(Some("abc".into()));
        session.save().await.unwrap();
        session.id().to_string()
    }

    #[tokio::test]
    async fn test_admit_authenticated_session() {
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let id = authenticated(&store).await;
        let gate = io(shared(Arc::clone(&store)), SessionOptions::new());

        let request = UpgradeRequest::new("/live").with_cookie(format!("Session-ID={id}"));
        let binding = gate.admit(&request).await.expect("should admit");

        assert!(!binding.is_new());
        assert_eq!(binding.session().id(), id);
    }

    #[tokio::test]
    async fn test_admit_unauthenticated_is_refused_and_not_saved() {
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let gate = io(shared(Arc::clone(&store)), SessionOptions::new());

        let result = gate.admit(&UpgradeRequest::new("/live")).await;

        assert!(matches!(result, Err(SessionError::NotAuthenticated)));
        tokio::task::yield_now().await;
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_admit_allowed_path_without_token() {
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let gate = io(shared(Arc::clone(&store)), SessionOptions::new());

        let binding = gate
            .admit(&UpgradeRequest::new("/public/feed"))
            .await
            .expect("should admit");

        assert!(binding.is_new());
        assert!(binding.complete().await.unwrap());
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_admit_uses_overridden_cookie_name() {
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let id = authenticated(&store).await;
        let gate = io(shared(Arc::clone(&store)), SessionOptions::new().cookie_name("sid"));

        let request = UpgradeRequest::new("/live").with_cookie(format!("sid={id}"));

        assert!(gate.admit(&request).await.is_ok());
    }
}
