//! `WicketServer` builder and connection accept loop.
//!
//! Every accepted connection goes through the [`ConnectionGate`] before the
//! application's [`ConnectionHandler`] sees it. Refused connections get an
//! error message and are closed. Admitted ones keep their session for the
//! lifetime of the handler, which is saved once the handler returns.

use std::sync::Arc;
use std::time::Duration;

use wicket_session::{SessionError, SessionHandle, SessionOptions, SharedConfig};
use wicket_transport::{
    Connection, DEFAULT_HANDSHAKE_TIMEOUT, Incoming, Transport, WebSocketConnection,
    WebSocketTransport,
};

use crate::WicketError;
use crate::io::{ConnectionGate, io};

/// Application logic for an admitted connection.
///
/// The handler owns the connection until it returns. Mutations made to the
/// session through the handle are persisted afterwards.
pub trait ConnectionHandler: Send + Sync + 'static {
    fn handle(
        &self,
        conn: &WebSocketConnection,
        session: SessionHandle,
    ) -> impl std::future::Future<Output = Result<(), WicketError>> + Send;
}

/// Shared server state passed to each connection task.
struct ServerState<H: ConnectionHandler> {
    gate: ConnectionGate,
    handler: H,
}

/// Builder for configuring and starting a Wicket connection server.
///
/// # Example
///
/// ```rust,ignore
/// let server = WicketServerBuilder::new()
///     .bind("0.0.0.0:9000")
///     .config(wicket::global())
///     .build(MyHandler)
///     .await?;
/// server.run().await
/// ```
pub struct WicketServerBuilder {
    bind_addr: String,
    config: SharedConfig,
    options: SessionOptions,
    handshake_timeout: Duration,
}

impl WicketServerBuilder {
    /// Creates a new builder bound to the process-wide configuration.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:9000".to_string(),
            config: wicket_session::global(),
            options: SessionOptions::default(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Uses `config` instead of the process-wide configuration.
    pub fn config(mut self, config: SharedConfig) -> Self {
        self.config = config;
        self
    }

    /// Per-server overrides merged over the configuration.
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// How long a client gets to complete the WebSocket upgrade.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Binds the listener.
    pub async fn build<H: ConnectionHandler>(
        self,
        handler: H,
    ) -> Result<WicketServer<H>, WicketError> {
        let transport = WebSocketTransport::bind(&self.bind_addr)
            .await?
            .with_handshake_timeout(self.handshake_timeout);

        let state = Arc::new(ServerState {
            gate: io(self.config, self.options),
            handler,
        });

        Ok(WicketServer { transport, state })
    }
}

impl Default for WicketServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Wicket connection server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct WicketServer<H: ConnectionHandler> {
    transport: WebSocketTransport,
    state: Arc<ServerState<H>>,
}

impl<H: ConnectionHandler> WicketServer<H> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop until the process is terminated.
    ///
    /// Each socket is handed to its own task before the handshake starts,
    /// so a slow or silent client never holds up the next accept.
    pub async fn run(mut self) -> Result<(), WicketError> {
        tracing::info!("Wicket connection server running");

        loop {
            match self.transport.accept().await {
                Ok(incoming) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let peer = incoming.peer_addr();
                        let conn = match incoming.upgrade().await {
                            Ok(conn) => conn,
                            Err(e) => {
                                tracing::debug!(%peer, error = %e, "upgrade failed");
                                return;
                            }
                        };
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

async fn handle_connection<H: ConnectionHandler>(
    conn: WebSocketConnection,
    state: Arc<ServerState<H>>,
) -> Result<(), WicketError> {
    let conn_id = conn.id();

    let binding = match state.gate.admit(conn.request()).await {
        Ok(binding) => binding,
        Err(e) => {
            let path = &conn.request().path;
            match &e {
                SessionError::NotAuthenticated => {
                    tracing::info!(%conn_id, %path, "connection refused")
                }
                _ => tracing::error!(%conn_id, %path, error = %e, "session setup failed"),
            }
            if let Err(send_err) = conn.send(e.to_string().as_bytes()).await {
                tracing::debug!(%conn_id, error = %send_err, "refusal message not delivered");
            }
            if let Err(close_err) = conn.close().await {
                tracing::debug!(%conn_id, error = %close_err, "close after refusal failed");
            }
            return Err(e.into());
        }
    };

    let (session, hook) = binding.into_parts();
    tracing::debug!(%conn_id, session_id = %session.id(), "connection bound to session");

    let result = state.handler.handle(&conn, session).await;

    if let Err(e) = hook.complete().await {
        tracing::warn!(%conn_id, error = %e, "session save failed at connection end");
    }
    result
}
