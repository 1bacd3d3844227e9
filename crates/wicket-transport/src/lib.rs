//! Persistent-connection transport for Wicket.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! long-lived connections, plus the [`UpgradeRequest`] each connection
//! was opened with. The session layer reads the session id from that
//! request's cookies, since a persistent connection has no per-message
//! headers to carry it.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    DEFAULT_HANDSHAKE_TIMEOUT, IncomingWebSocket, WebSocketConnection, WebSocketTransport,
};

use std::fmt;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The request that opened a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeRequest {
    /// Request path, without query string.
    pub path: String,

    /// Raw `Cookie` header values, in the order received.
    pub cookies: Vec<String>,
}

impl UpgradeRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            cookies: Vec::new(),
        }
    }

    /// Adds a raw `Cookie` header value.
    pub fn with_cookie(mut self, header: impl Into<String>) -> Self {
        self.cookies.push(header.into());
        self
    }
}

/// Accepts new incoming connections.
///
/// Accepting only takes the socket off the listener. The protocol
/// handshake happens in [`Incoming::upgrade`], so a peer that never
/// finishes it stalls its own task and not the accept loop.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// An accepted socket that has not been upgraded yet.
    type Incoming: Incoming<Connection = Self::Connection, Error = Self::Error>;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming socket.
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error>;
}

/// An accepted socket waiting for its handshake.
pub trait Incoming: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Runs the handshake and yields the established connection.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error>;
}

/// A single connection that can send and receive bytes.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends data to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// The request this connection was opened with.
    fn request(&self) -> &UpgradeRequest;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_upgrade_request_builder() {
        let req = UpgradeRequest::new("/live")
            .with_cookie("a=1")
            .with_cookie("b=2");

        assert_eq!(req.path, "/live");
        assert_eq!(req.cookies, vec!["a=1".to_string(), "b=2".to_string()]);
    }
}
