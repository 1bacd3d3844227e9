//! # Wicket
//!
//! Cookie-carried sessions and path-based authorization for HTTP and
//! WebSocket services.
//!
//! - [`express`] builds axum middleware that binds a session to every
//!   request and redirects unauthenticated requests to the authorization
//!   endpoint.
//! - [`io`] builds the equivalent gate for persistent connections, which
//!   refuses unauthenticated connections instead of redirecting.
//! - [`WicketServer`] runs a WebSocket accept loop with that gate in front
//!   of your [`ConnectionHandler`].
//!
//! Sessions, stores, and the reaper live in [`wicket_session`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use wicket::prelude::*;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = wicket::global();
//! config.set(Setting::AllowPaths(vec!["/public".into()]));
//! let _reaper = config.start_reaper();
//!
//! let app = wicket::express(config, SessionOptions::new())
//!     .apply(Router::new().route("/", get(|| async { "hello" })));
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

mod error;
pub mod http;
pub mod io;
mod server;

pub use error::WicketError;
pub use http::{HttpGate, SessionRejection, express};
pub use io::{ConnectionGate, io};
pub use server::{ConnectionHandler, WicketServer, WicketServerBuilder};
pub use wicket_session::global;

pub mod prelude {
    pub use crate::{
        ConnectionGate, ConnectionHandler, HttpGate, WicketError, WicketServer,
        WicketServerBuilder, express, io,
    };
    pub use wicket_session::{
        Access, MemoryStore, Session, SessionConfig, SessionData, SessionError,
        SessionHandle, SessionOptions, SessionStore, Setting, SettingKey, SharedConfig,
        StoreError,
    };
    pub use wicket_transport::{Connection, UpgradeRequest, WebSocketConnection};
}
