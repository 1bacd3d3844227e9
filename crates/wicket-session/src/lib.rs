//! Session management for Wicket.
//!
//! This crate is transport-agnostic. It covers:
//!
//! 1. **Sessions**: the [`Session`] entity and its persisted [`SessionData`]
//! 2. **Storage**: the pluggable [`SessionStore`] trait and the default
//!    [`MemoryStore`]
//! 3. **Reaping**: a background task evicting idle sessions ([`reaper`])
//! 4. **Binding**: resolving or creating the session for a request from
//!    its [`Carrier`] ([`binder`])
//! 5. **Gating**: deciding whether an unauthenticated session may reach a
//!    path ([`gate`])
//!
//! # How it fits in the stack
//!
//! ```text
//! wicket (above)          ← HTTP middleware and connection gate
//!     ↕
//! wicket-session (this)   ← binder, gate, store, reaper
//!     ↕
//! SessionStore backend    ← memory, or any durable implementation
//! ```

pub mod binder;
mod carrier;
mod config;
mod error;
pub mod gate;
mod memory;
pub mod reaper;
mod session;
mod store;

pub use binder::{Binding, CompletionHook, Setup};
pub use carrier::{Carrier, CookieCarrier};
pub use config::{
    SessionConfig, SessionOptions, Setting, SettingKey, SharedConfig, global,
};
pub use error::{SessionError, StoreError};
pub use gate::{Access, includes_path};
pub use memory::MemoryStore;
pub use reaper::{ReaperExit, ReaperHandle};
pub use session::{Session, SessionData, SessionHandle};
pub use store::{SessionStore, horizon};
