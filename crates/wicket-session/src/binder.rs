//! Request binder: attaches a session to an inbound request.
//!
//! Per request the binder moves from *unbound* to *bound* exactly once:
//!
//! ```text
//! setup() ──(already bound)──→ Setup::AlreadyBound   (no-op)
//!    │
//!    └──→ carrier id ──→ store.get ──hit──→ existing session ─┐
//!                                 └─miss─→ Session::create ───┤
//!                                                             ▼
//!                               write id back to carrier, Setup::Bound
//! ```
//!
//! The [`CompletionHook`] inside a [`Binding`] saves the session when the
//! request is done. It fires once: either when [`CompletionHook::complete`]
//! is awaited, or, if the request is abandoned, when the hook is dropped.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::{Carrier, Session, SessionConfig, SessionError, SessionHandle};

/// Outcome of [`setup`].
#[derive(Debug)]
pub enum Setup {
    /// A session was already bound to this request. Nothing was done and no
    /// second completion hook exists.
    AlreadyBound(SessionHandle),

    /// A session was resolved or created and bound.
    Bound(Binding),
}

impl Setup {
    /// The session bound to the request, whichever way it got there.
    pub fn session(&self) -> &SessionHandle {
        match self {
            Self::AlreadyBound(handle) => handle,
            Self::Bound(binding) => &binding.session,
        }
    }
}

/// A freshly bound session together with its completion hook.
#[derive(Debug)]
pub struct Binding {
    session: SessionHandle,
    created: bool,
    hook: CompletionHook,
}

impl Binding {
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// `true` if no stored session matched and a new one was created.
    pub fn is_new(&self) -> bool {
        self.created
    }

    pub fn into_parts(self) -> (SessionHandle, CompletionHook) {
        (self.session, self.hook)
    }

    /// Runs the completion hook now.
    pub async fn complete(self) -> Result<bool, SessionError> {
        self.hook.complete().await
    }

    /// Drops the binding without ever saving the session.
    pub fn discard(self) {
        self.hook.disarm();
    }
}

/// Resolves or creates the session for one request.
///
/// `bound` is whatever session the request already carries; passing
/// `Some` makes this a no-op, so the binder can be layered more than once.
///
/// # Errors
/// [`SessionError::Store`] if the store lookup fails. No session is bound
/// and the carrier is left untouched.
pub async fn setup<C>(
    config: &SessionConfig,
    carrier: &mut C,
    bound: Option<&SessionHandle>,
) -> Result<Setup, SessionError>
where
    C: Carrier + ?Sized,
{
    if let Some(handle) = bound {
        trace!(session_id = %handle.id(), "session already bound");
        return Ok(Setup::AlreadyBound(handle.clone()));
    }
    bind(config, carrier).await.map(Setup::Bound)
}

/// Resolves or creates a session unconditionally.
///
/// Used by transports that bind exactly once per connection and so have
/// nothing to be idempotent about.
pub async fn bind<C>(config: &SessionConfig, carrier: &mut C) -> Result<Binding, SessionError>
where
    C: Carrier + ?Sized,
{
    let id = carrier.get(&config.cookie_name).unwrap_or_default();
    let (session, created) = match Session::find(&config.store, &id).await? {
        Some(session) => {
            debug!(session_id = %session.id(), "session resolved");
            (session, false)
        }
        None => (Session::create(Arc::clone(&config.store)), true),
    };

    carrier.set(&config.cookie_name, session.id(), config.max_age());

    let session = SessionHandle::new(session);
    Ok(Binding {
        hook: CompletionHook::new(session.clone()),
        session,
        created,
    })
}

/// Saves the bound session once the request is finished.
///
/// Destroyed sessions are skipped. Save failures are returned from
/// [`complete`](Self::complete); when the hook fires from `Drop` they can
/// only be logged.
#[derive(Debug)]
pub struct CompletionHook {
    session: Option<SessionHandle>,
}

impl CompletionHook {
    fn new(session: SessionHandle) -> Self {
        Self {
            session: Some(session),
        }
    }

    /// Saves the session unless it was destroyed. Returns whether a save
    /// happened.
    pub async fn complete(mut self) -> Result<bool, SessionError> {
        match self.session.take() {
            Some(handle) => save_unless_destroyed(&handle).await,
            None => Ok(false),
        }
    }

    /// Defuses the hook so the session is never saved.
    pub fn disarm(mut self) {
        if let Some(handle) = self.session.take() {
            trace!(session_id = %handle.id(), "completion hook disarmed");
        }
    }
}

impl Drop for CompletionHook {
    fn drop(&mut self) {
        let Some(handle) = self.session.take() else {
            return;
        };
        // Drop is synchronous, so the save runs as a fire-and-forget task.
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = save_unless_destroyed(&handle).await {
                        warn!(session_id = %handle.id(), error = %e, "deferred session save failed");
                    }
                });
            }
            Err(_) => {
                warn!(session_id = %handle.id(), "no runtime available, session not saved");
            }
        }
    }
}

async fn save_unless_destroyed(handle: &SessionHandle) -> Result<bool, SessionError> {
    let mut session = handle.lock().await;
    if session.is_destroyed() {
        return Ok(false);
    }
    session.save().await?;
    Ok(true)
}
