//! HTTP integration: session binding and the authorization gate as axum
//! middleware.
//!
//! Per request:
//!   1. Resolve or create the session from the cookie (skipped if an
//!      outer layer already bound one)
//!   2. Insert the [`SessionHandle`] into request extensions
//!   3. Run the gate: allowed → call the inner service; denied → remember
//!      the requested path and redirect to the authorization endpoint
//!   4. Emit `Set-Cookie` and save the session
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/", get(home))
//!     .layer(axum::middleware::from_fn_with_state(
//!         wicket::express(wicket::global(), SessionOptions::new()),
//!         wicket::http::handle,
//!     ));
//! ```

use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use wicket_session::{
    CookieCarrier, SessionConfig, SessionError, SessionHandle, SessionOptions, Setup,
    SharedConfig, binder, gate,
};

/// Middleware state: the shared configuration plus this mount's overrides.
#[derive(Debug, Clone)]
pub struct HttpGate {
    config: SharedConfig,
    options: Arc<SessionOptions>,
}

/// Builds the HTTP session gate.
///
/// `options` are merged over `config` on every request, so settings the
/// caller did not override keep tracking the shared configuration.
pub fn express(config: SharedConfig, options: SessionOptions) -> HttpGate {
    HttpGate {
        config,
        options: Arc::new(options),
    }
}

impl HttpGate {
    /// The configuration a request arriving now would use.
    pub fn resolve(&self) -> SessionConfig {
        self.config.resolve(&self.options)
    }

    /// Mounts this gate as the outermost layer of `router`.
    pub fn apply<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(axum::middleware::from_fn_with_state(self, handle))
    }
}

/// The middleware function. Attach via
/// `axum::middleware::from_fn_with_state(gate, handle)`.
pub async fn handle(
    State(gate): State<HttpGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, SessionRejection> {
    let config = gate.resolve();
    let mut carrier = CookieCarrier::from_headers(
        req.headers()
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok()),
    );

    let bound = req.extensions().get::<SessionHandle>().cloned();
    let setup = binder::setup(&config, &mut carrier, bound.as_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "session setup failed");
            SessionRejection(e)
        })?;

    let (session, hook) = match setup {
        Setup::AlreadyBound(session) => (session, None),
        Setup::Bound(binding) => {
            let (session, hook) = binding.into_parts();
            (session, Some(hook))
        }
    };
    req.extensions_mut().insert(session.clone());

    let access = {
        let locked = session.lock().await;
        gate::enforce(&config, &locked, req.uri().path())
    };

    let mut response = if access.is_allowed() {
        next.run(req).await
    } else {
        let target = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());
        session.lock().await.set_redirect_uri(Some(target));
        redirect(&config.authorize_path)
    };

    for cookie in carrier.set_cookie_headers() {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => tracing::warn!(error = %e, "session cookie is not a valid header"),
        }
    }

    // The response is already built; a failed save can only be reported.
    if let Some(hook) = hook {
        if let Err(e) = hook.complete().await {
            tracing::warn!(session_id = %session.id(), error = %e, "session save failed");
        }
    }

    Ok(response)
}

fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

/// Session setup failed before the request reached the gate.
///
/// Rendered as `500 Internal Server Error`. The request is never let
/// through, whatever its path.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct SessionRejection(#[from] pub SessionError);

impl IntoResponse for SessionRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "session store unavailable",
        )
            .into_response()
    }
}
