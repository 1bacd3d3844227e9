//! Authorization gate: decides whether a request may proceed.
//!
//! The rules, in order:
//!
//! 1. an authenticated session (token set) is always allowed,
//! 2. the authorization endpoint and anything below it is allowed, so the
//!    redirect target can never redirect again,
//! 3. any configured exempt path and anything below it is allowed,
//! 4. everything else is denied.
//!
//! What happens on denial is up to the transport: HTTP redirects, a
//! persistent connection is refused.

use crate::{Session, SessionConfig};

/// The gate's verdict, with the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Authenticated,
    AuthorizeEndpoint,
    AllowedPath,
    Denied,
}

impl Access {
    pub fn is_allowed(self) -> bool {
        !matches!(self, Self::Denied)
    }
}

/// Applies the gate rules to `session` requesting `path`.
///
/// Any query string or fragment on `path` is ignored.
pub fn enforce(config: &SessionConfig, session: &Session, path: &str) -> Access {
    if session.is_authenticated() {
        return Access::Authenticated;
    }

    let path = path.split(&['?', '#'][..]).next().unwrap_or(path);

    if includes_path(&config.authorize_path, path) {
        return Access::AuthorizeEndpoint;
    }
    if config.allow_paths.iter().any(|base| includes_path(base, path)) {
        return Access::AllowedPath;
    }

    tracing::info!(session_id = %session.id(), path, "unauthenticated request denied");
    Access::Denied
}

/// Whether `check` is `base` itself or nested somewhere below it.
///
/// Both paths are normalized lexically first (`.`, `..`, repeated and
/// trailing slashes), then compared segment by segment, so `/foo` matches
/// `/foo` and `/foo/bar` but not `/foobar`. An empty `base` matches nothing.
pub fn includes_path(base: &str, check: &str) -> bool {
    if base.is_empty() {
        return false;
    }
    normalize(check).starts_with(&normalize(base))
}

fn normalize(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::MemoryStore;

    fn config(allow: &[&str]) -> SessionConfig {
        SessionConfig {
            store: Arc::new(MemoryStore::new()),
            allow_paths: allow.iter().map(|p| p.to_string()).collect(),
            ..SessionConfig::default()
        }
    }

    fn anonymous(config: &SessionConfig) -> Session {
        Session::create(Arc::clone(&config.store))
    }

    // =====================================================================
    // includes_path()
    // =====================================================================

    #[test]
    fn test_includes_path_exact_match() {
        assert!(includes_path("/foo", "/foo"));
        assert!(includes_path("/foo", "/foo/"));
        assert!(includes_path("/foo/", "/foo"));
    }

    #[test]
    fn test_includes_path_nested() {
        assert!(includes_path("/foo", "/foo/bar"));
        assert!(includes_path("/foo", "/foo/bar/baz"));
    }

    #[test]
    fn test_includes_path_sibling_with_shared_prefix_rejected() {
        assert!(!includes_path("/foo", "/foobar"));
        assert!(!includes_path("/authorize", "/authorized"));
    }

    #[test]
    fn test_includes_path_parent_escape_rejected() {
        assert!(!includes_path("/foo", "/foo/../bar"));
        assert!(!includes_path("/foo", "/"));
        assert!(!includes_path("/foo/bar", "/foo"));
    }

    #[test]
    fn test_includes_path_normalizes_dots_and_slashes() {
        assert!(includes_path("/foo", "//foo/./bar"));
        assert!(includes_path("/foo", "/baz/../foo/x"));
    }

    #[test]
    fn test_includes_path_root_matches_everything() {
        assert!(includes_path("/", "/"));
        assert!(includes_path("/", "/anything/at/all"));
    }

    #[test]
    fn test_includes_path_empty_base_matches_nothing() {
        assert!(!includes_path("", "/"));
        assert!(!includes_path("", "/foo"));
    }

    // =====================================================================
    // enforce()
    // =====================================================================

    #[test]
    fn test_enforce_authenticated_allows_any_path() {
        let config = config(&[]);
        let mut session = anonymous(&config);
        session.set_token(Some("abc".into()));

        assert_eq!(enforce(&config, &session, "/private"), Access::Authenticated);
    }

    #[test]
    fn test_enforce_authorize_endpoint_and_children_allowed() {
        let config = config(&[]);
        let session = anonymous(&config);

        assert_eq!(
            enforce(&config, &session, "/authorize"),
            Access::AuthorizeEndpoint
        );
        assert_eq!(
            enforce(&config, &session, "/authorize/callback"),
            Access::AuthorizeEndpoint
        );
        assert_eq!(
            enforce(&config, &session, "/authorize?code=1"),
            Access::AuthorizeEndpoint
        );
    }

    #[test]
    fn test_enforce_prefix_but_not_ancestor_denied() {
        let config = config(&[]);
        let session = anonymous(&config);

        assert_eq!(enforce(&config, &session, "/authorized"), Access::Denied);
    }

    #[test]
    fn test_enforce_allow_paths_exempt() {
        let config = config(&["/public", "/health"]);
        let session = anonymous(&config);

        assert_eq!(
            enforce(&config, &session, "/public/logo.png"),
            Access::AllowedPath
        );
        assert_eq!(enforce(&config, &session, "/health"), Access::AllowedPath);
        assert_eq!(enforce(&config, &session, "/healthz"), Access::Denied);
    }

    #[test]
    fn test_access_is_allowed() {
        assert!(Access::Authenticated.is_allowed());
        assert!(Access::AuthorizeEndpoint.is_allowed());
        assert!(Access::AllowedPath.is_allowed());
        assert!(!Access::Denied.is_allowed());
    }
}
