//! Session configuration: defaults, per-call overrides, and the
//! process-wide shared value.
//!
//! Three layers:
//!
//! ```text
//! SharedConfig (process-wide, mutable by key)
//!     │ snapshot()
//!     ▼
//! SessionConfig ──merged(&SessionOptions)──→ SessionConfig (per call)
//! ```
//!
//! Middleware merges its overrides at every invocation, so any key the
//! caller did not override keeps following the shared value.

use std::fmt;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};
use std::time::Duration;

use serde::Deserialize;

use crate::reaper::{self, ReaperHandle};
use crate::{MemoryStore, SessionStore};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Fully-resolved session settings.
#[derive(Clone)]
pub struct SessionConfig {
    /// Name of the cookie (or other carrier key) holding the session id.
    pub cookie_name: String,

    /// Where sessions are persisted.
    pub store: Arc<dyn SessionStore>,

    /// Sessions idle longer than this many minutes are reaped. Also the
    /// lifetime of the carrier cookie.
    pub max_age_minutes: u64,

    /// Seconds between reaper sweeps. 0 disables reaping.
    pub reap_interval_secs: u64,

    /// The authorization endpoint. Unauthenticated requests are sent here.
    pub authorize_path: String,

    /// Paths (and everything below them) reachable without a token.
    pub allow_paths: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "Session-ID".to_string(),
            store: Arc::new(MemoryStore::new()),
            max_age_minutes: 60,
            reap_interval_secs: 60,
            authorize_path: "/authorize".to_string(),
            allow_paths: Vec::new(),
        }
    }
}

impl SessionConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_minutes.saturating_mul(60))
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }

    /// Returns a copy of `self` with every override in `options` applied.
    pub fn merged(&self, options: &SessionOptions) -> Self {
        Self {
            cookie_name: options
                .cookie_name
                .clone()
                .unwrap_or_else(|| self.cookie_name.clone()),
            store: options
                .store
                .clone()
                .unwrap_or_else(|| Arc::clone(&self.store)),
            max_age_minutes: options.max_age_minutes.unwrap_or(self.max_age_minutes),
            reap_interval_secs: options
                .reap_interval_secs
                .unwrap_or(self.reap_interval_secs),
            authorize_path: options
                .authorize_path
                .clone()
                .unwrap_or_else(|| self.authorize_path.clone()),
            allow_paths: options
                .allow_paths
                .clone()
                .unwrap_or_else(|| self.allow_paths.clone()),
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("cookie_name", &self.cookie_name)
            .field("max_age_minutes", &self.max_age_minutes)
            .field("reap_interval_secs", &self.reap_interval_secs)
            .field("authorize_path", &self.authorize_path)
            .field("allow_paths", &self.allow_paths)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// SessionOptions
// ---------------------------------------------------------------------------

/// Per-call overrides. Unset fields fall through to the base config.
///
/// Deserializable so hosts can keep these in their own config files.
/// The store cannot come from a file and must be set in code.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    pub cookie_name: Option<String>,
    #[serde(skip)]
    pub store: Option<Arc<dyn SessionStore>>,
    #[serde(alias = "maxage")]
    pub max_age_minutes: Option<u64>,
    #[serde(alias = "reap_interval")]
    pub reap_interval_secs: Option<u64>,
    pub authorize_path: Option<String>,
    pub allow_paths: Option<Vec<String>>,
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = Some(name.into());
        self
    }

    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn max_age_minutes(mut self, minutes: u64) -> Self {
        self.max_age_minutes = Some(minutes);
        self
    }

    pub fn reap_interval_secs(mut self, secs: u64) -> Self {
        self.reap_interval_secs = Some(secs);
        self
    }

    pub fn authorize_path(mut self, path: impl Into<String>) -> Self {
        self.authorize_path = Some(path.into());
        self
    }

    pub fn allow_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_paths = Some(paths.into_iter().map(Into::into).collect());
        self
    }
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOptions")
            .field("cookie_name", &self.cookie_name)
            .field("store", &self.store.as_ref().map(|_| "<custom>"))
            .field("max_age_minutes", &self.max_age_minutes)
            .field("reap_interval_secs", &self.reap_interval_secs)
            .field("authorize_path", &self.authorize_path)
            .field("allow_paths", &self.allow_paths)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Keyed access
// ---------------------------------------------------------------------------

/// Names of the individual settings, for [`SharedConfig::get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    CookieName,
    Store,
    MaxAge,
    ReapInterval,
    AuthorizePath,
    AllowPaths,
}

/// One setting together with its value.
#[derive(Clone)]
pub enum Setting {
    CookieName(String),
    Store(Arc<dyn SessionStore>),
    /// Minutes.
    MaxAge(u64),
    /// Seconds. 0 disables reaping.
    ReapInterval(u64),
    AuthorizePath(String),
    AllowPaths(Vec<String>),
}

impl Setting {
    pub fn key(&self) -> SettingKey {
        match self {
            Self::CookieName(_) => SettingKey::CookieName,
            Self::Store(_) => SettingKey::Store,
            Self::MaxAge(_) => SettingKey::MaxAge,
            Self::ReapInterval(_) => SettingKey::ReapInterval,
            Self::AuthorizePath(_) => SettingKey::AuthorizePath,
            Self::AllowPaths(_) => SettingKey::AllowPaths,
        }
    }
}

impl fmt::Debug for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CookieName(v) => f.debug_tuple("CookieName").field(v).finish(),
            Self::Store(_) => f.write_str("Store(..)"),
            Self::MaxAge(v) => f.debug_tuple("MaxAge").field(v).finish(),
            Self::ReapInterval(v) => f.debug_tuple("ReapInterval").field(v).finish(),
            Self::AuthorizePath(v) => f.debug_tuple("AuthorizePath").field(v).finish(),
            Self::AllowPaths(v) => f.debug_tuple("AllowPaths").field(v).finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// SharedConfig
// ---------------------------------------------------------------------------

/// A cloneable handle to one mutable [`SessionConfig`].
///
/// Every binder, gate, and reaper reading from the same handle sees the
/// latest value at the moment it reads. A request already in flight keeps
/// the snapshot it started with.
#[derive(Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<SessionConfig>>,
}

impl SharedConfig {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Reads a single setting.
    pub fn get(&self, key: SettingKey) -> Setting {
        let config = self.read();
        match key {
            SettingKey::CookieName => Setting::CookieName(config.cookie_name.clone()),
            SettingKey::Store => Setting::Store(Arc::clone(&config.store)),
            SettingKey::MaxAge => Setting::MaxAge(config.max_age_minutes),
            SettingKey::ReapInterval => Setting::ReapInterval(config.reap_interval_secs),
            SettingKey::AuthorizePath => {
                Setting::AuthorizePath(config.authorize_path.clone())
            }
            SettingKey::AllowPaths => Setting::AllowPaths(config.allow_paths.clone()),
        }
    }

    /// Replaces a single setting and returns the value that was stored.
    pub fn set(&self, setting: Setting) -> Setting {
        let mut config = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(key = ?setting.key(), "session setting changed");
        match &setting {
            Setting::CookieName(v) => config.cookie_name = v.clone(),
            Setting::Store(v) => config.store = Arc::clone(v),
            Setting::MaxAge(v) => config.max_age_minutes = *v,
            Setting::ReapInterval(v) => config.reap_interval_secs = *v,
            Setting::AuthorizePath(v) => config.authorize_path = v.clone(),
            Setting::AllowPaths(v) => config.allow_paths = v.clone(),
        }
        setting
    }

    /// A point-in-time copy of the whole configuration.
    pub fn snapshot(&self) -> SessionConfig {
        self.read().clone()
    }

    /// The current configuration with `options` applied on top.
    pub fn resolve(&self, options: &SessionOptions) -> SessionConfig {
        self.read().merged(options)
    }

    pub fn store(&self) -> Arc<dyn SessionStore> {
        Arc::clone(&self.read().store)
    }

    pub fn max_age(&self) -> Duration {
        self.read().max_age()
    }

    pub fn reap_interval(&self) -> Duration {
        self.read().reap_interval()
    }

    /// Starts a reaper for the currently configured store.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_reaper(&self) -> ReaperHandle {
        reaper::spawn(self.store(), self.clone())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SessionConfig> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for SharedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedConfig").field(&*self.read()).finish()
    }
}

static GLOBAL: LazyLock<SharedConfig> = LazyLock::new(SharedConfig::default);

/// The process-wide configuration.
///
/// Set it up once at startup. Changing it while requests are being served
/// is allowed, but in-flight requests keep the values they already read.
pub fn global() -> SharedConfig {
    GLOBAL.clone()
}
