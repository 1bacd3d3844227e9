//! The pluggable persistence seam for sessions.
//!
//! Wicket ships one implementation, [`MemoryStore`](crate::MemoryStore).
//! Durable backends (disk, Redis, SQL) implement the same trait and plug
//! into [`SessionConfig::store`](crate::SessionConfig::store).
//!
//! Every method may suspend, so the binder and the reaper treat each call
//! as I/O. "Not found" is `Ok(None)` / `Ok(false)`; `Err` always means the
//! backend failed.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use crate::{SessionData, StoreError};

/// Storage backend for sessions, keyed by session id.
///
/// Implementations must be safe to share across tasks. Per-key
/// last-write-wins is sufficient; no cross-key transactions are needed.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Fetches the session stored under `id`.
    ///
    /// Returns `Ok(None)` when `id` is empty or unknown.
    async fn get(&self, id: &str) -> Result<Option<SessionData>, StoreError>;

    /// Upserts `session` under its id and returns what was stored.
    async fn set(&self, session: SessionData) -> Result<SessionData, StoreError>;

    /// Removes the entry for `id`. Returns whether one existed.
    async fn del(&self, id: &str) -> Result<bool, StoreError>;

    /// Deletes every session whose last save is older than `max_age`.
    ///
    /// Returns the ids that were evicted. Backends with a large key space
    /// should paginate internally.
    async fn reap(&self, max_age: Duration) -> Result<Vec<String>, StoreError>;

    /// Number of stored sessions.
    async fn len(&self) -> Result<usize, StoreError>;
}

/// The reap horizon: sessions saved strictly before this instant are stale.
pub fn horizon(max_age: Duration) -> DateTime<Utc> {
    let now = Utc::now();
    TimeDelta::from_std(max_age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizon_subtracts_max_age() {
        let before = Utc::now();
        let h = horizon(Duration::from_secs(60));
        let after = Utc::now();

        assert!(h >= before - TimeDelta::seconds(60));
        assert!(h <= after - TimeDelta::seconds(60));
    }

    #[test]
    fn test_horizon_saturates_on_huge_age() {
        assert_eq!(horizon(Duration::MAX), DateTime::<Utc>::MIN_UTC);
    }
}
