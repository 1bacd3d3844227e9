//! Background eviction of idle sessions.
//!
//! The reaper is one spawned task per store. Each cycle it:
//!
//! 1. re-reads `reap_interval` from the [`SharedConfig`] and exits with
//!    [`ReaperExit::Disabled`] if it is below one second,
//! 2. sleeps for that interval,
//! 3. calls [`SessionStore::reap`] with the current `max_age`.
//!
//! Because the interval is re-read every cycle it can be tuned at runtime.
//! Setting it to 0 lets the in-progress wait finish, runs that last sweep,
//! and then stops the task for good. A disabled reaper does not come back
//! on its own: start a new one with [`spawn`] or
//! [`SharedConfig::start_reaper`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, trace, warn};

use crate::{SessionStore, SharedConfig};

/// Why a reaper task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaperExit {
    /// The configured interval was below one second.
    Disabled,
    /// [`ReaperHandle::stop`] was called.
    Stopped,
    /// The task panicked or was aborted.
    Aborted,
}

/// Owner's handle to a running reaper.
///
/// Dropping the handle detaches the task unless
/// [`abort_on_drop`](Self::abort_on_drop) was set; a detached reaper keeps
/// running until the interval is set to 0.
#[derive(Debug)]
#[must_use = "dropping a ReaperHandle detaches the reaper; keep it to stop the task"]
pub struct ReaperHandle {
    stop: Arc<Notify>,
    sweeps: Arc<AtomicU64>,
    task: Option<JoinHandle<ReaperExit>>,
    abort_on_drop: bool,
}

impl ReaperHandle {
    /// Cancels the pending wait and ends the task. Idempotent.
    pub fn stop(&self) {
        self.stop.notify_one();
    }

    /// Ties the task's lifetime to this handle: dropping it aborts the
    /// reaper instead of detaching it.
    pub fn abort_on_drop(mut self) -> Self {
        self.abort_on_drop = true;
        self
    }

    /// Number of sweeps completed so far, failed ones included.
    pub fn sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Waits for the task to end and reports why.
    pub async fn join(mut self) -> ReaperExit {
        match self.task.take() {
            Some(task) => task.await.unwrap_or(ReaperExit::Aborted),
            None => ReaperExit::Aborted,
        }
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        if !self.abort_on_drop {
            return;
        }
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("session reaper aborted with its handle");
        }
    }
}

/// Starts reaping `store` on the current Tokio runtime.
pub fn spawn(store: Arc<dyn SessionStore>, config: SharedConfig) -> ReaperHandle {
    let stop = Arc::new(Notify::new());
    let sweeps = Arc::new(AtomicU64::new(0));

    let task = tokio::spawn(run(
        store,
        config,
        Arc::clone(&stop),
        Arc::clone(&sweeps),
    ));
    debug!("session reaper started");

    ReaperHandle {
        stop,
        sweeps,
        task: Some(task),
        abort_on_drop: false,
    }
}

async fn run(
    store: Arc<dyn SessionStore>,
    config: SharedConfig,
    stop: Arc<Notify>,
    sweeps: Arc<AtomicU64>,
) -> ReaperExit {
    loop {
        let interval = config.reap_interval();
        if interval < Duration::from_secs(1) {
            debug!("reap interval below one second, reaper disabled");
            return ReaperExit::Disabled;
        }

        tokio::select! {
            _ = time::sleep(interval) => {}
            _ = stop.notified() => {
                debug!("session reaper stopped");
                return ReaperExit::Stopped;
            }
        }

        match store.reap(config.max_age()).await {
            Ok(reaped) => trace!(count = reaped.len(), "reap cycle finished"),
            // A failed sweep never ends the loop; the next cycle retries.
            Err(e) => warn!(error = %e, "reap cycle failed"),
        }
        sweeps.fetch_add(1, Ordering::Relaxed);
    }
}
