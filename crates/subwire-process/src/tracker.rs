//! Process-wide registry of currently running processes

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use once_cell::sync::Lazy;
use tracing::{debug, info, warn};

use crate::destroy::{DestroyResult, ProcessDestructor};
use crate::handle::ProcessHandle;

static GLOBAL: Lazy<Arc<ProcessTracker>> = Lazy::new(|| Arc::new(ProcessTracker::new()));

/// Registry of live process handles, shared across concurrent launches.
///
/// A handle is present exactly while its launch is between "started" and
/// "endpoints closed". The registry exists so a shutdown path can sweep
/// orphaned children with [`destroy_all`](ProcessTracker::destroy_all);
/// wire that into the host's exit handling to avoid leaking processes on
/// abnormal termination.
#[derive(Debug, Default)]
pub struct ProcessTracker {
    inner: Mutex<HashMap<u32, ProcessHandle>>,
}

impl ProcessTracker {
    /// Create an isolated tracker (useful for tests and embedders that
    /// scope cleanup themselves)
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide default tracker, created on first use
    pub fn global() -> Arc<ProcessTracker> {
        GLOBAL.clone()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u32, ProcessHandle>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register a running process. Idempotent.
    pub fn add(&self, handle: ProcessHandle) {
        debug!(pid = handle.pid(), "Tracking process");
        self.lock().insert(handle.pid(), handle);
    }

    /// Unregister a process. Idempotent; unknown pids are ignored.
    pub fn remove(&self, pid: u32) {
        if self.lock().remove(&pid).is_some() {
            debug!(pid, "Untracked process");
        }
    }

    /// True if the pid is currently tracked
    pub fn contains(&self, pid: u32) -> bool {
        self.lock().contains_key(&pid)
    }

    /// Number of currently tracked processes
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Best-effort cleanup sweep: terminate every tracked process, wait up
    /// to `grace` for each, and escalate stragglers to a forced kill with
    /// another `grace` wait. Individual failures never abort the sweep.
    ///
    /// Returns the number of processes confirmed terminated.
    pub async fn destroy_all(&self, grace: Duration) -> usize {
        let snapshot: Vec<ProcessHandle> = self.lock().values().cloned().collect();
        if snapshot.is_empty() {
            return 0;
        }
        info!(count = snapshot.len(), "Destroying all tracked processes");

        let mut terminated = 0;
        for handle in snapshot {
            let pid = handle.pid();
            let term = ProcessDestructor::new(handle).send_term_signal();
            let term = term.await_termination(grace).await;
            let result = match term.result() {
                DestroyResult::Terminated => DestroyResult::Terminated,
                DestroyResult::StillAlive => {
                    warn!(pid, "Process ignored terminate, escalating to kill");
                    term.elevate().await_termination(grace).await.result()
                }
            };
            match result {
                DestroyResult::Terminated => terminated += 1,
                DestroyResult::StillAlive => warn!(pid, "Process survived destroy sweep"),
            }
        }
        terminated
    }
}
