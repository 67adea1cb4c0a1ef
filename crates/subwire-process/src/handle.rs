//! Shared handle to a launched process

use std::process::ExitStatus;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;

/// Publisher side of a handle's exit status. Held by the launch worker and
/// fed exactly once, when the child is reaped.
pub(crate) type StatusCell = watch::Sender<Option<ExitStatus>>;

/// Read-only handle to a launched process: its pid plus an exit-status
/// broadcast fed by the launch worker.
///
/// Clones observe the same process. The handle reports a process as alive
/// until the launch worker has actually reaped it, so a terminated verdict
/// is never derived from anything but a real exit.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pid: u32,
    status: watch::Receiver<Option<ExitStatus>>,
}

impl ProcessHandle {
    /// Create a handle and its status publisher
    pub(crate) fn new(pid: u32) -> (Self, StatusCell) {
        let (tx, rx) = watch::channel(None);
        (Self { pid, status: rx }, tx)
    }

    /// OS process id
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Exit status snapshot, `None` while the process has not been reaped
    pub fn exit_status(&self) -> Option<ExitStatus> {
        *self.status.borrow()
    }

    /// True until the launch worker reaps the process
    pub fn is_alive(&self) -> bool {
        self.exit_status().is_none()
    }

    /// Wait at most `dur` for the process to exit. Returns the exit status
    /// if it exited within the window, `None` otherwise.
    pub async fn wait_timeout(&self, dur: Duration) -> Option<ExitStatus> {
        if let Some(status) = self.exit_status() {
            return Some(status);
        }
        let mut rx = self.status.clone();
        let result = match timeout(dur, rx.wait_for(|status| status.is_some())).await {
            Ok(Ok(status)) => *status,
            // Timed out, or the publisher vanished without reaping.
            Ok(Err(_)) | Err(_) => None,
        };
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_status(code: i32) -> ExitStatus {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            ExitStatus::from_raw(code << 8)
        }
        #[cfg(windows)]
        {
            use std::os::windows::process::ExitStatusExt;
            ExitStatus::from_raw(code as u32)
        }
    }

    #[tokio::test]
    async fn test_alive_until_published() {
        let (handle, cell) = ProcessHandle::new(12345);
        assert!(handle.is_alive());
        assert!(handle.exit_status().is_none());

        cell.send_replace(Some(fake_status(0)));
        assert!(!handle.is_alive());
        assert_eq!(handle.exit_status().unwrap().code(), Some(0));
    }

    #[tokio::test]
    async fn test_wait_timeout_expires_while_alive() {
        let (handle, _cell) = ProcessHandle::new(12345);
        let waited = handle.wait_timeout(Duration::from_millis(20)).await;
        assert!(waited.is_none());
    }

    #[tokio::test]
    async fn test_wait_timeout_observes_publish() {
        let (handle, cell) = ProcessHandle::new(12345);
        let waiter = tokio::spawn({
            let handle = handle.clone();
            async move { handle.wait_timeout(Duration::from_secs(5)).await }
        });
        cell.send_replace(Some(fake_status(3)));
        let status = waiter.await.unwrap().unwrap();
        assert_eq!(status.code(), Some(3));
    }

    #[tokio::test]
    async fn test_clones_share_status() {
        let (handle, cell) = ProcessHandle::new(42);
        let other = handle.clone();
        cell.send_replace(Some(fake_status(7)));
        assert_eq!(other.exit_status().unwrap().code(), Some(7));
        assert_eq!(other.pid(), 42);
    }
}
