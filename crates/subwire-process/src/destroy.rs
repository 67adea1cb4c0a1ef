//! Process destruction: terminate/kill signals and awaitable destroy attempts

use std::time::Duration;

use tracing::{debug, warn};

use crate::handle::ProcessHandle;

/// Snapshot of a process's liveness after a destroy step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyResult {
    /// The process has exited
    Terminated,
    /// The process persists
    StillAlive,
}

/// Which signal a destroy step sends
#[derive(Debug, Clone, Copy)]
enum SignalKind {
    /// Graceful request to exit (SIGTERM)
    Term,
    /// Forced immediate termination (SIGKILL)
    Kill,
}

/// Outcome of one signal sent to a process. A terminated attempt is
/// terminal; a still-alive attempt carries the handle needed to keep
/// waiting. Attempts are immutable values: waiting or escalating returns a
/// new attempt rather than mutating in place.
#[derive(Debug)]
struct Attempt {
    result: DestroyResult,
    /// Present only while the result is still-alive
    handle: Option<ProcessHandle>,
}

impl Attempt {
    fn terminated() -> Self {
        Self {
            result: DestroyResult::Terminated,
            handle: None,
        }
    }

    fn alive(handle: ProcessHandle) -> Self {
        Self {
            result: DestroyResult::StillAlive,
            handle: Some(handle),
        }
    }

    async fn await_termination(self, timeout: Duration) -> Self {
        match self.handle {
            None => self,
            Some(handle) => {
                if handle.wait_timeout(timeout).await.is_some() {
                    Attempt::terminated()
                } else {
                    Attempt::alive(handle)
                }
            }
        }
    }
}

/// Outcome of a graceful terminate signal.
///
/// If waiting times out, the attempt can be elevated into a [`KillAttempt`],
/// which sends the forced signal and restarts the wait.
#[derive(Debug)]
pub struct TermAttempt {
    inner: Attempt,
}

impl TermAttempt {
    /// Current snapshot for this attempt
    pub fn result(&self) -> DestroyResult {
        self.inner.result
    }

    /// Wait at most `timeout` for the process to exit, yielding a refreshed
    /// attempt. A terminated attempt returns itself unchanged.
    pub async fn await_termination(self, timeout: Duration) -> TermAttempt {
        TermAttempt {
            inner: self.inner.await_termination(timeout).await,
        }
    }

    /// Escalate to a forced kill. Sends the kill signal if the process
    /// persists; a no-op on an already-terminated attempt.
    pub fn elevate(self) -> KillAttempt {
        match self.inner.handle {
            None => KillAttempt {
                inner: Attempt::terminated(),
            },
            Some(handle) => {
                if !handle.is_alive() {
                    return KillAttempt {
                        inner: Attempt::terminated(),
                    };
                }
                send_signal(handle.pid(), SignalKind::Kill);
                KillAttempt {
                    inner: Attempt::alive(handle),
                }
            }
        }
    }
}

/// Outcome of a forced kill signal. A kill attempt that stays still-alive
/// after waiting is terminal: the signal repertoire is exhausted.
#[derive(Debug)]
pub struct KillAttempt {
    inner: Attempt,
}

impl KillAttempt {
    /// Current snapshot for this attempt
    pub fn result(&self) -> DestroyResult {
        self.inner.result
    }

    /// Wait at most `timeout` for the process to exit, yielding a refreshed
    /// attempt. A terminated attempt returns itself unchanged.
    pub async fn await_termination(self, timeout: Duration) -> KillAttempt {
        KillAttempt {
            inner: self.inner.await_termination(timeout).await,
        }
    }
}

/// Sends terminate/kill signals to one live process and produces the
/// corresponding attempt. Liveness is snapshotted first, so destroying an
/// already-dead process never touches the OS and reports terminated.
#[derive(Debug)]
pub struct ProcessDestructor {
    handle: ProcessHandle,
}

impl ProcessDestructor {
    /// Bind a destructor to a process handle
    pub fn new(handle: ProcessHandle) -> Self {
        Self { handle }
    }

    /// Send the graceful terminate signal, unless the process already exited
    pub fn send_term_signal(&self) -> TermAttempt {
        if !self.handle.is_alive() {
            return TermAttempt {
                inner: Attempt::terminated(),
            };
        }
        send_signal(self.handle.pid(), SignalKind::Term);
        TermAttempt {
            inner: Attempt::alive(self.handle.clone()),
        }
    }

    /// Send the forced kill signal, unless the process already exited
    pub fn send_kill_signal(&self) -> KillAttempt {
        if !self.handle.is_alive() {
            return KillAttempt {
                inner: Attempt::terminated(),
            };
        }
        send_signal(self.handle.pid(), SignalKind::Kill);
        KillAttempt {
            inner: Attempt::alive(self.handle.clone()),
        }
    }
}

/// Best-effort signal delivery. A send that races with natural exit (the
/// process is already gone) counts as success.
#[cfg(unix)]
fn send_signal(pid: u32, kind: SignalKind) {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let signal = match kind {
        SignalKind::Term => Signal::SIGTERM,
        SignalKind::Kill => Signal::SIGKILL,
    };
    match kill(Pid::from_raw(pid as i32), signal) {
        Ok(()) => debug!(pid, %signal, "Signal sent"),
        Err(Errno::ESRCH) => debug!(pid, %signal, "Process already gone"),
        Err(errno) => warn!(pid, %signal, %errno, "Failed to send signal"),
    }
}

/// Best-effort signal delivery via `taskkill`; `/f` forces termination.
#[cfg(windows)]
fn send_signal(pid: u32, kind: SignalKind) {
    use std::process::{Command, Stdio};

    let mut cmd = Command::new("taskkill");
    cmd.args(["/pid", &pid.to_string()]);
    if matches!(kind, SignalKind::Kill) {
        cmd.arg("/f");
    }
    let spawned = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    match spawned {
        Ok(_) => debug!(pid, ?kind, "taskkill issued"),
        Err(error) => warn!(pid, ?kind, %error, "Failed to run taskkill"),
    }
}
