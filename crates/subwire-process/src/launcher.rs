//! Launcher: spawn, track, pump, wait, destroy, resolve

use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::conduit::Conduit;
use crate::destroy::{DestroyResult, ProcessDestructor};
use crate::endpoint::StreamEndpoints;
use crate::error::{LaunchError, Result};
use crate::handle::{ProcessHandle, StatusCell};
use crate::result::{Captured, CapturedOutput, ExecutionResult};
use crate::spec::ProcessSpec;
use crate::tracker::ProcessTracker;

/// Grace period between the terminate signal and the kill escalation on
/// abort paths
const TERM_GRACE: Duration = Duration::from_millis(200);

/// A launched process: the live handle plus the awaitable outcome.
///
/// The launch call returns promptly; waiting, pumping, and cleanup run on a
/// background worker. [`wait`](Execution::wait) resolves once the process
/// has exited (or been destroyed) and all endpoints are closed.
#[derive(Debug)]
pub struct Execution {
    handle: ProcessHandle,
    cancel: CancellationToken,
    worker: JoinHandle<Result<ExecutionResult>>,
}

impl Execution {
    /// Handle to the running process
    pub fn handle(&self) -> &ProcessHandle {
        &self.handle
    }

    /// OS process id
    pub fn pid(&self) -> u32 {
        self.handle.pid()
    }

    /// Request cancellation: the worker stops waiting, destroys the process
    /// if it is still alive, and resolves with [`LaunchError::Interrupted`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Await the final result. Blocks (asynchronously) until the worker has
    /// finished steps wait → destroy-on-abort → untrack → close endpoints.
    pub async fn wait(self) -> Result<ExecutionResult> {
        match self.worker.await {
            Ok(result) => result,
            Err(join) => Err(LaunchError::Worker(join.to_string())),
        }
    }

    /// Cancel and await the (interrupted) outcome in one step
    pub async fn cancel_and_wait(self) -> Result<ExecutionResult> {
        self.cancel();
        self.wait().await
    }
}

/// Launches processes and orchestrates their full lifecycle.
///
/// Every launch registers the process with the tracker for crash-cleanup
/// sweeps and guarantees that any non-terminating path (cancellation,
/// endpoint failure, stream failure) destroys the process before the
/// caller observes the outcome.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    tracker: Arc<ProcessTracker>,
}

impl ProcessLauncher {
    /// Launcher backed by the process-wide default tracker
    pub fn new() -> Self {
        Self {
            tracker: ProcessTracker::global(),
        }
    }

    /// Launcher backed by an explicit tracker capability
    pub fn with_tracker(tracker: Arc<ProcessTracker>) -> Self {
        Self { tracker }
    }

    /// The tracker this launcher registers processes with
    pub fn tracker(&self) -> &Arc<ProcessTracker> {
        &self.tracker
    }

    /// Launch a process and start pumping its streams.
    ///
    /// Fails fast with [`LaunchError::InvalidWorkingDirectory`] or
    /// [`LaunchError::Spawn`] before anything is tracked. On success the
    /// returned [`Execution`] resolves with the exit code once the process
    /// terminates; endpoints are closed exactly once on every path.
    pub async fn launch(
        &self,
        spec: ProcessSpec,
        endpoints: StreamEndpoints,
    ) -> Result<Execution> {
        if let Some(ref dir) = spec.working_dir {
            if !dir.is_dir() {
                return Err(LaunchError::InvalidWorkingDirectory { path: dir.clone() });
            }
        }

        let mut cmd = Command::new(&spec.executable);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(endpoints.stdin.stdio())
            .stdout(endpoints.stdout.stdio())
            .stderr(endpoints.stderr.stdio());
        if let Some(ref dir) = spec.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(LaunchError::Spawn)?;
        let pid = child.id().unwrap_or(0);
        info!(pid, executable = %spec.executable, "Process spawned");

        let (handle, cell) = ProcessHandle::new(pid);
        self.tracker.add(handle.clone());

        // Open all endpoints as one group; any failure takes the cleanup
        // path with the process destroyed and untracked.
        let opened = async {
            let stdin = endpoints.stdin.open().await?;
            let stdout = endpoints.stdout.open().await?;
            let stderr = endpoints.stderr.open().await?;
            std::io::Result::Ok((stdin, stdout, stderr))
        }
        .await;
        let (stdin, stdout, stderr) = match opened {
            Ok(streams) => streams,
            Err(error) => {
                warn!(pid, %error, "Endpoint open failed, destroying process");
                destroy_and_reap(&mut child, &handle, &cell).await;
                self.tracker.remove(pid);
                return Err(LaunchError::Endpoint(error));
            }
        };

        let captured = CapturedOutput {
            stdout: Captured::from_sink(&endpoints.stdout),
            stderr: Captured::from_sink(&endpoints.stderr),
        };
        let conduit = Conduit::connect(&mut child, stdin, stdout, stderr);

        let cancel = CancellationToken::new();
        let worker = tokio::spawn(follow(
            child,
            conduit,
            handle.clone(),
            cell,
            Arc::clone(&self.tracker),
            cancel.clone(),
            captured,
        ));

        Ok(Execution {
            handle,
            cancel,
            worker,
        })
    }
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self::new()
    }
}

/// How the wait phase ended
enum WaitOutcome {
    Exited(std::process::ExitStatus),
    WaitFailed(std::io::Error),
    Cancelled,
    StreamFailed,
}

/// Background worker: wait for exit while staying responsive to cancellation
/// and pump failure, then clean up in lifecycle order (exit-or-destroy →
/// untrack → close conduit and endpoints → resolve result).
async fn follow(
    mut child: Child,
    conduit: Conduit,
    handle: ProcessHandle,
    cell: StatusCell,
    tracker: Arc<ProcessTracker>,
    cancel: CancellationToken,
    captured: CapturedOutput,
) -> Result<ExecutionResult> {
    let pid = handle.pid();
    let stream_failure = conduit.failure_token();

    let outcome = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => WaitOutcome::Exited(status),
            Err(error) => WaitOutcome::WaitFailed(error),
        },
        _ = cancel.cancelled() => WaitOutcome::Cancelled,
        _ = stream_failure.cancelled() => WaitOutcome::StreamFailed,
    };

    match outcome {
        WaitOutcome::Exited(status) => {
            debug!(pid, code = ?status.code(), "Process exited");
            cell.send_replace(Some(status));
            tracker.remove(pid);
            let pump_errors = conduit.complete().await;
            if !pump_errors.is_empty() {
                warn!(pid, errors = pump_errors.len(), "Pumps recorded errors");
            }
            Ok(ExecutionResult::new(status, captured, pump_errors))
        }
        WaitOutcome::WaitFailed(error) => {
            warn!(pid, %error, "Waiting on process failed, destroying");
            let _ = conduit.abort().await;
            destroy_and_reap(&mut child, &handle, &cell).await;
            tracker.remove(pid);
            Err(LaunchError::NotTerminated)
        }
        WaitOutcome::Cancelled => {
            info!(pid, "Launch cancelled, destroying process");
            let _ = conduit.abort().await;
            destroy_and_reap(&mut child, &handle, &cell).await;
            tracker.remove(pid);
            Err(LaunchError::Interrupted)
        }
        WaitOutcome::StreamFailed => {
            warn!(pid, "Output pump failed, destroying process");
            let mut pump_errors = conduit.abort().await;
            destroy_and_reap(&mut child, &handle, &cell).await;
            tracker.remove(pid);
            let (stream, source) = match pump_errors
                .iter()
                .position(|e| e.stream != "stdin")
            {
                Some(idx) => {
                    let err = pump_errors.swap_remove(idx);
                    (err.stream, err.error)
                }
                None => ("stdout", std::io::Error::other("pump failed")),
            };
            Err(LaunchError::Stream { stream, source })
        }
    }
}

/// Destroy-on-abort: terminate first, escalate to kill after a bounded
/// grace, and reap the child so its exit is published and no zombie is
/// left. A process that already exited short-circuits to a no-op.
async fn destroy_and_reap(child: &mut Child, handle: &ProcessHandle, cell: &StatusCell) {
    if let Ok(Some(status)) = child.try_wait() {
        cell.send_replace(Some(status));
        return;
    }

    let destructor = ProcessDestructor::new(handle.clone());
    let term = destructor.send_term_signal();
    if term.result() == DestroyResult::Terminated {
        return;
    }

    match timeout(TERM_GRACE, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(pid = handle.pid(), "Process terminated gracefully");
            cell.send_replace(Some(status));
        }
        Ok(Err(error)) => warn!(pid = handle.pid(), %error, "Reaping after terminate failed"),
        Err(_) => {
            let _kill = term.elevate();
            match child.wait().await {
                Ok(status) => {
                    debug!(pid = handle.pid(), "Process killed");
                    cell.send_replace(Some(status));
                }
                Err(error) => warn!(pid = handle.pid(), %error, "Reaping after kill failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{InputSource, OutputSink};
    use std::path::PathBuf;

    fn launcher() -> (ProcessLauncher, Arc<ProcessTracker>) {
        let tracker = Arc::new(ProcessTracker::new());
        (ProcessLauncher::with_tracker(Arc::clone(&tracker)), tracker)
    }

    #[tokio::test]
    async fn test_launch_echo() {
        let (launcher, tracker) = launcher();
        let exec = launcher
            .launch(
                ProcessSpec::new("echo").arg("hello"),
                StreamEndpoints::memory(),
            )
            .await
            .unwrap();
        let result = exec.wait().await.unwrap();

        assert_eq!(result.exit_code(), Some(0));
        assert_eq!(result.output().stdout_string_lossy().unwrap(), "hello\n");
        assert_eq!(result.output().stderr_string_lossy().unwrap(), "");
        assert_eq!(tracker.count(), 0);
    }

    #[tokio::test]
    async fn test_launch_exit_code() {
        let (launcher, _tracker) = launcher();
        let exec = launcher
            .launch(
                ProcessSpec::new("sh").args(["-c", "exit 3"]),
                StreamEndpoints::discard(),
            )
            .await
            .unwrap();
        let result = exec.wait().await.unwrap();
        assert_eq!(result.exit_code(), Some(3));
        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_invalid_working_directory_fails_before_spawn() {
        let (launcher, tracker) = launcher();
        let err = launcher
            .launch(
                ProcessSpec::new("true").working_dir("/nonexistent/subwire/dir"),
                StreamEndpoints::discard(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::InvalidWorkingDirectory { .. }));
        assert_eq!(tracker.count(), 0);
    }

    #[tokio::test]
    async fn test_missing_executable_fails_untracked() {
        let (launcher, tracker) = launcher();
        let before = tracker.count();
        let err = launcher
            .launch(
                ProcessSpec::new("subwire-no-such-binary-a8c1"),
                StreamEndpoints::discard(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::Spawn(_)));
        assert_eq!(tracker.count(), before);
    }

    #[tokio::test]
    async fn test_tracked_while_running() {
        let (launcher, tracker) = launcher();
        let exec = launcher
            .launch(
                ProcessSpec::new("sleep").arg("5"),
                StreamEndpoints::discard(),
            )
            .await
            .unwrap();
        assert!(tracker.contains(exec.pid()));
        assert!(exec.handle().is_alive());

        let err = exec.cancel_and_wait().await.unwrap_err();
        assert!(matches!(err, LaunchError::Interrupted));
        assert_eq!(tracker.count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_publishes_exit() {
        let (launcher, _tracker) = launcher();
        let exec = launcher
            .launch(
                ProcessSpec::new("sleep").arg("30"),
                StreamEndpoints::discard(),
            )
            .await
            .unwrap();
        let handle = exec.handle().clone();
        exec.cancel();
        let _ = exec.wait().await;
        assert!(!handle.is_alive());
    }

    #[tokio::test]
    async fn test_env_override() {
        let (launcher, _tracker) = launcher();
        let exec = launcher
            .launch(
                ProcessSpec::new("sh")
                    .args(["-c", "printf %s \"$SUBWIRE_TEST_VAR\""])
                    .env("SUBWIRE_TEST_VAR", "42"),
                StreamEndpoints::memory(),
            )
            .await
            .unwrap();
        let result = exec.wait().await.unwrap();
        assert_eq!(result.output().stdout_string_lossy().unwrap(), "42");
    }

    #[tokio::test]
    async fn test_endpoint_open_failure_destroys_process() {
        let (launcher, tracker) = launcher();
        let endpoints = StreamEndpoints::new(
            InputSource::File(PathBuf::from("/nonexistent/subwire/input")),
            OutputSink::Discard,
            OutputSink::Discard,
        );
        let err = launcher
            .launch(ProcessSpec::new("sleep").arg("30"), endpoints)
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::Endpoint(_)));
        assert_eq!(tracker.count(), 0);
    }

    #[tokio::test]
    async fn test_stdin_bytes_round_trip() {
        let (launcher, _tracker) = launcher();
        let exec = launcher
            .launch(
                ProcessSpec::new("cat"),
                StreamEndpoints::memory_with_input(&b"ping pong"[..]),
            )
            .await
            .unwrap();
        let result = exec.wait().await.unwrap();
        assert_eq!(result.exit_code(), Some(0));
        assert_eq!(result.output().stdout_bytes().unwrap(), b"ping pong");
    }
}
