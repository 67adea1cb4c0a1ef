//! # subwire-process
//!
//! **Purpose**: Launch external OS processes, pump their standard streams,
//! and guarantee cleanup on every exit path
//!
//! Provides async process launching with configurable stream endpoints,
//! concurrent stdin/stdout/stderr pumping, a process-wide tracker for
//! crash-cleanup sweeps, and a terminate→kill destroy state machine.
//!
//! ## Features
//!
//! - **Launching**: spec-driven spawn (executable, args, env overrides,
//!   working directory) with fail-fast validation
//! - **Stream Endpoints**: discard / in-memory / file / inherit variants for
//!   each of the three standard streams
//! - **Stream Conduit**: independent bounded-buffer pumps; a slow or failing
//!   stream never stalls its siblings
//! - **Process Tracking**: process-wide registry with a best-effort
//!   `destroy_all` sweep for shutdown paths
//! - **Destroy Attempts**: terminate-then-kill escalation modeled as
//!   immutable, awaitable attempt values
//! - **Cancellation**: cancelling a launch destroys the process instead of
//!   abandoning it
//!
//! ## Usage
//!
//! ```rust,no_run
//! use subwire_process::{ProcessLauncher, ProcessSpec, StreamEndpoints};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let launcher = ProcessLauncher::new();
//!
//! let spec = ProcessSpec::new("echo").arg("hello");
//! let execution = launcher.launch(spec, StreamEndpoints::memory()).await?;
//!
//! let result = execution.wait().await?;
//! assert_eq!(result.exit_code(), Some(0));
//! println!("{}", result.output().stdout_string_lossy().unwrap());
//! # Ok(())
//! # }
//! ```

pub mod conduit;
pub mod destroy;
pub mod endpoint;
pub mod error;
pub mod handle;
pub mod launcher;
pub mod result;
pub mod spec;
pub mod tracker;

pub use conduit::PumpError;
pub use destroy::{DestroyResult, KillAttempt, ProcessDestructor, TermAttempt};
pub use endpoint::{ByteBucket, InputSource, OutputSink, StreamEndpoints};
pub use error::{LaunchError, Result};
pub use handle::ProcessHandle;
pub use launcher::{Execution, ProcessLauncher};
pub use result::{Captured, CapturedOutput, ExecutionResult};
pub use spec::ProcessSpec;
pub use tracker::ProcessTracker;
