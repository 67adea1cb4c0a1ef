//! Error types for process launching

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Launch and execution errors
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configured working directory does not exist or is not a directory.
    /// Raised before any OS process is created.
    #[error("working directory is not a directory: {}", path.display())]
    InvalidWorkingDirectory { path: PathBuf },

    /// The OS failed to create the process (missing executable,
    /// permission denied, resource exhaustion). No handle was tracked.
    #[error("failed to start process: {0}")]
    Spawn(#[source] io::Error),

    /// Opening a stream endpoint failed after the process was started.
    /// The process is destroyed before this error is surfaced.
    #[error("failed to open stream endpoint: {0}")]
    Endpoint(#[source] io::Error),

    /// A stdout/stderr pump failed mid-execution (broken pipe, disk full
    /// writing a capture file). The process is destroyed before this error
    /// is surfaced.
    #[error("stream I/O failure on {stream}: {source}")]
    Stream {
        stream: &'static str,
        #[source]
        source: io::Error,
    },

    /// The launch was cancelled before the process exited. The process is
    /// destroyed before this error is surfaced.
    #[error("launch cancelled before the process exited")]
    Interrupted,

    /// Waiting on the process ended without an exit status.
    #[error("process wait ended without an exit status")]
    NotTerminated,

    /// The background execution worker failed.
    #[error("execution worker failed: {0}")]
    Worker(String),
}

/// Result type for launch operations
pub type Result<T> = std::result::Result<T, LaunchError>;
