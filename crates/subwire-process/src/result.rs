//! Execution results and captured output

use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use crate::conduit::PumpError;
use crate::endpoint::{ByteBucket, OutputSink};

/// Where one output stream ended up
#[derive(Debug, Clone)]
pub enum Captured {
    /// Nothing retained (discarded or inherited)
    None,
    /// Captured into an in-memory bucket
    Memory(ByteBucket),
    /// Captured into a file at this path
    File(PathBuf),
}

impl Captured {
    pub(crate) fn from_sink(sink: &OutputSink) -> Self {
        match sink {
            OutputSink::Discard | OutputSink::Inherit => Captured::None,
            OutputSink::Memory(bucket) => Captured::Memory(bucket.clone()),
            OutputSink::File(path) => Captured::File(path.clone()),
        }
    }

    /// Captured bytes, for in-memory captures
    pub fn bytes(&self) -> Option<Vec<u8>> {
        match self {
            Captured::Memory(bucket) => Some(bucket.snapshot()),
            _ => None,
        }
    }

    /// Captured bytes decoded as UTF-8 (lossy), for in-memory captures
    pub fn string_lossy(&self) -> Option<String> {
        match self {
            Captured::Memory(bucket) => Some(bucket.to_string_lossy()),
            _ => None,
        }
    }

    /// Path of the capture file, for file captures
    pub fn file_path(&self) -> Option<&Path> {
        match self {
            Captured::File(path) => Some(path.as_path()),
            _ => None,
        }
    }
}

/// Captured stdout and stderr of one launch
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    /// Where stdout ended up
    pub stdout: Captured,
    /// Where stderr ended up
    pub stderr: Captured,
}

impl CapturedOutput {
    /// Captured stdout bytes, if stdout was captured in memory
    pub fn stdout_bytes(&self) -> Option<Vec<u8>> {
        self.stdout.bytes()
    }

    /// Captured stderr bytes, if stderr was captured in memory
    pub fn stderr_bytes(&self) -> Option<Vec<u8>> {
        self.stderr.bytes()
    }

    /// Captured stdout decoded as UTF-8 (lossy)
    pub fn stdout_string_lossy(&self) -> Option<String> {
        self.stdout.string_lossy()
    }

    /// Captured stderr decoded as UTF-8 (lossy)
    pub fn stderr_string_lossy(&self) -> Option<String> {
        self.stderr.string_lossy()
    }
}

/// Immutable record of one finished launch: the true exit status plus the
/// captured output. Produced exactly once, after the conduit has fully
/// drained, so the captured bytes are complete and stable.
#[derive(Debug)]
pub struct ExecutionResult {
    status: ExitStatus,
    output: CapturedOutput,
    pump_errors: Vec<PumpError>,
}

impl ExecutionResult {
    pub(crate) fn new(
        status: ExitStatus,
        output: CapturedOutput,
        pump_errors: Vec<PumpError>,
    ) -> Self {
        Self {
            status,
            output,
            pump_errors,
        }
    }

    /// Raw exit status
    pub fn status(&self) -> ExitStatus {
        self.status
    }

    /// Exit code, absent if the process died to a signal
    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    /// True if the process exited with code zero
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Captured output streams
    pub fn output(&self) -> &CapturedOutput {
        &self.output
    }

    /// Errors recorded by individual pumps during this launch. Non-empty
    /// pump errors mean the capture for the affected stream may be partial.
    pub fn pump_errors(&self) -> &[PumpError] {
        &self.pump_errors
    }
}
