//! Stream endpoints: byte sources for stdin and byte sinks for stdout/stderr

use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite};

/// Boxed byte source feeding the child's stdin
pub(crate) type SourceReader = Box<dyn AsyncRead + Send + Unpin>;
/// Boxed byte sink receiving the child's stdout or stderr
pub(crate) type SinkWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Shared in-memory capture buffer.
///
/// Cloning yields another handle to the same buffer, so a bucket handed to a
/// launch as a sink can be read back from the execution result afterwards.
/// The buffer is only guaranteed complete once the launch future resolves.
#[derive(Debug, Clone, Default)]
pub struct ByteBucket {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl ByteBucket {
    /// Create an empty bucket
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Copy of the bytes captured so far
    pub fn snapshot(&self) -> Vec<u8> {
        self.lock().clone()
    }

    /// Number of bytes captured so far
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if nothing was captured
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Captured bytes decoded as UTF-8, invalid sequences replaced
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }
}

impl AsyncWrite for ByteBucket {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.lock().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Byte source for the child's stdin
#[derive(Debug, Clone)]
pub enum InputSource {
    /// No input: the child sees immediate end-of-stream
    Null,
    /// Feed the given bytes, then end-of-stream
    Bytes(Vec<u8>),
    /// Stream the contents of a file
    File(PathBuf),
    /// Child reads the host process's own stdin
    Inherit,
}

impl InputSource {
    /// Stdio disposition at spawn time. Only sources that require a pump
    /// ask for a pipe.
    pub(crate) fn stdio(&self) -> Stdio {
        match self {
            InputSource::Null => Stdio::null(),
            InputSource::Bytes(_) | InputSource::File(_) => Stdio::piped(),
            InputSource::Inherit => Stdio::inherit(),
        }
    }

    /// Open the source, lazily, after the process has started. Returns
    /// `None` when no stdin pump is needed.
    pub(crate) async fn open(&self) -> io::Result<Option<SourceReader>> {
        match self {
            InputSource::Null | InputSource::Inherit => Ok(None),
            InputSource::Bytes(bytes) => Ok(Some(Box::new(io::Cursor::new(bytes.clone())))),
            InputSource::File(path) => {
                let file = tokio::fs::File::open(path).await?;
                Ok(Some(Box::new(file)))
            }
        }
    }
}

/// Byte sink for the child's stdout or stderr
#[derive(Debug, Clone)]
pub enum OutputSink {
    /// Throw the stream away
    Discard,
    /// Capture into a shared in-memory bucket
    Memory(ByteBucket),
    /// Capture into a file, created (or truncated) at pump start
    File(PathBuf),
    /// Child writes to the host process's own stream
    Inherit,
}

impl OutputSink {
    /// Capture into a fresh in-memory bucket
    pub fn memory() -> Self {
        OutputSink::Memory(ByteBucket::new())
    }

    /// Stdio disposition at spawn time. Only sinks that require a pump
    /// ask for a pipe.
    pub(crate) fn stdio(&self) -> Stdio {
        match self {
            OutputSink::Discard => Stdio::null(),
            OutputSink::Memory(_) | OutputSink::File(_) => Stdio::piped(),
            OutputSink::Inherit => Stdio::inherit(),
        }
    }

    /// Open the sink, lazily, after the process has started. Returns `None`
    /// when no pump is needed for this stream.
    pub(crate) async fn open(&self) -> io::Result<Option<SinkWriter>> {
        match self {
            OutputSink::Discard | OutputSink::Inherit => Ok(None),
            OutputSink::Memory(bucket) => Ok(Some(Box::new(bucket.clone()))),
            OutputSink::File(path) => {
                let file = tokio::fs::File::create(path).await?;
                Ok(Some(Box::new(file)))
            }
        }
    }
}

/// The three endpoints bound to exactly one launch
#[derive(Debug, Clone)]
pub struct StreamEndpoints {
    /// Source for the child's stdin
    pub stdin: InputSource,
    /// Sink for the child's stdout
    pub stdout: OutputSink,
    /// Sink for the child's stderr
    pub stderr: OutputSink,
}

impl StreamEndpoints {
    /// Build from explicit endpoints
    pub fn new(stdin: InputSource, stdout: OutputSink, stderr: OutputSink) -> Self {
        Self {
            stdin,
            stdout,
            stderr,
        }
    }

    /// Capture stdout and stderr in memory, no stdin
    pub fn memory() -> Self {
        Self::new(InputSource::Null, OutputSink::memory(), OutputSink::memory())
    }

    /// Capture stdout and stderr in memory, feeding the given bytes to stdin
    pub fn memory_with_input(input: impl Into<Vec<u8>>) -> Self {
        Self::new(
            InputSource::Bytes(input.into()),
            OutputSink::memory(),
            OutputSink::memory(),
        )
    }

    /// Discard all output, no stdin
    pub fn discard() -> Self {
        Self::new(InputSource::Null, OutputSink::Discard, OutputSink::Discard)
    }

    /// Inherit all three streams from the host process
    pub fn inherit() -> Self {
        Self::new(InputSource::Inherit, OutputSink::Inherit, OutputSink::Inherit)
    }

    /// Replace the stdin source
    pub fn with_stdin(mut self, stdin: InputSource) -> Self {
        self.stdin = stdin;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_bucket_accumulates_across_clones() {
        let bucket = ByteBucket::new();
        let mut writer = bucket.clone();
        writer.write_all(b"hello ").await.unwrap();
        writer.write_all(b"world").await.unwrap();
        writer.shutdown().await.unwrap();

        assert_eq!(bucket.snapshot(), b"hello world");
        assert_eq!(bucket.to_string_lossy(), "hello world");
        assert_eq!(bucket.len(), 11);
        assert!(!bucket.is_empty());
    }

    #[tokio::test]
    async fn test_input_source_open() {
        assert!(InputSource::Null.open().await.unwrap().is_none());
        assert!(InputSource::Inherit.open().await.unwrap().is_none());
        assert!(InputSource::Bytes(vec![1, 2, 3])
            .open()
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_output_sink_open() {
        assert!(OutputSink::Discard.open().await.unwrap().is_none());
        assert!(OutputSink::Inherit.open().await.unwrap().is_none());
        assert!(OutputSink::memory().open().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_input_file_fails_open() {
        let source = InputSource::File(PathBuf::from("/nonexistent/subwire/input"));
        assert!(source.open().await.is_err());
    }
}
