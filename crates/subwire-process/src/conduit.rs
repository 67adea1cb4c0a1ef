//! Stream conduit: concurrent pumps between the child's standard streams
//! and the caller's endpoints

use std::io;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::endpoint::{SinkWriter, SourceReader};

/// Error recorded by a single pump. Pump errors never abort sibling pumps;
/// they are collected when the conduit closes.
#[derive(Debug)]
pub struct PumpError {
    /// Which stream the failing pump served ("stdin", "stdout", "stderr")
    pub stream: &'static str,
    /// The underlying I/O error
    pub error: io::Error,
}

struct Pump {
    stream: &'static str,
    task: JoinHandle<io::Result<u64>>,
}

/// The aggregate of up to three pumps for one launched process.
///
/// Each pump copies through a bounded intermediate buffer, so a slow sink
/// blocks only its own stream. `complete` drains the pumps to end-of-stream;
/// `abort` stops them without waiting for further input.
pub(crate) struct Conduit {
    pumps: Vec<Pump>,
    failure: CancellationToken,
}

impl Conduit {
    /// Connect pumps to the live child streams. Streams without an opened
    /// endpoint are left untouched (already null or inherited at spawn).
    /// An absent stdin source means the child's stdin pipe, if any, is
    /// dropped here, signaling immediate end-of-stream.
    pub(crate) fn connect(
        child: &mut Child,
        stdin: Option<SourceReader>,
        stdout: Option<SinkWriter>,
        stderr: Option<SinkWriter>,
    ) -> Self {
        let failure = CancellationToken::new();
        let mut pumps = Vec::with_capacity(3);

        match (stdin, child.stdin.take()) {
            (Some(source), Some(into_child)) => {
                // Source read failures are fatal to the launch; a write
                // failure here usually just means the child closed its end.
                pumps.push(spawn_pump("stdin", source, into_child, None));
            }
            (_, other) => drop(other),
        }
        if let (Some(sink), Some(from_child)) = (stdout, child.stdout.take()) {
            pumps.push(spawn_pump("stdout", from_child, sink, Some(failure.clone())));
        }
        if let (Some(sink), Some(from_child)) = (stderr, child.stderr.take()) {
            pumps.push(spawn_pump("stderr", from_child, sink, Some(failure.clone())));
        }

        debug!(pumps = pumps.len(), "Conduit connected");
        Self { pumps, failure }
    }

    /// Token cancelled when an output pump fails mid-copy
    pub(crate) fn failure_token(&self) -> CancellationToken {
        self.failure.clone()
    }

    /// Drain all pumps to end-of-stream and collect their errors
    pub(crate) async fn complete(self) -> Vec<PumpError> {
        let mut errors = Vec::new();
        for pump in self.pumps {
            match pump.task.await {
                Ok(Ok(bytes)) => debug!(stream = pump.stream, bytes, "Pump drained"),
                Ok(Err(error)) => errors.push(PumpError {
                    stream: pump.stream,
                    error,
                }),
                Err(join) => {
                    if !join.is_cancelled() {
                        errors.push(PumpError {
                            stream: pump.stream,
                            error: io::Error::other(join),
                        });
                    }
                }
            }
        }
        errors
    }

    /// Stop all pumps without waiting for further input. Each pump finishes
    /// at its current copy boundary; its resources are released here.
    pub(crate) async fn abort(self) -> Vec<PumpError> {
        for pump in &self.pumps {
            pump.task.abort();
        }
        self.complete().await
    }
}

/// Spawn one pump task copying `reader` into `writer` until end-of-stream.
/// `tokio::io::copy` applies a bounded intermediate buffer, so back-pressure
/// from a slow writer blocks only this pump. When a `failure` token is given,
/// an I/O error cancels it to notify the launch worker.
fn spawn_pump<R, W>(
    stream: &'static str,
    mut reader: R,
    mut writer: W,
    failure: Option<CancellationToken>,
) -> Pump
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let task = tokio::spawn(async move {
        let result = async {
            let bytes = tokio::io::copy(&mut reader, &mut writer).await?;
            writer.shutdown().await?;
            Ok(bytes)
        }
        .await;
        if let Err(ref error) = result {
            warn!(stream, %error, "Pump failed");
            if let Some(token) = failure {
                token.cancel();
            }
        }
        result
    });
    Pump { stream, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::ByteBucket;
    use tokio::io::{duplex, AsyncWriteExt};

    #[tokio::test]
    async fn test_pump_copies_to_eof() {
        let bucket = ByteBucket::new();
        let (mut tx, rx) = duplex(64);
        let pump = spawn_pump("stdout", rx, bucket.clone(), None);

        tx.write_all(b"abc").await.unwrap();
        tx.write_all(b"def").await.unwrap();
        drop(tx);

        let bytes = pump.task.await.unwrap().unwrap();
        assert_eq!(bytes, 6);
        assert_eq!(bucket.snapshot(), b"abcdef");
    }

    #[tokio::test]
    async fn test_pump_larger_than_copy_buffer() {
        let bucket = ByteBucket::new();
        let (mut tx, rx) = duplex(1024);
        let pump = spawn_pump("stdout", rx, bucket.clone(), None);

        let payload = vec![0xa5u8; 256 * 1024];
        let expected = payload.clone();
        tokio::spawn(async move {
            tx.write_all(&payload).await.unwrap();
        });

        let bytes = pump.task.await.unwrap().unwrap();
        assert_eq!(bytes as usize, expected.len());
        assert_eq!(bucket.snapshot(), expected);
    }

    #[tokio::test]
    async fn test_failure_token_fires_on_sink_error() {
        struct FailingSink;
        impl AsyncWrite for FailingSink {
            fn poll_write(
                self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
                _buf: &[u8],
            ) -> std::task::Poll<io::Result<usize>> {
                std::task::Poll::Ready(Err(io::Error::other("sink full")))
            }
            fn poll_flush(
                self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
            ) -> std::task::Poll<io::Result<()>> {
                std::task::Poll::Ready(Ok(()))
            }
            fn poll_shutdown(
                self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
            ) -> std::task::Poll<io::Result<()>> {
                std::task::Poll::Ready(Ok(()))
            }
        }

        let token = CancellationToken::new();
        let (mut tx, rx) = duplex(64);
        let pump = spawn_pump("stderr", rx, FailingSink, Some(token.clone()));
        tx.write_all(b"boom").await.unwrap();

        let result = pump.task.await.unwrap();
        assert!(result.is_err());
        assert!(token.is_cancelled());
    }
}
