//! Shared async sink feeding a [`DiagnosticBuffer`].

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite};

use super::DiagnosticBuffer;

/// Longest partial line held back while waiting for its newline.
const MAX_PARTIAL_LINE: usize = 64 * 1024;

#[derive(Debug)]
struct SinkState {
    buffer: DiagnosticBuffer,
    partial: Vec<u8>,
}

/// Cloneable [`AsyncWrite`] handle over a [`DiagnosticBuffer`].
///
/// Bytes are framed into lines before they reach the buffer, so a line
/// split across two writes is stored once. A trailing line without newline
/// is committed on shutdown or [`DiagnosticSink::finish`].
#[derive(Debug, Clone)]
pub struct DiagnosticSink {
    state: Arc<Mutex<SinkState>>,
}

impl DiagnosticSink {
    /// Create a sink keeping at most `limit` lines.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(SinkState {
                buffer: DiagnosticBuffer::new(limit),
                partial: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append raw bytes.
    pub fn write_bytes(&self, bytes: &[u8]) {
        let mut state = self.lock();
        state.partial.extend_from_slice(bytes);

        if let Some(pos) = state.partial.iter().rposition(|b| *b == b'\n') {
            let rest = state.partial.split_off(pos + 1);
            let complete = std::mem::replace(&mut state.partial, rest);
            state.buffer.write_chunk(&complete);
        }
        if state.partial.len() > MAX_PARTIAL_LINE {
            let overflow = std::mem::take(&mut state.partial);
            state.buffer.write_chunk(&overflow);
        }
    }

    /// Commit any trailing partial line.
    pub fn finish(&self) {
        let mut state = self.lock();
        let rest = std::mem::take(&mut state.partial);
        state.buffer.write_chunk(&rest);
    }

    /// Copy of the buffered lines, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().buffer.snapshot()
    }

    /// Copy `reader` into the sink until end of stream, then commit the
    /// trailing partial line.
    ///
    /// # Errors
    ///
    /// Returns the read error. Lines received before it are kept.
    pub async fn drain<R>(mut self, mut reader: R) -> std::io::Result<u64>
    where
        R: AsyncRead + Unpin,
    {
        let copied = tokio::io::copy(&mut reader, &mut self).await;
        self.finish();
        copied
    }
}

impl AsyncWrite for DiagnosticSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.write_bytes(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.finish();
        Poll::Ready(Ok(()))
    }
}
