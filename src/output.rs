//! Line-oriented forwarding of command output into structured logs.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::AsyncWrite;
use tracing::info;

/// Writable sink receiving remote command output.
pub type OutputSink<'a> = &'a mut (dyn AsyncWrite + Send + Unpin);

/// An [`AsyncWrite`] that logs each complete line it receives.
///
/// A trailing partial line is logged on flush or shutdown.
#[derive(Debug)]
pub struct CommandLog {
    source: String,
    pending: Vec<u8>,
    lines: usize,
}

impl CommandLog {
    /// Create a log labelled with `source` (typically the container).
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            pending: Vec::new(),
            lines: 0,
        }
    }

    /// Number of lines logged so far.
    #[must_use]
    pub const fn lines(&self) -> usize {
        self.lines
    }

    /// Log one line directly, bypassing the byte buffer.
    pub fn line(&mut self, line: &str) {
        self.lines += 1;
        info!(target: "liveswap::output", source = %self.source, "{}", line.trim_end());
    }

    fn drain_complete_lines(&mut self) {
        while let Some(position) = self.pending.iter().position(|byte| *byte == b'\n') {
            let rest = self.pending.split_off(position + 1);
            let line = std::mem::replace(&mut self.pending, rest);
            self.line(&String::from_utf8_lossy(&line));
        }
    }

    fn drain_partial_line(&mut self) {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.line(&String::from_utf8_lossy(&line));
        }
    }
}

impl AsyncWrite for CommandLog {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        this.pending.extend_from_slice(buf);
        this.drain_complete_lines();
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().drain_partial_line();
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.poll_flush(cx)
    }
}
