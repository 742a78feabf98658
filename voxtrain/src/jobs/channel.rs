//! Progress hand-off between a job body and the response streamer.
//!
//! A progress channel carries text lines from exactly one job to exactly one
//! consumer and is terminated by an explicit [`ProgressItem::End`]. The queue
//! is unbounded so the producer never waits on a slow or vanished consumer.
//!
//! # Example
//!
//! ```rust
//! use voxtrain::jobs::{progress_channel, ProgressItem};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let (tx, mut rx) = progress_channel();
//! tx.send("Download complete");
//! tx.close();
//!
//! assert_eq!(rx.recv().await, Some(ProgressItem::Line("Download complete".into())));
//! assert_eq!(rx.recv().await, Some(ProgressItem::End));
//! # }
//! ```

use parking_lot::Mutex;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// One unit transmitted on a progress channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressItem {
    /// A human-readable progress line, without trailing newline.
    Line(String),
    /// End of stream. Always the last item a channel delivers.
    End,
}

/// Create a connected sender/receiver pair.
#[must_use]
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sender = ProgressSender {
        tx: Arc::new(Mutex::new(Some(tx))),
    };
    (sender, ProgressReceiver { rx })
}

/// Producer half of a progress channel.
///
/// Clones share one underlying queue. Once any clone calls
/// [`close`](Self::close), every later `send` is dropped, so `End` stays last.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    // `None` once closed. Sending happens under the lock so a concurrent
    // `close` cannot slip an `End` in front of a line.
    tx: Arc<Mutex<Option<mpsc::UnboundedSender<ProgressItem>>>>,
}

impl ProgressSender {
    /// Enqueue a progress line.
    ///
    /// Never blocks. Lines sent after `close`, or after the consumer went
    /// away, are discarded.
    pub fn send(&self, line: impl Into<String>) {
        if let Some(tx) = self.tx.lock().as_ref() {
            // The receiver may be gone (client disconnected); output is discarded.
            let _ = tx.send(ProgressItem::Line(line.into()));
        }
    }

    /// Enqueue the end-of-stream sentinel. Idempotent.
    pub fn close(&self) {
        if let Some(tx) = self.tx.lock().take() {
            let _ = tx.send(ProgressItem::End);
        }
    }

    /// Whether `close` has been called on any clone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.lock().is_none()
    }
}

/// Consumer half of a progress channel.
#[derive(Debug)]
pub struct ProgressReceiver {
    rx: mpsc::UnboundedReceiver<ProgressItem>,
}

impl ProgressReceiver {
    /// Wait for the next item.
    ///
    /// Returns `None` only when every sender was dropped without closing the
    /// channel, which the job runner never does on its own.
    pub async fn recv(&mut self) -> Option<ProgressItem> {
        self.rx.recv().await
    }

    /// Poll for the next item; used by the streaming responder.
    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<ProgressItem>> {
        self.rx.poll_recv(cx)
    }

    /// Drain every line up to and including `End`.
    ///
    /// Returns the lines in order; stops early if the producer vanished.
    pub async fn collect_lines(mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(ProgressItem::Line(line)) = self.recv().await {
            lines.push(line);
        }
        lines
    }
}
