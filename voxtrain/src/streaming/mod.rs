//! Streaming responder: a progress channel as a chunked `text/plain` body.
//!
//! Every progress line becomes one `"<line>\n"` chunk, written as soon as
//! it is received. The response ends when the job's `End` sentinel arrives.
//! When the client goes away, hyper drops the body, which drops the
//! [`ProgressStream`] and with it the receiver; the job itself keeps running
//! and its remaining output is discarded by the channel.
//!
//! # Example
//!
//! ```rust,no_run
//! use axum::response::{IntoResponse, Response};
//! use voxtrain::jobs::{Job, JobRunner, ResourceKey};
//! use voxtrain::streaming::ProgressStream;
//!
//! fn handler(runner: &JobRunner) -> Response {
//!     let progress = runner.spawn(Job::new(ResourceKey::download("en")), None, |p| async move {
//!         p.send("working");
//!         Ok(())
//!     });
//!     ProgressStream::new(progress).into_response()
//! }
//! ```

use crate::jobs::{error_line, ProgressItem, ProgressReceiver};
use axum::body::Body;
use axum::http::{header, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::Stream;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, info, warn};

/// Content type of every progress response.
pub const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Message for a channel that closed without its `End` sentinel.
pub const UNTERMINATED_MESSAGE: &str = "job ended without reporting an outcome";

/// Lifecycle of one streamed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderState {
    /// Created, body not yet polled.
    Idle,
    /// Body polled, nothing written yet.
    Started,
    /// At least one line written.
    Streaming,
    /// `End` observed; the response is complete.
    Completed,
    /// Dropped before `End`; the job continues without a reader.
    ClientDisconnected,
}

impl ResponderState {
    /// Whether the responder will not produce any more output.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::ClientDisconnected)
    }
}

/// Drains a [`ProgressReceiver`] as a stream of newline-terminated chunks.
#[derive(Debug)]
pub struct ProgressStream {
    progress: ProgressReceiver,
    state: ResponderState,
    lines_sent: u64,
}

impl ProgressStream {
    /// Wrap a receiver.
    #[must_use]
    pub const fn new(progress: ProgressReceiver) -> Self {
        Self {
            progress,
            state: ResponderState::Idle,
            lines_sent: 0,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ResponderState {
        self.state
    }

    /// Number of lines written so far.
    #[must_use]
    pub const fn lines_sent(&self) -> u64 {
        self.lines_sent
    }

    fn emit(&mut self, line: String) -> Poll<Option<Result<Bytes, Infallible>>> {
        self.lines_sent += 1;
        let mut chunk = line;
        chunk.push('\n');
        Poll::Ready(Some(Ok(Bytes::from(chunk))))
    }
}

/// A `200 OK` streamed `text/plain` response without a content length.
impl IntoResponse for ProgressStream {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, CONTENT_TYPE),
                (header::CACHE_CONTROL, "no-cache"),
                (HeaderName::from_static("x-accel-buffering"), "no"),
            ],
            Body::from_stream(self),
        )
            .into_response()
    }
}

impl Stream for ProgressStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.state {
            ResponderState::Completed | ResponderState::ClientDisconnected => {
                return Poll::Ready(None)
            }
            ResponderState::Idle => this.state = ResponderState::Started,
            ResponderState::Started | ResponderState::Streaming => {}
        }

        match this.progress.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(ProgressItem::Line(line))) => {
                this.state = ResponderState::Streaming;
                this.emit(line)
            }
            Poll::Ready(Some(ProgressItem::End)) => {
                this.state = ResponderState::Completed;
                debug!(lines = this.lines_sent, "Progress stream completed");
                Poll::Ready(None)
            }
            Poll::Ready(None) => {
                warn!(
                    lines = this.lines_sent,
                    "Progress channel closed without an end marker"
                );
                this.state = ResponderState::Completed;
                this.emit(error_line(UNTERMINATED_MESSAGE))
            }
        }
    }
}

impl Drop for ProgressStream {
    fn drop(&mut self) {
        if self.state != ResponderState::Completed {
            self.state = ResponderState::ClientDisconnected;
            info!(
                lines = self.lines_sent,
                "Client disconnected before the job finished; remaining output is discarded"
            );
        }
    }
}
