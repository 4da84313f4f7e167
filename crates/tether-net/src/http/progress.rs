//! Progress throttling and byte-counting streams.
//!
//! Upload and download progress share one policy: emit when the transfer is
//! done, or when more than [`PROGRESS_INTERVAL`] has passed since the last
//! emission. [`ProgressStream`] applies that policy to any byte stream as it
//! passes through, without buffering it.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use pin_project_lite::pin_project;
use tokio::time::Instant;

/// Minimum spacing between two non-final progress emissions.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Decide whether a progress event should be emitted now.
///
/// Always true when `done`; otherwise true only when strictly more than
/// [`PROGRESS_INTERVAL`] has elapsed since `last`.
pub fn should_emit(now: Instant, last: Instant, done: bool) -> bool {
    done || now.saturating_duration_since(last) > PROGRESS_INTERVAL
}

/// Per-transfer throttle state: the time of the last emission.
#[derive(Debug, Clone, Copy)]
pub struct ProgressThrottle {
    last: Instant,
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressThrottle {
    /// Start a throttle; the first window begins now.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Start a throttle with an explicit first window.
    pub fn starting_at(last: Instant) -> Self {
        Self { last }
    }

    /// Check the policy against the current time, recording an emission.
    pub fn should_emit(&mut self, done: bool) -> bool {
        self.should_emit_at(Instant::now(), done)
    }

    /// Check the policy at `now`, recording an emission.
    pub fn should_emit_at(&mut self, now: Instant, done: bool) -> bool {
        if should_emit(now, self.last, done) {
            self.last = now;
            true
        } else {
            false
        }
    }
}

/// Progress information for a transfer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransferProgress {
    /// Number of bytes transferred so far.
    pub bytes_transferred: u64,
    /// Total number of bytes, if known.
    pub total_bytes: Option<u64>,
}

impl TransferProgress {
    /// Get the progress as a fraction (0.0 to 1.0), if total is known.
    pub fn fraction(&self) -> Option<f64> {
        self.total_bytes.map(|total| {
            if total == 0 {
                1.0
            } else {
                self.bytes_transferred as f64 / total as f64
            }
        })
    }

    /// Get the progress as a percentage (0 to 100), if total is known.
    pub fn percent(&self) -> Option<u8> {
        self.fraction().map(|f| (f * 100.0).min(100.0) as u8)
    }
}

/// Callback receiving throttled progress.
pub type ProgressCallback = Arc<dyn Fn(TransferProgress) + Send + Sync>;

pin_project! {
    /// A byte stream that counts bytes and reports throttled progress.
    ///
    /// The final state is reported exactly once: either when the known total
    /// is reached, or at end of stream.
    pub struct ProgressStream<S> {
        #[pin]
        inner: S,
        transferred: u64,
        total: Option<u64>,
        throttle: ProgressThrottle,
        finished: bool,
        on_progress: ProgressCallback,
    }
}

impl<S> ProgressStream<S> {
    /// Wrap `inner`, reporting against an optional known total.
    pub fn new(inner: S, total: Option<u64>, on_progress: ProgressCallback) -> Self {
        Self {
            inner,
            transferred: 0,
            total,
            throttle: ProgressThrottle::new(),
            finished: false,
            on_progress,
        }
    }

    /// Bytes seen so far.
    pub fn transferred(&self) -> u64 {
        self.transferred
    }
}

impl<S, E> Stream for ProgressStream<S>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    type Item = Result<Bytes, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                *this.transferred += chunk.len() as u64;
                if !*this.finished {
                    let done = this.total.is_some_and(|total| *this.transferred >= total);
                    if this.throttle.should_emit(done) {
                        *this.finished = done;
                        (this.on_progress)(TransferProgress {
                            bytes_transferred: *this.transferred,
                            total_bytes: *this.total,
                        });
                    }
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(None) => {
                if !*this.finished {
                    *this.finished = true;
                    (this.on_progress)(TransferProgress {
                        bytes_transferred: *this.transferred,
                        total_bytes: *this.total,
                    });
                }
                Poll::Ready(None)
            }
            other => other,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
