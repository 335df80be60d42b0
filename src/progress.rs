//! Progress reporting and cancellation support.
//!
//! This module provides [`ProgressCallback`] for monitoring long-running
//! operations, [`CancellationToken`] for cooperative cancellation, and
//! [`ProgressInfo`] for progress snapshots.
//!
//! Decode, encode, and record are blocking calls meant to run on a
//! caller-owned worker thread; the callback fires on that thread, so
//! implementations must be [`Send`] + [`Sync`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use trimtone::{ProgressCallback, ProgressInfo, TrimOptions, TrimtoneError};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("[{:?}] {pct:.1}% complete", info.operation);
//!         }
//!     }
//! }
//!
//! let options = TrimOptions::new().with_progress(Arc::new(PrintProgress));
//! let audio = trimtone::decode_file("song.mp3", &options)?;
//! # Ok::<(), TrimtoneError>(())
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// The kind of operation currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Decoding a source file into PCM samples.
    Decoding,
    /// Re-encoding a sample range into a container.
    Encoding,
    /// Capturing live audio from an input device.
    Recording,
}

/// A snapshot of operation progress.
///
/// Delivered to [`ProgressCallback::on_progress`] at a cadence controlled
/// by [`TrimOptions::with_batch_size`](crate::TrimOptions::with_batch_size).
///
/// The unit of `current`/`total` depends on the operation: compressed bytes
/// read for decoding, PCM frames fed for encoding, and samples captured for
/// recording.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// What kind of work is being performed.
    pub operation: OperationType,
    /// How many units have been processed so far.
    pub current: u64,
    /// Total units expected, if known ahead of time. Recording has no
    /// natural end, so it reports `None`.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time elapsed since the operation started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
}

/// Trait for receiving progress updates during an operation.
///
/// Progress callbacks are **infallible** — they observe but cannot halt
/// the operation. Use [`CancellationToken`] for cooperative cancellation.
pub trait ProgressCallback: Send + Sync {
    /// Called at regular intervals during decode, encode, and record.
    fn on_progress(&self, info: &ProgressInfo);
}

/// A no-op implementation that discards all progress notifications.
///
/// This is the default when no callback is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads; call
/// [`cancel`](CancellationToken::cancel) from any thread to request
/// cancellation of the associated operation. The operation loops check
/// [`is_cancelled`](CancellationToken::is_cancelled) at packet/frame/chunk
/// boundaries — there is no forced preemption.
///
/// A cancelled decode or encode returns
/// [`TrimtoneError::Cancelled`](crate::TrimtoneError::Cancelled) and never
/// yields a partial result. A cancelled *recording* is the normal way to
/// stop it, and finalizes with the captured samples.
///
/// # Example
///
/// ```
/// use trimtone::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// // From another thread (or a signal handler, etc.):
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    ///
    /// All clones of this token will observe the cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal helper that tracks progress timing and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: Option<u64>,
    current: u64,
    batch_size: u64,
    start_time: Instant,
    units_since_last_report: u64,
}

impl ProgressTracker {
    /// Create a new tracker.
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        total: Option<u64>,
        batch_size: u64,
    ) -> Self {
        Self {
            callback,
            operation,
            total,
            current: 0,
            batch_size: batch_size.max(1),
            start_time: Instant::now(),
            units_since_last_report: 0,
        }
    }

    /// Record `units` completed work items and fire the callback if the
    /// batch threshold is reached.
    pub(crate) fn advance(&mut self, units: u64) {
        self.current += units;
        self.units_since_last_report += units;

        if self.units_since_last_report >= self.batch_size {
            self.report();
            self.units_since_last_report = 0;
        }
    }

    /// Unconditionally emit a final progress report.
    pub(crate) fn finish(&mut self) {
        self.report();
    }

    fn report(&self) {
        let elapsed = self.start_time.elapsed();

        let percentage = self
            .total
            .filter(|&t| t > 0)
            .map(|t| ((self.current as f32 / t as f32) * 100.0).min(100.0));

        let estimated_remaining = self.total.and_then(|t| {
            if self.current == 0 {
                return None;
            }
            let remaining = t.saturating_sub(self.current);
            Some(elapsed.mul_f64(remaining as f64 / self.current as f64))
        });

        let info = ProgressInfo {
            operation: self.operation,
            current: self.current,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
        };

        self.callback.on_progress(&info);
    }
}
