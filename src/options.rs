//! Operation options.
//!
//! [`TrimOptions`] is a builder that threads progress callbacks,
//! cancellation tokens, and resource limits through decode, encode, and
//! record calls without polluting every function signature.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use trimtone::{CancellationToken, ProgressCallback, ProgressInfo, TrimOptions};
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{:?}: {} done", info.operation, info.current);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = TrimOptions::new()
//!     .with_progress(Arc::new(LogProgress))
//!     .with_cancellation(token.clone())
//!     .with_batch_size(64);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};

/// Options for decode, encode, and record operations.
///
/// Carries optional progress-, cancellation-, and memory-related settings.
/// A default-constructed value behaves like the plain API: no progress, no
/// cancellation, no memory cap.
///
/// Recording is the one operation with a mandatory field: it refuses to
/// start without a cancellation token, because the token is its only stop
/// mechanism (see [`record`](crate::record())).
#[derive(Clone)]
pub struct TrimOptions {
    /// Progress callback. Defaults to a no-op.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Cancellation token. `None` means never cancelled.
    pub(crate) cancellation: Option<CancellationToken>,
    /// How often to fire the progress callback (every N units).
    /// Defaults to 1 (every unit).
    pub(crate) batch_size: u64,
    /// Hard cap, in bytes, on the decoded sample buffer. `None` means
    /// growth is bounded only by the allocator.
    pub(crate) memory_limit: Option<usize>,
}

impl Debug for TrimOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("TrimOptions")
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .field("memory_limit", &self.memory_limit)
            .finish_non_exhaustive()
    }
}

impl Default for TrimOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl TrimOptions {
    /// Create a new options value with default settings.
    ///
    /// Defaults: no progress callback, no cancellation, batch size 1,
    /// no memory limit.
    pub fn new() -> Self {
        Self {
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
            memory_limit: None,
        }
    }

    /// Attach a progress callback.
    ///
    /// The callback is invoked every [`batch_size`](TrimOptions::with_batch_size)
    /// units during the operation.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled, decode and encode stop and return
    /// [`TrimtoneError::Cancelled`](crate::TrimtoneError::Cancelled);
    /// recording stops and finalizes normally.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often the progress callback fires.
    ///
    /// A value of 1 means every unit; 4096 means every 4096th unit.
    /// Clamped to a minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Cap the decoded/recorded sample buffer at `bytes`.
    ///
    /// When growth would exceed the cap, the operation stops early and
    /// finalizes with the samples gathered so far — the same best-effort
    /// policy applied on allocator failure. This is not an error.
    #[must_use]
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
