//! Error types for the `trimtone` crate.
//!
//! This module defines [`TrimtoneError`], the unified error type returned by
//! all fallible operations in the crate. Variants carry enough context to
//! diagnose a failure without extra logging at the call site.

use std::{io::Error as IoError, path::PathBuf, time::Duration};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// The unified error type for all `trimtone` operations.
///
/// Every public method that can fail returns `Result<T, TrimtoneError>`.
///
/// Two variants deserve special mention:
/// - [`UnsupportedExtension`](TrimtoneError::UnsupportedExtension) is
///   recoverable — the file was never opened; callers typically prompt for
///   a different file.
/// - Allocation failure during decode/record buffer growth is **not** an
///   error at all: the operation truncates and finalizes with the samples
///   gathered so far.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TrimtoneError {
    /// The audio file could not be opened.
    #[error("Failed to open audio file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::decode_file`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file's extension is not in the supported set.
    ///
    /// See [`crate::SUPPORTED_EXTENSIONS`]. The file was not opened;
    /// recoverable by the caller.
    #[error("Unsupported or missing file extension: {path}")]
    UnsupportedExtension {
        /// The offending path.
        path: PathBuf,
    },

    /// The file contains no audio track.
    #[error("No audio track found in file")]
    NoAudioTrack,

    /// Audio data could not be decoded.
    #[error("Failed to decode audio: {0}")]
    DecodeError(String),

    /// PCM data could not be encoded to the target container.
    #[error("Failed to encode audio: {0}")]
    EncodeError(String),

    /// Live audio capture failed.
    #[error("Failed to record audio: {0}")]
    RecordError(String),

    /// The synthesized container header is structurally broken.
    ///
    /// Indicates a bug in the box tree builder, not bad input.
    #[error("Container header synthesis failed: {0}")]
    HeaderSynthesis(String),

    /// A range's start value is greater than its end value.
    #[error("Invalid range: start ({start:?}) must not exceed end ({end:?})")]
    InvalidRange {
        /// The start of the range.
        start: Duration,
        /// The end of the range.
        end: Duration,
    },

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while writing to the output sink.
    ///
    /// The destination is incomplete and must be treated as invalid;
    /// deleting it is the caller's responsibility.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<FfmpegError> for TrimtoneError {
    fn from(error: FfmpegError) -> Self {
        TrimtoneError::FfmpegError(error.to_string())
    }
}
