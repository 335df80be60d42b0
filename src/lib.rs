//! # trimtone
//!
//! Trim audio files — decode any supported audio source (or a live
//! recording) into an in-memory PCM buffer, then re-encode any sub-range
//! as a ringtone-ready M4A (MP4/AAC) or WAV file.
//!
//! Decoding and AAC encoding are delegated to FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate; the MP4
//! and WAV **containers** are synthesized here, byte-exactly, with no
//! muxing library: a generic box tree builder ([`Atom`]), an M4A header
//! synthesizer ([`mp4`]), and a WAV header synthesizer ([`wav`]).
//!
//! ## Quick Start
//!
//! ### Trim a file
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use trimtone::TrimOptions;
//!
//! let audio = trimtone::decode_file("song.mp3", &TrimOptions::new()).unwrap();
//! audio
//!     .save_m4a(
//!         "ringtone.m4a",
//!         Duration::from_secs(30),
//!         Duration::from_secs(60),
//!         &TrimOptions::new(),
//!     )
//!     .unwrap();
//! ```
//!
//! ### Record, then save as WAV
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use trimtone::{CancellationToken, TrimOptions};
//!
//! let token = CancellationToken::new();
//! # token.cancel();
//! let options = TrimOptions::new().with_cancellation(token.clone());
//! let clip = trimtone::record(&options).unwrap();
//! clip.save_wav("memo.wav", Duration::ZERO, clip.duration(), &TrimOptions::new())
//!     .unwrap();
//! ```
//!
//! ### Progress and cancellation
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use trimtone::{ProgressCallback, ProgressInfo, TrimOptions};
//!
//! struct PrintProgress;
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("{pct:.0}%");
//!         }
//!     }
//! }
//!
//! let options = TrimOptions::new().with_progress(Arc::new(PrintProgress));
//! let audio = trimtone::decode_file("voice.m4a", &options).unwrap();
//! ```
//!
//! ## Threading model
//!
//! Every operation is a blocking call intended to run on a caller-owned
//! worker thread; the crate takes no locks and spawns no threads (the
//! recording device delivers chunks from its own callback thread, bridged
//! internally). Run at most one operation at a time per [`DecodedAudio`],
//! and join a worker before starting the next operation or tearing down.
//! Once produced, a [`DecodedAudio`] is immutable and safe to read from
//! multiple threads.
//!
//! ## Memory policy
//!
//! Decode and record buffers grow adaptively. When an allocation fails or
//! the cap set with [`TrimOptions::with_memory_limit`] is reached, the
//! operation stops early and finalizes with the samples gathered so far —
//! a best-effort partial result, never a crash.
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system, and an
//! audio input device is needed for recording.

pub mod atom;
pub mod decode;
pub mod encode;
pub mod error;
pub mod mp4;
pub mod options;
pub mod progress;
pub mod record;
pub mod sound;
pub mod wav;

pub use atom::{Atom, AtomContent};
pub use decode::{SUPPORTED_EXTENSIONS, decode_file, is_filename_supported};
pub use encode::swap_left_right_pairs;
pub use error::TrimtoneError;
pub use mp4::{StreamPlan, mp4_header};
pub use options::TrimOptions;
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use record::{RECORD_SAMPLE_RATE, record};
pub use sound::{DecodedAudio, FrameEstimate, SAMPLES_PER_FRAME, SampleBuffer};
pub use wav::{WAV_HEADER_LEN, wav_header};
