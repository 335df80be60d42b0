//! Decoded audio and its derived metadata.
//!
//! [`DecodedAudio`] is the central value of the crate: one contiguous
//! interleaved 16-bit PCM buffer plus the metadata needed to trim and
//! re-encode it. It is produced by [`decode_file`](crate::decode_file) or
//! [`record`](crate::record()) (or built from raw samples with
//! [`DecodedAudio::from_samples`]), is immutable once produced, and is
//! borrowed read-only by the encode pipeline.
//!
//! [`SampleBuffer`] is the growable sample store both producers write
//! into. Its growth is fallible on purpose: when an allocation fails or a
//! configured cap is reached, the producer stops early and finalizes with
//! the samples gathered so far instead of crashing.

use std::time::Duration;

/// Samples per channel in one analysis/encode frame.
///
/// Fixed at the AAC frame size; waveform gains and the frame-based write
/// helpers are expressed in these units.
pub const SAMPLES_PER_FRAME: usize = 1024;

/// Estimated byte length and offset of one frame within the source stream.
///
/// Derived from the stream's average bitrate, so only approximate — meant
/// for waveform/seek display, not for addressing real bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEstimate {
    /// Estimated encoded byte length of the frame.
    pub byte_length: u32,
    /// Estimated byte offset of the frame within the source stream.
    pub byte_offset: u32,
}

/// A fully decoded (or recorded) audio clip.
///
/// Samples are interleaved `[s0c0, s0c1, …, s0cM-1, s1c0, …]`; the
/// invariant `samples.len() == num_samples() × channels` always holds.
///
/// # Example
///
/// ```
/// use trimtone::DecodedAudio;
///
/// // One second of silence, mono, 44.1 kHz.
/// let audio = DecodedAudio::from_samples(44_100, 1, vec![0i16; 44_100]);
/// assert_eq!(audio.num_samples(), 44_100);
/// assert_eq!(audio.duration().as_secs(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    sample_rate: u32,
    channels: u16,
    samples: Vec<i16>,
    source_format: Option<String>,
    file_size: u64,
    avg_bitrate_kbps: u32,
    frame_gains: Vec<u32>,
    frame_estimates: Option<Vec<FrameEstimate>>,
}

impl DecodedAudio {
    /// Build a clip from raw interleaved samples.
    ///
    /// This is the seam for callers that already hold PCM (synthetic
    /// buffers, test signals). Frame gains are computed; byte estimates
    /// are not (there is no source stream to estimate against).
    ///
    /// Trailing samples that do not fill a whole interleaving group are
    /// dropped so the length invariant holds.
    pub fn from_samples(sample_rate: u32, channels: u16, mut samples: Vec<i16>) -> Self {
        let channels = channels.max(1);
        samples.truncate(samples.len() - samples.len() % channels as usize);
        let avg_bitrate_kbps = sample_rate * 16 * channels as u32 / 1000;
        Self::from_parts(
            sample_rate,
            channels,
            samples,
            None,
            0,
            avg_bitrate_kbps,
            false,
        )
    }

    /// Internal constructor shared by the decode and record pipelines.
    pub(crate) fn from_parts(
        sample_rate: u32,
        channels: u16,
        samples: Vec<i16>,
        source_format: Option<String>,
        file_size: u64,
        avg_bitrate_kbps: u32,
        with_estimates: bool,
    ) -> Self {
        let frame_gains = compute_frame_gains(&samples, channels);
        let frame_estimates = with_estimates.then(|| {
            compute_frame_estimates(frame_gains.len(), sample_rate, avg_bitrate_kbps)
        });
        Self {
            sample_rate,
            channels,
            samples,
            source_format,
            file_size,
            avg_bitrate_kbps,
            frame_gains,
            frame_estimates,
        }
    }

    /// Sampling frequency in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// The interleaved samples, read-only.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Number of samples per channel.
    pub fn num_samples(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Clip duration derived from the sample count.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.num_samples() as f64 / self.sample_rate as f64)
    }

    /// Samples per channel in one analysis frame (fixed at 1024).
    pub fn samples_per_frame(&self) -> usize {
        SAMPLES_PER_FRAME
    }

    /// Number of analysis frames (the final partial frame counts).
    pub fn num_frames(&self) -> usize {
        self.frame_gains.len()
    }

    /// Per-frame display gains: the integer square root of the frame's
    /// peak across-channel mean absolute amplitude.
    pub fn frame_gains(&self) -> &[u32] {
        &self.frame_gains
    }

    /// Per-frame byte estimates, present only for decoded files (`None`
    /// for recordings and synthetic buffers).
    pub fn frame_estimates(&self) -> Option<&[FrameEstimate]> {
        self.frame_estimates.as_deref()
    }

    /// Average bitrate of the source stream in kbps (for recordings, the
    /// PCM bitrate).
    pub fn avg_bitrate_kbps(&self) -> u32 {
        self.avg_bitrate_kbps
    }

    /// The source file's extension, or `"raw"` for recordings, or `None`
    /// for synthetic buffers.
    pub fn source_format(&self) -> Option<&str> {
        self.source_format.as_deref()
    }

    /// Byte size of the source file (0 when there is none).
    pub fn file_size(&self) -> u64 {
        self.file_size
    }
}

/// Per-frame display gain: partition the buffer into 1024-sample-per-channel
/// frames; per sample position take the mean absolute amplitude across
/// channels, per frame take the peak of those means, and report its integer
/// square root (compresses the dynamic range for display).
fn compute_frame_gains(samples: &[i16], channels: u16) -> Vec<u32> {
    let channels = channels.max(1) as usize;
    let num_samples = samples.len() / channels;
    let num_frames = num_samples.div_ceil(SAMPLES_PER_FRAME);

    let mut gains = Vec::with_capacity(num_frames);
    for frame in 0..num_frames {
        let mut peak: u32 = 0;
        let frame_start = frame * SAMPLES_PER_FRAME;
        for position in frame_start..(frame_start + SAMPLES_PER_FRAME).min(num_samples) {
            let base = position * channels;
            let mean: u32 = samples[base..base + channels]
                .iter()
                .map(|&sample| (sample as i32).unsigned_abs())
                .sum::<u32>()
                / channels as u32;
            peak = peak.max(mean);
        }
        gains.push((peak as f64).sqrt() as u32);
    }
    gains
}

/// Byte length/offset estimates from the global average bitrate. Every
/// frame gets the same estimated length; offsets accumulate it.
fn compute_frame_estimates(
    num_frames: usize,
    sample_rate: u32,
    avg_bitrate_kbps: u32,
) -> Vec<FrameEstimate> {
    let bytes_per_frame = if sample_rate == 0 {
        0.0
    } else {
        (1000.0 * avg_bitrate_kbps as f64 / 8.0) * (SAMPLES_PER_FRAME as f64 / sample_rate as f64)
    };
    (0..num_frames)
        .map(|index| FrameEstimate {
            byte_length: bytes_per_frame as u32,
            byte_offset: (index as f64 * bytes_per_frame) as u32,
        })
        .collect()
}

/// Growable i16 sample store with an explicit truncate-on-failure policy.
///
/// Producers call [`try_grow_to`](SampleBuffer::try_grow_to) before
/// appending; a `false` return (allocator failure or configured cap) means
/// "stop producing and finalize with what you have" — it is never an
/// error. Growth uses [`Vec::try_reserve_exact`], so a failed attempt
/// leaves the existing samples intact.
///
/// # Example
///
/// ```
/// use trimtone::SampleBuffer;
///
/// // Cap the buffer at 1 KiB (512 samples).
/// let mut buffer = SampleBuffer::new(256, Some(1024));
/// assert!(buffer.try_grow_to(512));
/// assert!(!buffer.try_grow_to(513)); // over the cap: truncate signal
/// ```
#[derive(Debug)]
pub struct SampleBuffer {
    samples: Vec<i16>,
    limit_bytes: Option<usize>,
}

impl SampleBuffer {
    /// Create a buffer with an initial capacity of `initial_samples` and an
    /// optional hard cap in bytes.
    ///
    /// When the cap is smaller than the requested initial capacity, the
    /// initial capacity is clamped to it.
    pub fn new(initial_samples: usize, limit_bytes: Option<usize>) -> Self {
        let initial = match limit_bytes {
            Some(limit) => initial_samples.min(limit / 2),
            None => initial_samples,
        };
        let mut samples = Vec::new();
        if samples.try_reserve_exact(initial).is_err() {
            log::debug!("Initial sample buffer allocation of {initial} samples failed");
        }
        Self {
            samples,
            limit_bytes,
        }
    }

    /// Number of samples stored.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Current capacity in samples.
    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }

    /// Capacity not yet filled, in samples.
    pub fn remaining(&self) -> usize {
        self.samples.capacity() - self.samples.len()
    }

    /// Try to ensure capacity for `target_samples` samples in total.
    ///
    /// Returns `false` — the truncate signal — when the target exceeds the
    /// configured cap or the allocator refuses; the stored samples are
    /// untouched either way.
    #[must_use]
    pub fn try_grow_to(&mut self, target_samples: usize) -> bool {
        if let Some(limit) = self.limit_bytes
            && target_samples.saturating_mul(2) > limit
        {
            log::debug!(
                "Sample buffer growth to {target_samples} samples exceeds the {limit}-byte cap; truncating"
            );
            return false;
        }
        if target_samples <= self.samples.capacity() {
            return true;
        }
        let additional = target_samples - self.samples.len();
        if self.samples.try_reserve_exact(additional).is_err() {
            log::debug!("Sample buffer growth to {target_samples} samples failed; truncating");
            return false;
        }
        true
    }

    /// Append samples. Callers ensure capacity first via
    /// [`try_grow_to`](SampleBuffer::try_grow_to); appending within
    /// capacity never reallocates.
    pub fn extend_from_slice(&mut self, chunk: &[i16]) {
        self.samples.extend_from_slice(chunk);
    }

    /// Consume the buffer, yielding the stored samples.
    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }
}
