//! Encode pipeline: a [`DecodedAudio`] range → M4A or WAV bytes.
//!
//! Both encoders target an opaque [`Write`] sink — a file, a socket, an
//! in-memory vector. The M4A path feeds the FFmpeg AAC encoder
//! 1024-sample frames, collects every output packet's byte size into a
//! [`StreamPlan`], and only then synthesizes the MP4 header (the header
//! embeds the per-frame size table and a chunk offset that depends on its
//! own length). The WAV path writes the 44-byte header followed by the raw
//! PCM range.
//!
//! Ranges that run past the end of the buffer are zero-padded rather than
//! rejected; a zero-length range produces a valid header-only file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use ffmpeg_next::{
    ChannelLayout, Packet, Rational,
    codec::{Id, context::Context as CodecContext},
    format::{Sample, sample::Type as SampleType},
    frame::Audio as AudioFrame,
    software::resampling::Context as ResamplingContext,
};

use crate::error::TrimtoneError;
use crate::mp4::{self, StreamPlan};
use crate::options::TrimOptions;
use crate::progress::{OperationType, ProgressTracker};
use crate::sound::{DecodedAudio, SAMPLES_PER_FRAME};
use crate::wav::wav_header;

/// Bitrate per encoded channel: 64 kbps gives good AAC quality.
const BITRATE_PER_CHANNEL: u32 = 64_000;

/// Size of the chunks the finished elementary stream is written in.
const WRITE_CHUNK_BYTES: usize = 4096;

impl DecodedAudio {
    /// Encode the `[start, end)` time range as an M4A (MP4/AAC) stream
    /// into `sink`.
    ///
    /// Mono input is duplicated to stereo before encoding — several
    /// players refuse mono AAC files. The bitrate is 64 kbps per output
    /// channel.
    ///
    /// # Errors
    ///
    /// - [`TrimtoneError::InvalidRange`] if `start > end`.
    /// - [`TrimtoneError::EncodeError`] for AAC encoder failures.
    /// - [`TrimtoneError::IoError`] for sink failures; the sink contents
    ///   are then invalid and the caller should delete any partial file.
    /// - [`TrimtoneError::Cancelled`] on cancellation.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::time::Duration;
    ///
    /// use trimtone::{TrimOptions, TrimtoneError};
    ///
    /// let audio = trimtone::decode_file("song.mp3", &TrimOptions::new())?;
    /// let mut out = Vec::new();
    /// audio.write_m4a(
    ///     Duration::from_secs(10),
    ///     Duration::from_secs(40),
    ///     &mut out,
    ///     &TrimOptions::new(),
    /// )?;
    /// # Ok::<(), TrimtoneError>(())
    /// ```
    pub fn write_m4a<W: Write>(
        &self,
        start: Duration,
        end: Duration,
        sink: &mut W,
        options: &TrimOptions,
    ) -> Result<(), TrimtoneError> {
        let (start_sample, num_samples) = self.resolve_range(start, end)?;
        self.write_m4a_samples(start_sample, num_samples, sink, options)
    }

    fn write_m4a_samples<W: Write>(
        &self,
        start_sample: usize,
        num_samples: usize,
        sink: &mut W,
        options: &TrimOptions,
    ) -> Result<(), TrimtoneError> {
        let out_channels: u16 = if self.channels() == 1 { 2 } else { self.channels() };
        let bitrate = BITRATE_PER_CHANNEL * out_channels as u32;
        log::debug!(
            "Encoding {num_samples} samples/channel to M4A ({out_channels} ch, {bitrate} bps)"
        );

        ffmpeg_next::init().map_err(|error| TrimtoneError::EncodeError(error.to_string()))?;

        let codec = ffmpeg_next::encoder::find(Id::AAC)
            .ok_or_else(|| TrimtoneError::EncodeError("No AAC encoder available".to_string()))?;

        let channel_layout = if out_channels == 2 {
            ChannelLayout::STEREO
        } else {
            ChannelLayout::default(out_channels as i32)
        };

        // Encode at the encoder's native sample format (FLTP for the
        // built-in AAC encoder); the resampler converts our packed i16.
        let sample_format = codec
            .audio()
            .ok()
            .and_then(|audio_codec| audio_codec.formats())
            .and_then(|mut formats| formats.next())
            .unwrap_or(Sample::F32(SampleType::Planar));

        let mut encoder_context = CodecContext::new()
            .encoder()
            .audio()
            .map_err(|error| TrimtoneError::EncodeError(error.to_string()))?;
        encoder_context.set_rate(self.sample_rate() as i32);
        encoder_context.set_channel_layout(channel_layout);
        encoder_context.set_format(sample_format);
        encoder_context.set_time_base(Rational(1, self.sample_rate() as i32));
        encoder_context.set_bit_rate(bitrate as usize);

        let mut encoder = encoder_context
            .open_as(codec)
            .map_err(|error| TrimtoneError::EncodeError(error.to_string()))?;

        let mut resampler = ResamplingContext::get(
            Sample::I16(SampleType::Packed),
            channel_layout,
            self.sample_rate(),
            sample_format,
            channel_layout,
            self.sample_rate(),
        )
        .map_err(|error| TrimtoneError::EncodeError(error.to_string()))?;

        // The stream leads with the 2-byte audio-specific-config — the
        // non-audio priming entry every frame table starts with.
        let mut plan = StreamPlan::new(self.sample_rate(), out_channels, bitrate);
        let asc = mp4::audio_specific_config(self.sample_rate(), out_channels);
        let mut stream: Vec<u8> = asc.to_vec();
        plan.push_frame(asc.len() as u32);

        // Feed two extra frames past the requested range to cover the
        // encoder's priming delay; the tail is zero-padded.
        let total_samples = num_samples + 2 * SAMPLES_PER_FRAME;
        let frames_to_feed = total_samples.div_ceil(SAMPLES_PER_FRAME);

        let mut tracker = ProgressTracker::new(
            options.progress.clone(),
            OperationType::Encoding,
            Some(frames_to_feed as u64),
            options.batch_size,
        );

        let mut chunk = vec![0i16; SAMPLES_PER_FRAME * out_channels as usize];
        let mut converted = AudioFrame::empty();
        let mut packet = Packet::empty();

        for frame_index in 0..frames_to_feed {
            if options.is_cancelled() {
                return Err(TrimtoneError::Cancelled);
            }

            self.fill_frame(&mut chunk, start_sample + frame_index * SAMPLES_PER_FRAME);

            let mut frame = AudioFrame::new(
                Sample::I16(SampleType::Packed),
                SAMPLES_PER_FRAME,
                channel_layout,
            );
            frame.set_rate(self.sample_rate());
            let bytes: &[u8] = unsafe {
                std::slice::from_raw_parts(chunk.as_ptr() as *const u8, chunk.len() * 2)
            };
            frame.data_mut(0)[..bytes.len()].copy_from_slice(bytes);
            frame.set_pts(Some((frame_index * SAMPLES_PER_FRAME) as i64));

            resampler
                .run(&frame, &mut converted)
                .map_err(|error| TrimtoneError::EncodeError(error.to_string()))?;
            converted.set_pts(Some((frame_index * SAMPLES_PER_FRAME) as i64));

            encoder
                .send_frame(&converted)
                .map_err(|error| TrimtoneError::EncodeError(error.to_string()))?;
            collect_packets(&mut encoder, &mut packet, &mut plan, &mut stream);
            tracker.advance(1);
        }

        // Drain the encoder; every emitted frame is counted, however small.
        let _ = encoder.send_eof();
        collect_packets(&mut encoder, &mut packet, &mut plan, &mut stream);
        tracker.finish();

        let header = mp4::mp4_header(&plan)?;
        sink.write_all(&header)?;
        for chunk in stream.chunks(WRITE_CHUNK_BYTES) {
            if options.is_cancelled() {
                return Err(TrimtoneError::Cancelled);
            }
            sink.write_all(chunk)?;
        }
        sink.flush()?;

        log::debug!(
            "Wrote M4A: {} header bytes + {} stream bytes in {} frames",
            header.len(),
            plan.total_stream_size(),
            plan.num_frames(),
        );
        Ok(())
    }

    /// Encode the `[start, end)` time range as a WAV file into `sink`.
    ///
    /// The PCM range is copied verbatim after the 44-byte header, except
    /// that 2-channel data has each (right, left) sample pair swapped to
    /// the left-first order WAV players expect.
    ///
    /// # Errors
    ///
    /// - [`TrimtoneError::InvalidRange`] if `start > end`.
    /// - [`TrimtoneError::IoError`] for sink failures.
    /// - [`TrimtoneError::Cancelled`] on cancellation.
    pub fn write_wav<W: Write>(
        &self,
        start: Duration,
        end: Duration,
        sink: &mut W,
        options: &TrimOptions,
    ) -> Result<(), TrimtoneError> {
        let (start_sample, num_samples) = self.resolve_range(start, end)?;
        self.write_wav_samples(start_sample, num_samples, sink, options)
    }

    fn write_wav_samples<W: Write>(
        &self,
        start_sample: usize,
        num_samples: usize,
        sink: &mut W,
        options: &TrimOptions,
    ) -> Result<(), TrimtoneError> {
        log::debug!("Encoding {num_samples} samples/channel to WAV");

        sink.write_all(&wav_header(
            self.sample_rate(),
            self.channels(),
            num_samples as u32,
        ))?;

        let channels = self.channels() as usize;
        let frames_to_write = num_samples.div_ceil(SAMPLES_PER_FRAME);
        let mut tracker = ProgressTracker::new(
            options.progress.clone(),
            OperationType::Encoding,
            Some(frames_to_write as u64),
            options.batch_size,
        );

        let mut remaining = num_samples;
        let mut position = start_sample;
        while remaining > 0 {
            if options.is_cancelled() {
                return Err(TrimtoneError::Cancelled);
            }
            let frame_samples = remaining.min(SAMPLES_PER_FRAME);
            let mut chunk = vec![0i16; frame_samples * channels];
            self.fill_pcm(&mut chunk, position);
            if self.channels() == 2 {
                swap_left_right_pairs(&mut chunk);
            }
            write_samples_le(sink, &chunk)?;
            remaining -= frame_samples;
            position += frame_samples;
            tracker.advance(1);
        }
        sink.flush()?;
        tracker.finish();
        Ok(())
    }

    /// [`write_m4a`](DecodedAudio::write_m4a) with the range given in
    /// 1024-sample frames instead of time.
    pub fn write_m4a_frames<W: Write>(
        &self,
        start_frame: usize,
        num_frames: usize,
        sink: &mut W,
        options: &TrimOptions,
    ) -> Result<(), TrimtoneError> {
        self.write_m4a_samples(
            start_frame * SAMPLES_PER_FRAME,
            num_frames * SAMPLES_PER_FRAME,
            sink,
            options,
        )
    }

    /// [`write_wav`](DecodedAudio::write_wav) with the range given in
    /// 1024-sample frames instead of time.
    pub fn write_wav_frames<W: Write>(
        &self,
        start_frame: usize,
        num_frames: usize,
        sink: &mut W,
        options: &TrimOptions,
    ) -> Result<(), TrimtoneError> {
        self.write_wav_samples(
            start_frame * SAMPLES_PER_FRAME,
            num_frames * SAMPLES_PER_FRAME,
            sink,
            options,
        )
    }

    /// Encode a time range as M4A straight to a file path.
    ///
    /// On failure the partially written file is left on disk for the
    /// caller to delete.
    pub fn save_m4a<P: AsRef<Path>>(
        &self,
        path: P,
        start: Duration,
        end: Duration,
        options: &TrimOptions,
    ) -> Result<(), TrimtoneError> {
        let mut sink = BufWriter::new(File::create(path)?);
        self.write_m4a(start, end, &mut sink, options)
    }

    /// Encode a time range as WAV straight to a file path.
    ///
    /// On failure the partially written file is left on disk for the
    /// caller to delete.
    pub fn save_wav<P: AsRef<Path>>(
        &self,
        path: P,
        start: Duration,
        end: Duration,
        options: &TrimOptions,
    ) -> Result<(), TrimtoneError> {
        let mut sink = BufWriter::new(File::create(path)?);
        self.write_wav(start, end, &mut sink, options)
    }

    /// Convert a time range into (start sample, samples per channel).
    fn resolve_range(
        &self,
        start: Duration,
        end: Duration,
    ) -> Result<(usize, usize), TrimtoneError> {
        if start > end {
            return Err(TrimtoneError::InvalidRange { start, end });
        }
        let start_sample = (start.as_secs_f64() * self.sample_rate() as f64) as usize;
        let num_samples = ((end - start).as_secs_f64() * self.sample_rate() as f64) as usize;
        Ok((start_sample, num_samples))
    }

    /// Fill `chunk` with source PCM starting at sample `position` (per
    /// channel), zero-padding past the end of the buffer.
    fn fill_pcm(&self, chunk: &mut [i16], position: usize) {
        let source = self.samples();
        let offset = position * self.channels() as usize;
        let available = source.len().saturating_sub(offset).min(chunk.len());
        if available > 0 {
            chunk[..available].copy_from_slice(&source[offset..offset + available]);
        }
        chunk[available..].fill(0);
    }

    /// Fill an interleaved encoder frame starting at sample `position`,
    /// duplicating mono input to stereo and zero-padding past the end.
    fn fill_frame(&self, chunk: &mut [i16], position: usize) {
        if self.channels() == 1 && chunk.len() == 2 * SAMPLES_PER_FRAME {
            let source = self.samples();
            for (index, pair) in chunk.chunks_exact_mut(2).enumerate() {
                let sample = source.get(position + index).copied().unwrap_or(0);
                pair[0] = sample;
                pair[1] = sample;
            }
        } else {
            self.fill_pcm(chunk, position);
        }
    }
}

/// Swap the two halves of every 2×16-bit sample pair in place.
///
/// The in-memory convention for 2-channel data stores each pair as
/// (right, left); WAV expects left first, so the WAV encoder applies this
/// transform exactly once on the way out. The transform is an involution:
/// applying it twice restores the original order.
pub fn swap_left_right_pairs(samples: &mut [i16]) {
    for pair in samples.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
}

/// Drain every packet currently available from the encoder, appending
/// sizes to the plan and bytes to the stream.
fn collect_packets(
    encoder: &mut ffmpeg_next::encoder::Audio,
    packet: &mut Packet,
    plan: &mut StreamPlan,
    stream: &mut Vec<u8>,
) {
    while encoder.receive_packet(packet).is_ok() {
        if let Some(data) = packet.data() {
            plan.push_frame(data.len() as u32);
            stream.extend_from_slice(data);
        }
    }
}

/// Write i16 samples to the sink in little-endian byte order.
fn write_samples_le<W: Write>(sink: &mut W, samples: &[i16]) -> std::io::Result<()> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    sink.write_all(&bytes)
}
