//! Decode pipeline: source file → [`DecodedAudio`].
//!
//! Drives the FFmpeg demuxer and decoder to turn the first audio track of
//! a supported file into one contiguous interleaved i16 buffer. The output
//! buffer grows adaptively using a size estimate derived from how much of
//! the compressed file has been consumed; when growth fails (allocator or
//! configured cap), decoding stops early and finalizes with the samples
//! gathered so far.
//!
//! Format detection is by file extension only — an unsupported extension
//! fails before the file is opened.

use std::ffi::OsStr;
use std::path::Path;

use ffmpeg_next::{
    ChannelLayout,
    codec::{Id, context::Context as CodecContext},
    format::{Sample, sample::Type as SampleType},
    frame::Audio as AudioFrame,
    media::Type,
    software::resampling::Context as ResamplingContext,
};

use crate::error::TrimtoneError;
use crate::options::TrimOptions;
use crate::progress::{OperationType, ProgressTracker};
use crate::sound::{DecodedAudio, SampleBuffer};

/// File extensions accepted by [`decode_file`], lowercase.
pub const SUPPORTED_EXTENSIONS: [&str; 8] =
    ["mp3", "wav", "3gpp", "3gp", "amr", "aac", "m4a", "ogg"];

/// Initial decoded-sample buffer capacity: 1 MiB of i16 samples (about six
/// seconds of 44.1 kHz stereo).
const INITIAL_BUFFER_SAMPLES: usize = (1 << 20) / 2;

/// Extra headroom added to every growth estimate: 5 MiB of i16 samples.
const GROWTH_HEADROOM_SAMPLES: usize = 5 * (1 << 20) / 2;

/// Check whether a file name ends in one of the supported extensions.
///
/// # Example
///
/// ```
/// assert!(trimtone::is_filename_supported("ringtone.mp3"));
/// assert!(!trimtone::is_filename_supported("clip.flac"));
/// ```
pub fn is_filename_supported(filename: &str) -> bool {
    let lowered = filename.to_lowercase();
    SUPPORTED_EXTENSIONS
        .iter()
        .any(|extension| lowered.ends_with(&format!(".{extension}")))
}

/// Decode the first audio track of `path` into a [`DecodedAudio`].
///
/// Progress is reported as compressed bytes consumed out of the file size.
/// Cancellation is polled at every packet; a cancelled decode returns
/// [`TrimtoneError::Cancelled`] and yields no partial result.
///
/// # Errors
///
/// - [`TrimtoneError::UnsupportedExtension`] if the extension is not in
///   [`SUPPORTED_EXTENSIONS`] (recoverable; the file was not opened).
/// - [`TrimtoneError::FileOpen`] if the file cannot be opened or probed.
/// - [`TrimtoneError::NoAudioTrack`] if no stream carries audio.
/// - [`TrimtoneError::DecodeError`] for decoder failures.
/// - [`TrimtoneError::Cancelled`] on cancellation.
///
/// Allocation failure during buffer growth is *not* an error: the decode
/// finalizes early with the samples gathered so far.
///
/// # Example
///
/// ```no_run
/// use trimtone::{TrimOptions, TrimtoneError};
///
/// let audio = trimtone::decode_file("song.mp3", &TrimOptions::new())?;
/// println!("{} Hz, {} ch, {:?}", audio.sample_rate(), audio.channels(), audio.duration());
/// # Ok::<(), TrimtoneError>(())
/// ```
pub fn decode_file<P: AsRef<Path>>(
    path: P,
    options: &TrimOptions,
) -> Result<DecodedAudio, TrimtoneError> {
    let path = path.as_ref();

    let extension = path
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_lowercase)
        .filter(|extension| SUPPORTED_EXTENSIONS.contains(&extension.as_str()))
        .ok_or_else(|| TrimtoneError::UnsupportedExtension {
            path: path.to_path_buf(),
        })?;

    let file_size = std::fs::metadata(path)
        .map_err(|error| TrimtoneError::FileOpen {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?
        .len();

    log::debug!("Decoding {} ({file_size} bytes)", path.display());

    ffmpeg_next::init().map_err(|error| TrimtoneError::FileOpen {
        path: path.to_path_buf(),
        reason: format!("FFmpeg initialisation failed: {error}"),
    })?;

    let mut input = ffmpeg_next::format::input(&path).map_err(|error| TrimtoneError::FileOpen {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })?;

    // Select the first audio track present in the file.
    let (stream_index, codec_parameters, codec_id) = {
        let stream = input
            .streams()
            .find(|stream| stream.parameters().medium() == Type::Audio)
            .ok_or(TrimtoneError::NoAudioTrack)?;
        (stream.index(), stream.parameters(), stream.parameters().id())
    };

    let decoder_context = CodecContext::from_parameters(codec_parameters)?;
    let mut decoder = decoder_context
        .decoder()
        .audio()
        .map_err(|error| TrimtoneError::DecodeError(error.to_string()))?;

    let sample_rate = decoder.rate();
    let channel_layout = if decoder.channel_layout().channels() > 0 {
        decoder.channel_layout()
    } else {
        ChannelLayout::default(decoder.channels().max(1) as i32)
    };
    let channels = channel_layout.channels().max(1) as u16;

    // Expected samples per channel, from the container duration. Used as a
    // secondary stop: some demuxer/decoder pairs never flag end-of-stream
    // on certain mono AAC inputs.
    let duration_microseconds = input.duration();
    let expected_samples = if duration_microseconds > 0 {
        ((duration_microseconds as f64 / 1_000_000.0) * sample_rate as f64 + 0.5) as u64
    } else {
        u64::MAX
    };

    // Every decoded frame is converted to packed interleaved i16 at the
    // source rate and layout.
    let mut resampler = ResamplingContext::get(
        decoder.format(),
        channel_layout,
        sample_rate,
        Sample::I16(SampleType::Packed),
        channel_layout,
        sample_rate,
    )
    .map_err(|error| TrimtoneError::DecodeError(format!("Failed to create resampler: {error}")))?;

    let mut buffer = SampleBuffer::new(INITIAL_BUFFER_SAMPLES, options.memory_limit);
    let mut tracker = ProgressTracker::new(
        options.progress.clone(),
        OperationType::Decoding,
        Some(file_size),
        options.batch_size,
    );

    let mut decoded_frame = AudioFrame::empty();
    let mut resampled_frame = AudioFrame::empty();
    let mut bytes_read: u64 = 0;
    let mut first_packet = true;
    let mut truncated = false;
    let mut done = false;

    for (stream, packet) in input.packets() {
        if options.is_cancelled() {
            log::debug!("Decode cancelled after {bytes_read} bytes");
            return Err(TrimtoneError::Cancelled);
        }
        if stream.index() != stream_index {
            continue;
        }

        // Some AAC streams lead with a 2-byte configuration packet that
        // certain decoders choke on; the decoder already knows those
        // parameters, so it is dropped without being fed.
        if first_packet && codec_id == Id::AAC && packet.size() == 2 {
            first_packet = false;
            bytes_read += 2;
            tracker.advance(2);
            continue;
        }
        first_packet = false;

        bytes_read += packet.size() as u64;
        tracker.advance(packet.size() as u64);

        decoder
            .send_packet(&packet)
            .map_err(|error| TrimtoneError::DecodeError(error.to_string()))?;

        while decoder.receive_frame(&mut decoded_frame).is_ok() {
            if !drain_resampler(
                &mut resampler,
                &decoded_frame,
                &mut resampled_frame,
                &mut buffer,
                channels,
                file_size,
                bytes_read,
            ) {
                truncated = true;
                break;
            }
            if (buffer.len() / channels as usize) as u64 >= expected_samples {
                done = true;
                break;
            }
        }
        if truncated || done {
            break;
        }
    }

    // Flush the decoder unless the buffer already hit its ceiling.
    if !truncated && !done {
        let _ = decoder.send_eof();
        while decoder.receive_frame(&mut decoded_frame).is_ok() {
            if !drain_resampler(
                &mut resampler,
                &decoded_frame,
                &mut resampled_frame,
                &mut buffer,
                channels,
                file_size,
                bytes_read,
            ) {
                truncated = true;
                break;
            }
            if (buffer.len() / channels as usize) as u64 >= expected_samples {
                break;
            }
        }
    }

    tracker.finish();

    let samples = buffer.into_samples();
    let num_samples = samples.len() / channels as usize;
    let avg_bitrate_kbps = if num_samples > 0 {
        ((file_size * 8) as f64 * (sample_rate as f64 / num_samples as f64) / 1000.0) as u32
    } else {
        0
    };

    log::debug!(
        "Decoded {num_samples} samples/channel ({channels} ch, {sample_rate} Hz{})",
        if truncated { ", truncated" } else { "" },
    );

    Ok(DecodedAudio::from_parts(
        sample_rate,
        channels,
        samples,
        Some(extension),
        file_size,
        avg_bitrate_kbps,
        true,
    ))
}

/// Resample one decoded frame into the buffer, flushing any resampler
/// delay. Returns `false` when buffer growth failed and decoding must
/// finalize early.
fn drain_resampler(
    resampler: &mut ResamplingContext,
    decoded_frame: &AudioFrame,
    resampled_frame: &mut AudioFrame,
    buffer: &mut SampleBuffer,
    channels: u16,
    file_size: u64,
    bytes_read: u64,
) -> bool {
    let Ok(delay) = resampler.run(decoded_frame, resampled_frame) else {
        // A conversion hiccup on one frame is not fatal; skip it.
        return true;
    };
    if !append_frame(buffer, resampled_frame, channels, file_size, bytes_read) {
        return false;
    }
    if delay.is_some() {
        let flush_frame = AudioFrame::empty();
        if resampler.run(&flush_frame, resampled_frame).is_ok()
            && !append_frame(buffer, resampled_frame, channels, file_size, bytes_read)
        {
            return false;
        }
    }
    true
}

/// Append one resampled frame's interleaved i16 data, growing the buffer
/// by the adaptive estimate when needed. Returns `false` on growth failure.
fn append_frame(
    buffer: &mut SampleBuffer,
    resampled_frame: &AudioFrame,
    channels: u16,
    file_size: u64,
    bytes_read: u64,
) -> bool {
    let sample_count = resampled_frame.samples() * channels as usize;
    if sample_count == 0 {
        return true;
    }
    let data = resampled_frame.data(0);
    let chunk: &[i16] =
        unsafe { std::slice::from_raw_parts(data.as_ptr() as *const i16, sample_count) };

    if buffer.remaining() < chunk.len() {
        let position = buffer.len();
        // Rough total-size estimate from the compressed-bytes ratio, plus
        // 20%; never grow by less than the needed amount plus 5 MiB so the
        // buffer is resized as few times as possible.
        let mut target = if bytes_read > 0 {
            (position as f64 * (file_size as f64 / bytes_read as f64) * 1.2) as usize
        } else {
            0
        };
        let floor = position + chunk.len() + GROWTH_HEADROOM_SAMPLES;
        if target < floor {
            target = floor;
        }
        if !buffer.try_grow_to(target) {
            return false;
        }
    }
    buffer.extend_from_slice(chunk);
    true
}
