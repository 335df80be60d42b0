//! Recording pipeline: live input device → [`DecodedAudio`].
//!
//! Captures mono 16-bit PCM at 44.1 kHz from the default input device into
//! the same sample-buffer representation the decode pipeline produces, so
//! a recording can feed the same encode pipeline.
//!
//! Recording has no natural end: the cancellation token is the stop
//! mechanism, and [`record`] refuses to start without one. Buffer growth
//! failure (allocator or configured cap) silently stops capture and
//! finalizes with what was recorded.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig};

use crate::error::TrimtoneError;
use crate::options::TrimOptions;
use crate::progress::{OperationType, ProgressTracker};
use crate::sound::{DecodedAudio, SampleBuffer};

/// Recording sample rate in Hz.
pub const RECORD_SAMPLE_RATE: u32 = 44_100;

/// Initial buffer capacity: 20 seconds of mono audio.
const INITIAL_SECONDS: usize = 20;

/// Capacity added per growth step: 10 seconds.
const GROWTH_SECONDS: usize = 10;

/// How long to wait for the next device chunk before re-checking the
/// cancellation token.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Record mono 16-bit PCM at 44.1 kHz from the default input device.
///
/// Capture runs until the cancellation token in `options` fires (or the
/// device stops delivering data). Progress reports the captured sample
/// count and elapsed wall-clock time.
///
/// # Errors
///
/// - [`TrimtoneError::RecordError`] when `options` carries no cancellation
///   token (it is the only way to stop a recording), when no input device
///   is available, or when the device stream cannot be built.
///
/// # Example
///
/// ```no_run
/// use std::{thread, time::Duration};
///
/// use trimtone::{CancellationToken, TrimOptions, TrimtoneError};
///
/// let token = CancellationToken::new();
/// let stopper = token.clone();
/// thread::spawn(move || {
///     thread::sleep(Duration::from_secs(5));
///     stopper.cancel();
/// });
///
/// let options = TrimOptions::new().with_cancellation(token);
/// let clip = trimtone::record(&options)?;
/// println!("Captured {:?}", clip.duration());
/// # Ok::<(), TrimtoneError>(())
/// ```
pub fn record(options: &TrimOptions) -> Result<DecodedAudio, TrimtoneError> {
    let Some(token) = options.cancellation.clone() else {
        return Err(TrimtoneError::RecordError(
            "a cancellation token is required to stop recording".to_string(),
        ));
    };

    let host = cpal::default_host();
    let device = host.default_input_device().ok_or_else(|| {
        TrimtoneError::RecordError("No default input device found".to_string())
    })?;
    let device_name = device.name().unwrap_or_else(|_| "<unknown>".into());
    log::debug!("Recording from input device: {device_name}");

    let sample_format = device
        .default_input_config()
        .map_err(|error| TrimtoneError::RecordError(error.to_string()))?
        .sample_format();

    let config = StreamConfig {
        channels: 1,
        sample_rate: SampleRate(RECORD_SAMPLE_RATE),
        buffer_size: BufferSize::Default,
    };

    // Device callbacks run on cpal's thread; chunks cross to this thread
    // over a channel so the capture loop owns the buffer exclusively.
    let (sender, receiver) = mpsc::channel::<Vec<i16>>();
    let error_callback = |error: cpal::StreamError| log::error!("Input stream error: {error}");

    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let _ = sender.send(data.to_vec());
            },
            error_callback,
            None,
        ),
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let chunk = data
                    .iter()
                    .map(|&sample| (sample.clamp(-1.0, 1.0) * 32_767.0) as i16)
                    .collect();
                let _ = sender.send(chunk);
            },
            error_callback,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                let chunk = data
                    .iter()
                    .map(|&sample| (sample as i32 - 32_768) as i16)
                    .collect();
                let _ = sender.send(chunk);
            },
            error_callback,
            None,
        ),
        other => {
            return Err(TrimtoneError::RecordError(format!(
                "Unsupported input sample format: {other:?}"
            )));
        }
    }
    .map_err(|error| TrimtoneError::RecordError(error.to_string()))?;

    stream
        .play()
        .map_err(|error| TrimtoneError::RecordError(error.to_string()))?;

    let mut buffer = SampleBuffer::new(
        INITIAL_SECONDS * RECORD_SAMPLE_RATE as usize,
        options.memory_limit,
    );
    let mut tracker = ProgressTracker::new(
        options.progress.clone(),
        OperationType::Recording,
        None,
        options.batch_size,
    );

    loop {
        if token.is_cancelled() {
            break;
        }
        let chunk = match receiver.recv_timeout(POLL_INTERVAL) {
            Ok(chunk) => chunk,
            Err(RecvTimeoutError::Timeout) => continue,
            // The device stream died; finalize with what was captured.
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if buffer.remaining() < chunk.len() {
            let mut target = buffer.capacity() + GROWTH_SECONDS * RECORD_SAMPLE_RATE as usize;
            let floor = buffer.len() + chunk.len();
            if target < floor {
                target = floor;
            }
            if !buffer.try_grow_to(target) {
                // Out of memory (or over the cap): keep what we have.
                break;
            }
        }
        buffer.extend_from_slice(&chunk);
        tracker.advance(chunk.len() as u64);
    }

    drop(stream);
    tracker.finish();

    let samples = buffer.into_samples();
    log::debug!("Recorded {} samples", samples.len());

    Ok(DecodedAudio::from_parts(
        RECORD_SAMPLE_RATE,
        1,
        samples,
        Some("raw".to_string()),
        0,
        RECORD_SAMPLE_RATE * 16 / 1000,
        false,
    ))
}
