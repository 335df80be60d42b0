//! Progress, cancellation, and operation-gating tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use trimtone::{
    CancellationToken, DecodedAudio, ProgressCallback, ProgressInfo, TrimOptions, TrimtoneError,
};

// ── CancellationToken ──────────────────────────────────────────────

#[test]
fn cancellation_token_default_not_cancelled() {
    let token = CancellationToken::new();
    assert!(!token.is_cancelled());
}

#[test]
fn cancellation_token_cancel() {
    let token = CancellationToken::new();
    token.cancel();
    assert!(token.is_cancelled());
}

#[test]
fn cancellation_token_clone_shares_state() {
    let token = CancellationToken::new();
    let clone = token.clone();
    assert!(!clone.is_cancelled());

    token.cancel();
    assert!(clone.is_cancelled());
}

#[test]
fn cancellation_token_default_trait() {
    let token = CancellationToken::default();
    assert!(!token.is_cancelled());
}

// ── ProgressInfo ───────────────────────────────────────────────────

struct RecordingProgress {
    infos: Mutex<Vec<ProgressInfo>>,
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.infos.lock().unwrap().push(info.clone());
    }
}

#[test]
fn encode_reports_monotonic_progress() {
    let recorder = Arc::new(RecordingProgress {
        infos: Mutex::new(Vec::new()),
    });
    let options = TrimOptions::new().with_progress(recorder.clone());

    let audio = DecodedAudio::from_samples(44_100, 1, vec![0i16; 44_100]);
    let mut out = Vec::new();
    audio
        .write_wav(Duration::ZERO, Duration::from_secs(1), &mut out, &options)
        .unwrap();

    let infos = recorder.infos.lock().unwrap();
    assert!(!infos.is_empty(), "Expected progress callbacks");
    for info in infos.iter() {
        assert_eq!(info.operation, trimtone::OperationType::Encoding);
    }
    for window in infos.windows(2) {
        assert!(
            window[1].current >= window[0].current,
            "Progress current should be non-decreasing",
        );
    }
    // The final report covers the whole range.
    let last = infos.last().unwrap();
    assert_eq!(last.total, Some(44_100u64.div_ceil(1024)));
    assert_eq!(last.current, 44_100u64.div_ceil(1024));
}

#[test]
fn batch_size_thins_the_callback_cadence() {
    let recorder = Arc::new(RecordingProgress {
        infos: Mutex::new(Vec::new()),
    });
    let options = TrimOptions::new()
        .with_progress(recorder.clone())
        .with_batch_size(16);

    let audio = DecodedAudio::from_samples(44_100, 1, vec![0i16; 44_100]);
    let mut out = Vec::new();
    audio
        .write_wav(Duration::ZERO, Duration::from_secs(1), &mut out, &options)
        .unwrap();

    // 44 frames at a batch of 16: two batched reports plus the final one.
    let infos = recorder.infos.lock().unwrap();
    assert!(infos.len() <= 4, "Expected few reports, got {}", infos.len());
}

// ── Cancellation behavior ──────────────────────────────────────────

#[test]
fn cancelled_encode_returns_cancelled() {
    let token = CancellationToken::new();
    token.cancel(); // Cancel immediately.
    let options = TrimOptions::new().with_cancellation(token);

    let audio = DecodedAudio::from_samples(44_100, 1, vec![0i16; 44_100]);
    let mut out = Vec::new();
    let result = audio.write_wav(Duration::ZERO, Duration::from_secs(1), &mut out, &options);

    match result {
        Err(TrimtoneError::Cancelled) => {}
        other => panic!("Expected Cancelled, got: {other:?}"),
    }
}

#[test]
fn cancelled_decode_yields_no_audio() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.wav");

    // Generate a fixture with our own WAV writer.
    let audio = DecodedAudio::from_samples(44_100, 1, vec![100i16; 44_100]);
    audio
        .save_wav(&path, Duration::ZERO, audio.duration(), &TrimOptions::new())
        .unwrap();

    let token = CancellationToken::new();
    token.cancel(); // Cancel before the first packet.
    let options = TrimOptions::new().with_cancellation(token);

    let result = trimtone::decode_file(&path, &options);
    match result {
        Err(TrimtoneError::Cancelled) => {}
        other => panic!("Expected Cancelled, got: {other:?}"),
    }
}

// ── Operation gating ───────────────────────────────────────────────

#[test]
fn unsupported_extension_is_rejected_before_opening() {
    let result = trimtone::decode_file("definitely-missing.flac", &TrimOptions::new());
    match result {
        Err(TrimtoneError::UnsupportedExtension { path }) => {
            assert!(path.to_string_lossy().contains("definitely-missing"));
        }
        other => panic!("Expected UnsupportedExtension, got: {other:?}"),
    }
}

#[test]
fn missing_file_with_supported_extension_fails_to_open() {
    let result = trimtone::decode_file("definitely-missing.mp3", &TrimOptions::new());
    assert!(matches!(result, Err(TrimtoneError::FileOpen { .. })));
}

#[test]
fn supported_extension_check() {
    assert!(trimtone::is_filename_supported("a.mp3"));
    assert!(trimtone::is_filename_supported("b.WAV"));
    assert!(trimtone::is_filename_supported("c.3gpp"));
    assert!(trimtone::is_filename_supported("d.m4a"));
    assert!(!trimtone::is_filename_supported("e.flac"));
    assert!(!trimtone::is_filename_supported("noextension"));
}

#[test]
fn recording_requires_a_cancellation_token() {
    let result = trimtone::record(&TrimOptions::new());
    match result {
        Err(TrimtoneError::RecordError(message)) => {
            assert!(message.contains("cancellation token"));
        }
        other => panic!("Expected RecordError, got: {other:?}"),
    }
}
