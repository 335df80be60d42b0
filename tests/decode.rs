//! Decode pipeline round-trip tests.
//!
//! Fixtures are generated with the crate's own WAV writer, so the suite
//! needs no checked-in media files.

use std::time::Duration;

use trimtone::{DecodedAudio, TrimOptions, TrimtoneError};

/// Write a 2-second 44.1 kHz mono WAV fixture and return its path.
fn mono_fixture(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("two_seconds.wav");
    let samples: Vec<i16> = (0..88_200).map(|index| ((index % 500) * 60) as i16).collect();
    let audio = DecodedAudio::from_samples(44_100, 1, samples);
    audio
        .save_wav(&path, Duration::ZERO, audio.duration(), &TrimOptions::new())
        .unwrap();
    path
}

#[test]
fn two_second_mono_wav_decodes_to_88200_samples() {
    let dir = tempfile::tempdir().unwrap();
    let path = mono_fixture(&dir);

    let audio = trimtone::decode_file(&path, &TrimOptions::new()).unwrap();
    assert_eq!(audio.sample_rate(), 44_100);
    assert_eq!(audio.channels(), 1);
    assert_eq!(audio.num_samples(), 88_200);
    assert_eq!(audio.source_format(), Some("wav"));
    assert_eq!(audio.duration(), Duration::from_secs(2));

    // 88,200 samples in 1024-sample frames, final partial frame included.
    assert_eq!(audio.num_frames(), 88_200usize.div_ceil(1024));
    assert_eq!(audio.frame_gains().len(), audio.num_frames());
    assert!(audio.frame_estimates().is_some());
}

#[test]
fn decoded_fixture_reencodes_to_the_exact_wav_size() {
    let dir = tempfile::tempdir().unwrap();
    let path = mono_fixture(&dir);
    let audio = trimtone::decode_file(&path, &TrimOptions::new()).unwrap();

    let out_path = dir.path().join("one_second.wav");
    audio
        .save_wav(
            &out_path,
            Duration::ZERO,
            Duration::from_secs(1),
            &TrimOptions::new(),
        )
        .unwrap();

    let written = std::fs::metadata(&out_path).unwrap().len();
    assert_eq!(written, 44 + 44_100 * 2);
}

#[test]
fn decode_round_trips_sample_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = mono_fixture(&dir);
    let audio = trimtone::decode_file(&path, &TrimOptions::new()).unwrap();

    // WAV → PCM decode is lossless; spot-check the ramp.
    assert_eq!(audio.samples()[0], 0);
    assert_eq!(audio.samples()[1], 60);
    assert_eq!(audio.samples()[499], 499 * 60);
    assert_eq!(audio.samples()[500], 0);
}

#[test]
fn memory_cap_truncates_instead_of_failing() {
    let dir = tempfile::tempdir().unwrap();
    let path = mono_fixture(&dir);

    // 64 KiB caps the buffer at 32,768 samples; the decode must finalize
    // with a truncated clip rather than erroring.
    let options = TrimOptions::new().with_memory_limit(64 * 1024);
    let audio = trimtone::decode_file(&path, &options).unwrap();
    assert!(audio.num_samples() <= 32_768);
    assert_eq!(audio.sample_rate(), 44_100);
}

#[test]
fn stereo_wav_preserves_channel_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stereo.wav");

    let samples: Vec<i16> = (0..16_000).map(|index| (index % 256) as i16).collect();
    let source = DecodedAudio::from_samples(8_000, 2, samples);
    source
        .save_wav(&path, Duration::ZERO, source.duration(), &TrimOptions::new())
        .unwrap();

    let audio = trimtone::decode_file(&path, &TrimOptions::new()).unwrap();
    assert_eq!(audio.channels(), 2);
    assert_eq!(audio.sample_rate(), 8_000);
    assert_eq!(audio.num_samples(), 8_000);
}

#[test]
fn no_audio_track_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.wav");
    // A WAV header with no samples still has an audio stream, so build a
    // file that is not audio at all but carries a supported extension.
    std::fs::write(&path, b"not really a wav file").unwrap();

    let result = trimtone::decode_file(&path, &TrimOptions::new());
    assert!(matches!(
        result,
        Err(TrimtoneError::FileOpen { .. }) | Err(TrimtoneError::NoAudioTrack),
    ));
}
