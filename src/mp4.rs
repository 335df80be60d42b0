//! MP4/M4A container header synthesis.
//!
//! This module builds the complete header of a single-track MP4 audio file
//! (`ftyp` + `moov` + an empty `mdat` placeholder) for an AAC-LC elementary
//! stream, without any external muxing library. The header ends exactly
//! where the raw encoded stream must begin; the `stco` chunk offset and the
//! `mdat` size are patched once the tree's total size is known.
//!
//! All multi-byte integers are big-endian per ISO/IEC 14496-12. The
//! elementary-stream descriptor (`esds`) follows ISO/IEC 14496-1/-3:
//! ES descriptor → decoder-config descriptor → 2-byte
//! audio-specific-config → SL-config descriptor.
//!
//! [`StreamPlan`] carries everything the header depends on: sample rate,
//! channel count, bitrate, and the ordered per-frame byte sizes of the
//! encoded stream. The plan must be complete before synthesis — the header
//! embeds the full frame-size table and an offset that depends on its own
//! length.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::atom::Atom;
use crate::error::TrimtoneError;

/// Samples per channel in one AAC frame.
const AAC_FRAME_SAMPLES: u32 = 1024;

/// Seconds between 1904-01-01 (the MP4 epoch) and 1970-01-01.
const MP4_EPOCH_OFFSET: u64 = 2_082_844_800;

/// Sampling frequencies addressable by the 4-bit index in an
/// audio-specific-config, in table order (index 0 = 96 kHz).
const SAMPLING_FREQUENCIES: [u32; 13] = [
    96_000, 88_200, 64_000, 48_000, 44_100, 32_000, 24_000, 22_050, 16_000, 12_000, 11_025,
    8_000, 7_350,
];

/// Accumulated description of an encoded AAC elementary stream.
///
/// Built up by the encode pipeline — one [`push_frame`](StreamPlan::push_frame)
/// per encoder output packet, in order — and consumed exactly once by
/// [`mp4_header`]. The first entry must be the 2-byte priming entry: AAC
/// streams are treated as starting with one non-audio "frame" (the
/// audio-specific-config bytes), so `frame_sizes[0] == 2`.
#[derive(Debug, Clone)]
pub struct StreamPlan {
    /// Sampling frequency in Hz.
    pub sample_rate: u32,
    /// Channel count of the encoded stream.
    pub channels: u16,
    /// Byte size of every stream entry, in stream order.
    pub frame_sizes: Vec<u32>,
    /// Bitrate the stream was encoded at, in bits per second.
    pub bitrate: u32,
}

impl StreamPlan {
    /// Create a plan with an empty frame-size table.
    pub fn new(sample_rate: u32, channels: u16, bitrate: u32) -> Self {
        Self {
            sample_rate,
            channels,
            frame_sizes: Vec::new(),
            bitrate,
        }
    }

    /// Record the byte size of the next stream entry.
    pub fn push_frame(&mut self, size: u32) {
        self.frame_sizes.push(size);
    }

    /// Total byte length of the elementary stream.
    pub fn total_stream_size(&self) -> u64 {
        self.frame_sizes.iter().map(|&s| s as u64).sum()
    }

    /// Number of stream entries, priming entry included.
    pub fn num_frames(&self) -> usize {
        self.frame_sizes.len()
    }

    fn max_frame_size(&self) -> u32 {
        self.frame_sizes.iter().copied().max().unwrap_or(0)
    }
}

/// Synthesize the complete M4A header for the given stream plan.
///
/// The returned bytes end exactly where the raw elementary stream must be
/// appended. The declared `mdat` size already covers that stream
/// (`8 + Σ frame_sizes`), and the `stco` chunk offset equals the header
/// length.
///
/// # Errors
///
/// - [`TrimtoneError::HeaderSynthesis`] if the frame-size table is missing
///   the 2-byte priming entry, or if the synthesized tree lacks its `stco`
///   box (a builder bug, not bad input).
pub fn mp4_header(plan: &StreamPlan) -> Result<Vec<u8>, TrimtoneError> {
    if plan.frame_sizes.len() < 2 || plan.frame_sizes[0] != 2 {
        return Err(TrimtoneError::HeaderSynthesis(
            "frame size table must start with the 2-byte priming entry".to_string(),
        ));
    }

    // The priming entry carries no audio.
    let num_samples = AAC_FRAME_SAMPLES * (plan.num_frames() as u32 - 1);
    let duration_ms = {
        let numerator = num_samples as u64 * 1000;
        let mut ms = numerator / plan.sample_rate as u64;
        if numerator % plan.sample_rate as u64 > 0 {
            ms += 1;
        }
        ms as u32
    };
    let time = mp4_timestamp();

    let ftyp = ftyp_atom();
    let mut moov = moov_atom(plan, time, duration_ms, num_samples);
    let mdat = Atom::leaf(*b"mdat", Vec::new());

    // The header is ftyp + moov + the empty mdat; the stream follows
    // immediately, so the chunk offset equals the header length.
    let chunk_offset = ftyp.size() + moov.size() + mdat.size();
    let stco = moov
        .find_mut("trak.mdia.minf.stbl.stco")
        .and_then(|atom| atom.data_mut())
        .ok_or_else(|| {
            TrimtoneError::HeaderSynthesis("stco box missing from synthesized tree".to_string())
        })?;
    let offset_field = stco.len() - 4;
    stco[offset_field..].copy_from_slice(&chunk_offset.to_be_bytes());

    let mut header = Vec::with_capacity(chunk_offset as usize);
    header.extend_from_slice(&ftyp.to_bytes());
    header.extend_from_slice(&moov.to_bytes());
    header.extend_from_slice(&mdat.to_bytes());

    // Declare the mdat size as covering the stream that will be appended.
    let mdat_size = 8 + plan.total_stream_size() as u32;
    let mdat_field = header.len() - 8;
    header[mdat_field..mdat_field + 4].copy_from_slice(&mdat_size.to_be_bytes());

    Ok(header)
}

/// The 2-byte AAC-LC audio-specific-config for the given stream shape.
///
/// Bit layout: 5-bit audio object type (2 = AAC-LC), 4-bit sampling
/// frequency index, 4-bit channel configuration, 3 zero bits
/// (1024-sample frames). These bytes appear both inside the `esds`
/// descriptor and as the stream's priming entry.
pub(crate) fn audio_specific_config(sample_rate: u32, channels: u16) -> [u8; 2] {
    let index = sampling_frequency_index(sample_rate);
    [
        0x10 | ((index >> 1) & 0x07) as u8,
        (((index & 1) << 7) as u8) | (((channels & 0x0F) << 3) as u8),
    ]
}

/// Resolve a sample rate to its sampling-frequency-table index.
///
/// Rates not in the table fall back to index 4 (44,100 Hz) for
/// compatibility with the widest range of players; the resulting file's
/// descriptor then disagrees with its media header, so the mismatch is
/// logged rather than silent.
fn sampling_frequency_index(sample_rate: u32) -> u32 {
    match SAMPLING_FREQUENCIES
        .iter()
        .position(|&rate| rate == sample_rate)
    {
        Some(index) => index as u32,
        None => {
            log::warn!(
                "Sample rate {sample_rate} Hz has no sampling-frequency index; defaulting to 44100 Hz"
            );
            4
        }
    }
}

/// Seconds since 1904-01-01, the epoch of MP4 creation/modification times.
fn mp4_timestamp() -> u32 {
    let unix_seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    (unix_seconds + MP4_EPOCH_OFFSET) as u32
}

fn ftyp_atom() -> Atom {
    let mut data = Vec::with_capacity(20);
    data.extend_from_slice(b"M4A "); // major brand
    data.extend_from_slice(&[0, 0, 0, 0]); // minor version
    data.extend_from_slice(b"M4A "); // compatible brands
    data.extend_from_slice(b"mp42");
    data.extend_from_slice(b"isom");
    Atom::leaf(*b"ftyp", data)
}

fn moov_atom(plan: &StreamPlan, time: u32, duration_ms: u32, num_samples: u32) -> Atom {
    let mut moov = Atom::container(*b"moov");
    moov.push_child(mvhd_atom(time, duration_ms));
    moov.push_child(trak_atom(plan, time, duration_ms, num_samples));
    moov
}

fn mvhd_atom(time: u32, duration_ms: u32) -> Atom {
    let mut data = Vec::with_capacity(96);
    data.extend_from_slice(&time.to_be_bytes()); // creation time
    data.extend_from_slice(&time.to_be_bytes()); // modification time
    data.extend_from_slice(&1000u32.to_be_bytes()); // timescale: duration in ms
    data.extend_from_slice(&duration_ms.to_be_bytes());
    data.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // rate = 1.0
    data.extend_from_slice(&[0x01, 0x00]); // volume = 1.0
    data.extend_from_slice(&[0; 10]); // reserved
    data.extend_from_slice(&UNITY_MATRIX);
    data.extend_from_slice(&[0; 24]); // pre-defined
    data.extend_from_slice(&2u32.to_be_bytes()); // next track ID
    Atom::full_leaf(*b"mvhd", 0, 0, data)
}

fn trak_atom(plan: &StreamPlan, time: u32, duration_ms: u32, num_samples: u32) -> Atom {
    let mut trak = Atom::container(*b"trak");
    trak.push_child(tkhd_atom(time, duration_ms));
    trak.push_child(mdia_atom(plan, time, num_samples));
    trak
}

fn tkhd_atom(time: u32, duration_ms: u32) -> Atom {
    let mut data = Vec::with_capacity(80);
    data.extend_from_slice(&time.to_be_bytes()); // creation time
    data.extend_from_slice(&time.to_be_bytes()); // modification time
    data.extend_from_slice(&1u32.to_be_bytes()); // track ID
    data.extend_from_slice(&[0; 4]); // reserved
    data.extend_from_slice(&duration_ms.to_be_bytes());
    data.extend_from_slice(&[0; 8]); // reserved
    data.extend_from_slice(&[0, 0]); // layer
    data.extend_from_slice(&[0, 0]); // alternate group
    data.extend_from_slice(&[0x01, 0x00]); // volume = 1.0
    data.extend_from_slice(&[0, 0]); // reserved
    data.extend_from_slice(&UNITY_MATRIX);
    data.extend_from_slice(&[0; 4]); // width (audio: zero)
    data.extend_from_slice(&[0; 4]); // height
    // Flags 0x07: track enabled, in movie, and in preview.
    Atom::full_leaf(*b"tkhd", 0, 0x07, data)
}

fn mdia_atom(plan: &StreamPlan, time: u32, num_samples: u32) -> Atom {
    let mut mdia = Atom::container(*b"mdia");
    mdia.push_child(mdhd_atom(plan, time, num_samples));
    mdia.push_child(hdlr_atom());
    mdia.push_child(minf_atom(plan));
    mdia
}

fn mdhd_atom(plan: &StreamPlan, time: u32, num_samples: u32) -> Atom {
    let mut data = Vec::with_capacity(20);
    data.extend_from_slice(&time.to_be_bytes()); // creation time
    data.extend_from_slice(&time.to_be_bytes()); // modification time
    // Timescale = sampling frequency, so the duration is in samples.
    data.extend_from_slice(&plan.sample_rate.to_be_bytes());
    data.extend_from_slice(&num_samples.to_be_bytes());
    data.extend_from_slice(&[0, 0]); // language
    data.extend_from_slice(&[0, 0]); // pre-defined
    Atom::full_leaf(*b"mdhd", 0, 0, data)
}

fn hdlr_atom() -> Atom {
    let mut data = Vec::with_capacity(32);
    data.extend_from_slice(&[0; 4]); // pre-defined
    data.extend_from_slice(b"soun"); // handler type
    data.extend_from_slice(&[0; 12]); // reserved
    data.extend_from_slice(b"SoundHandle\0"); // name, for inspection tools
    Atom::full_leaf(*b"hdlr", 0, 0, data)
}

fn minf_atom(plan: &StreamPlan) -> Atom {
    let mut minf = Atom::container(*b"minf");
    minf.push_child(smhd_atom());
    minf.push_child(dinf_atom());
    minf.push_child(stbl_atom(plan));
    minf
}

fn smhd_atom() -> Atom {
    // Balance (center) + reserved.
    Atom::full_leaf(*b"smhd", 0, 0, vec![0, 0, 0, 0])
}

fn dinf_atom() -> Atom {
    let mut dinf = Atom::container(*b"dinf");
    dinf.push_child(dref_atom());
    dinf
}

fn dref_atom() -> Atom {
    // One self-referencing "url " entry: flag 0x01 marks the media data as
    // contained in this file.
    let url = Atom::full_leaf(*b"url ", 0, 0x01, Vec::new()).to_bytes();
    let mut data = Vec::with_capacity(4 + url.len());
    data.extend_from_slice(&1u32.to_be_bytes()); // entry count
    data.extend_from_slice(&url);
    Atom::full_leaf(*b"dref", 0, 0, data)
}

fn stbl_atom(plan: &StreamPlan) -> Atom {
    let mut stbl = Atom::container(*b"stbl");
    stbl.push_child(stsd_atom(plan));
    stbl.push_child(stts_atom(plan));
    stbl.push_child(stsc_atom(plan));
    stbl.push_child(stsz_atom(plan));
    stbl.push_child(stco_atom());
    stbl
}

fn stsd_atom(plan: &StreamPlan) -> Atom {
    let mp4a = mp4a_atom(plan).to_bytes();
    let mut data = Vec::with_capacity(4 + mp4a.len());
    data.extend_from_slice(&1u32.to_be_bytes()); // entry count
    data.extend_from_slice(&mp4a);
    Atom::full_leaf(*b"stsd", 0, 0, data)
}

fn mp4a_atom(plan: &StreamPlan) -> Atom {
    // Audio sample entry per ISO/IEC 14496-14 section 5.6.1.
    let mut data = Vec::with_capacity(28 + 41);
    data.extend_from_slice(&[0; 6]); // reserved
    data.extend_from_slice(&1u16.to_be_bytes()); // data reference index
    data.extend_from_slice(&[0; 8]); // reserved
    data.extend_from_slice(&plan.channels.to_be_bytes());
    data.extend_from_slice(&16u16.to_be_bytes()); // sample size in bits
    data.extend_from_slice(&[0, 0]); // pre-defined
    data.extend_from_slice(&[0, 0]); // reserved
    // Sample rate as 16.16 fixed point.
    data.extend_from_slice(&((plan.sample_rate as u16).to_be_bytes()));
    data.extend_from_slice(&[0, 0]);
    data.extend_from_slice(&esds_atom(plan).to_bytes());
    Atom::leaf(*b"mp4a", data)
}

fn esds_atom(plan: &StreamPlan) -> Atom {
    Atom::full_leaf(*b"esds", 0, 0, es_descriptor(plan))
}

/// Build the ES descriptor for an ISO/IEC 14496-3 AAC-LC stream.
fn es_descriptor(plan: &StreamPlan) -> Vec<u8> {
    // Decoder buffer size: at least 0x300 bytes and at least twice the
    // largest frame, rounded up to the next multiple of 0x100.
    let mut buffer_size: u32 = 0x300;
    while buffer_size < 2 * plan.max_frame_size() {
        buffer_size += 0x100;
    }

    let asc = audio_specific_config(plan.sample_rate, plan.channels);

    // Decoder-config descriptor: tag 0x04, object type 0x40 (Audio
    // ISO/IEC 14496-3), stream type 0x15 (AudioStream), buffer size,
    // max and average bitrate, then the audio-specific-config (tag 0x05).
    let mut dec_config = Vec::with_capacity(19);
    dec_config.extend_from_slice(&[0x04, 0x11, 0x40, 0x15]);
    dec_config.extend_from_slice(&buffer_size.to_be_bytes()[1..]);
    dec_config.extend_from_slice(&plan.bitrate.to_be_bytes()); // max bitrate
    dec_config.extend_from_slice(&plan.bitrate.to_be_bytes()); // avg bitrate
    dec_config.extend_from_slice(&[0x05, 0x02, asc[0], asc[1]]);

    // ES descriptor: tag 0x03, ES ID 0, no flags, then the decoder config
    // and the MP4-specific SL-config descriptor (tag 0x06).
    let mut descriptor = Vec::with_capacity(27);
    descriptor.extend_from_slice(&[0x03, 0x19, 0x00, 0x00, 0x00]);
    descriptor.extend_from_slice(&dec_config);
    descriptor.extend_from_slice(&[0x06, 0x01, 0x02]);
    descriptor
}

fn stts_atom(plan: &StreamPlan) -> Atom {
    let num_audio_frames = plan.num_frames() as u32 - 1;
    let mut data = Vec::with_capacity(20);
    data.extend_from_slice(&2u32.to_be_bytes()); // entry count
    data.extend_from_slice(&1u32.to_be_bytes()); // the priming entry…
    data.extend_from_slice(&0u32.to_be_bytes()); // …carries no samples
    data.extend_from_slice(&num_audio_frames.to_be_bytes());
    data.extend_from_slice(&AAC_FRAME_SAMPLES.to_be_bytes()); // samples per frame
    Atom::full_leaf(*b"stts", 0, 0, data)
}

fn stsc_atom(plan: &StreamPlan) -> Atom {
    let num_frames = plan.num_frames() as u32;
    let mut data = Vec::with_capacity(16);
    data.extend_from_slice(&1u32.to_be_bytes()); // entry count
    data.extend_from_slice(&1u32.to_be_bytes()); // first chunk
    data.extend_from_slice(&num_frames.to_be_bytes()); // all frames in one chunk
    data.extend_from_slice(&1u32.to_be_bytes()); // sample description index
    Atom::full_leaf(*b"stsc", 0, 0, data)
}

fn stsz_atom(plan: &StreamPlan) -> Atom {
    let num_frames = plan.num_frames() as u32;
    let mut data = Vec::with_capacity(8 + 4 * plan.num_frames());
    data.extend_from_slice(&0u32.to_be_bytes()); // 0: every frame has its own size
    data.extend_from_slice(&num_frames.to_be_bytes());
    for &size in &plan.frame_sizes {
        data.extend_from_slice(&size.to_be_bytes());
    }
    Atom::full_leaf(*b"stsz", 0, 0, data)
}

fn stco_atom() -> Atom {
    let mut data = Vec::with_capacity(8);
    data.extend_from_slice(&1u32.to_be_bytes()); // entry count
    // Chunk offset. Placeholder — patched to the header length once the
    // tree's total size is known.
    data.extend_from_slice(&0u32.to_be_bytes());
    Atom::full_leaf(*b"stco", 0, 0, data)
}

/// The 3×3 unity transform matrix in 16.16 / 2.30 fixed point, as it
/// appears in `mvhd` and `tkhd`.
const UNITY_MATRIX: [u8; 36] = [
    0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0x40, 0, 0, 0,
];
