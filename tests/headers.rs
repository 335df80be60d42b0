//! WAV and MP4 header well-formedness.

use trimtone::{StreamPlan, TrimtoneError, mp4_header, wav_header};

// ── Minimal box parser used to inspect synthesized headers ─────────

/// Return (payload offset, payload length) of the first `tag` box at the
/// top level of `data`.
fn top_level_box(data: &[u8], tag: &[u8; 4]) -> Option<(usize, usize)> {
    let mut offset = 0;
    while offset + 8 <= data.len() {
        let size = u32::from_be_bytes(data[offset..offset + 4].try_into().unwrap()) as usize;
        if &data[offset + 4..offset + 8] == tag {
            return Some((offset + 8, size - 8));
        }
        if size < 8 {
            return None;
        }
        offset += size;
    }
    None
}

/// Resolve a dotted path of container boxes, returning the payload of the
/// final (leaf) box. `full_box_leaf` skips the 4-byte version/flags of the
/// final box.
fn find_box<'a>(data: &'a [u8], path: &str, full_box_leaf: bool) -> Option<&'a [u8]> {
    let mut region = data;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let tag: [u8; 4] = segment.as_bytes().try_into().ok()?;
        let (payload_offset, payload_len) = top_level_box(region, &tag)?;
        region = &region[payload_offset..payload_offset + payload_len];
        if segments.peek().is_none() {
            return Some(if full_box_leaf { &region[4..] } else { region });
        }
    }
    None
}

fn sample_plan() -> StreamPlan {
    let mut plan = StreamPlan::new(44_100, 2, 128_000);
    for size in [2u32, 100, 200, 150] {
        plan.push_frame(size);
    }
    plan
}

// ── WAV ────────────────────────────────────────────────────────────

#[test]
fn wav_header_round_trips_exactly() {
    let header = wav_header(44_100, 2, 88_200);
    assert_eq!(header.len(), 44);

    assert_eq!(&header[0..4], b"RIFF");
    assert_eq!(&header[8..12], b"WAVE");
    assert_eq!(&header[12..16], b"fmt ");
    assert_eq!(&header[36..40], b"data");

    let data_size = 88_200u32 * 2 * 2;
    let riff_size = u32::from_le_bytes(header[4..8].try_into().unwrap());
    assert_eq!(riff_size, 36 + data_size);

    assert_eq!(u32::from_le_bytes(header[16..20].try_into().unwrap()), 16);
    assert_eq!(u16::from_le_bytes(header[20..22].try_into().unwrap()), 1); // PCM
    assert_eq!(u16::from_le_bytes(header[22..24].try_into().unwrap()), 2);
    assert_eq!(
        u32::from_le_bytes(header[24..28].try_into().unwrap()),
        44_100,
    );
    assert_eq!(
        u32::from_le_bytes(header[28..32].try_into().unwrap()),
        44_100 * 2 * 2, // byte rate
    );
    assert_eq!(u16::from_le_bytes(header[32..34].try_into().unwrap()), 4); // block align
    assert_eq!(u16::from_le_bytes(header[34..36].try_into().unwrap()), 16);
    assert_eq!(
        u32::from_le_bytes(header[40..44].try_into().unwrap()),
        data_size,
    );
}

#[test]
fn wav_header_zero_samples() {
    let header = wav_header(8_000, 1, 0);
    assert_eq!(u32::from_le_bytes(header[4..8].try_into().unwrap()), 36);
    assert_eq!(u32::from_le_bytes(header[40..44].try_into().unwrap()), 0);
}

// ── MP4 ────────────────────────────────────────────────────────────

#[test]
fn mp4_header_starts_with_ftyp_brand() {
    let header = mp4_header(&sample_plan()).unwrap();
    assert_eq!(&header[4..8], b"ftyp");
    assert_eq!(&header[8..12], b"M4A ");
}

#[test]
fn mp4_header_mdat_declares_stream_size() {
    let plan = sample_plan();
    let header = mp4_header(&plan).unwrap();

    // The placeholder mdat box is the last 8 bytes of the header.
    let declared = u32::from_be_bytes(header[header.len() - 8..header.len() - 4].try_into().unwrap());
    assert_eq!(&header[header.len() - 4..], b"mdat");
    assert_eq!(declared as u64, 8 + plan.total_stream_size());
    assert_eq!(plan.total_stream_size(), 452);
}

#[test]
fn mp4_header_chunk_offset_is_header_length() {
    let header = mp4_header(&sample_plan()).unwrap();
    let (moov_payload, moov_len) = top_level_box(&header, b"moov").unwrap();
    let moov = &header[moov_payload..moov_payload + moov_len];

    let stco = find_box(moov, "trak.mdia.minf.stbl.stco", true).unwrap();
    let entry_count = u32::from_be_bytes(stco[0..4].try_into().unwrap());
    let chunk_offset = u32::from_be_bytes(stco[4..8].try_into().unwrap());
    assert_eq!(entry_count, 1);
    assert_eq!(chunk_offset as usize, header.len());
}

#[test]
fn mp4_header_stsz_lists_every_frame() {
    let plan = sample_plan();
    let header = mp4_header(&plan).unwrap();
    let (moov_payload, moov_len) = top_level_box(&header, b"moov").unwrap();
    let moov = &header[moov_payload..moov_payload + moov_len];

    let stsz = find_box(moov, "trak.mdia.minf.stbl.stsz", true).unwrap();
    assert_eq!(u32::from_be_bytes(stsz[0..4].try_into().unwrap()), 0); // per-frame sizes
    let count = u32::from_be_bytes(stsz[4..8].try_into().unwrap());
    assert_eq!(count as usize, plan.num_frames());
    for (index, expected) in plan.frame_sizes.iter().enumerate() {
        let offset = 8 + index * 4;
        let size = u32::from_be_bytes(stsz[offset..offset + 4].try_into().unwrap());
        assert_eq!(size, *expected);
    }
}

#[test]
fn mp4_header_stts_accounts_for_the_priming_frame() {
    let header = mp4_header(&sample_plan()).unwrap();
    let (moov_payload, moov_len) = top_level_box(&header, b"moov").unwrap();
    let moov = &header[moov_payload..moov_payload + moov_len];

    let stts = find_box(moov, "trak.mdia.minf.stbl.stts", true).unwrap();
    assert_eq!(u32::from_be_bytes(stts[0..4].try_into().unwrap()), 2);
    // One priming frame of zero duration…
    assert_eq!(u32::from_be_bytes(stts[4..8].try_into().unwrap()), 1);
    assert_eq!(u32::from_be_bytes(stts[8..12].try_into().unwrap()), 0);
    // …then 3 frames of 1024 samples each.
    assert_eq!(u32::from_be_bytes(stts[12..16].try_into().unwrap()), 3);
    assert_eq!(u32::from_be_bytes(stts[16..20].try_into().unwrap()), 1024);
}

#[test]
fn mp4_header_media_duration_excludes_the_priming_frame() {
    let header = mp4_header(&sample_plan()).unwrap();
    let (moov_payload, moov_len) = top_level_box(&header, b"moov").unwrap();
    let moov = &header[moov_payload..moov_payload + moov_len];

    let mdhd = find_box(moov, "trak.mdia.mdhd", true).unwrap();
    let timescale = u32::from_be_bytes(mdhd[8..12].try_into().unwrap());
    let duration = u32::from_be_bytes(mdhd[12..16].try_into().unwrap());
    assert_eq!(timescale, 44_100);
    assert_eq!(duration, 1024 * 3);
}

#[test]
fn mp4_header_embeds_the_audio_specific_config() {
    let header = mp4_header(&sample_plan()).unwrap();
    // AAC-LC, frequency index 4 (44.1 kHz), 2 channels: 0x12 0x10,
    // prefixed by the descriptor tag 0x05 and length 0x02.
    let asc = [0x05u8, 0x02, 0x12, 0x10];
    assert!(
        header.windows(4).any(|window| window == asc),
        "audio-specific-config bytes not found in header",
    );
}

#[test]
fn mp4_header_rejects_plans_without_priming_entry() {
    let mut plan = StreamPlan::new(44_100, 2, 128_000);
    plan.push_frame(100);
    plan.push_frame(200);
    assert!(matches!(
        mp4_header(&plan),
        Err(TrimtoneError::HeaderSynthesis(_)),
    ));

    let short = StreamPlan::new(44_100, 2, 128_000);
    assert!(matches!(
        mp4_header(&short),
        Err(TrimtoneError::HeaderSynthesis(_)),
    ));
}

#[test]
fn mp4_header_unknown_rate_falls_back_to_44100() {
    let mut plan = StreamPlan::new(48_123, 1, 64_000);
    plan.push_frame(2);
    plan.push_frame(64);
    let header = mp4_header(&plan).unwrap();
    // Frequency index falls back to 4; channel config 1: 0x12 0x08.
    let asc = [0x05u8, 0x02, 0x12, 0x08];
    assert!(header.windows(4).any(|window| window == asc));
}
