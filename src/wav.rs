//! WAV header synthesis.
//!
//! A WAV file is a RIFF container with a fixed 44-byte preamble for
//! canonical 16-bit PCM: `RIFF` chunk, `WAVE` form type, `fmt ` chunk, and
//! the `data` chunk header. All multi-byte integers here are
//! little-endian — the opposite of the MP4 convention in [`crate::mp4`] —
//! and players reject files that mix the two up.

/// Length of the canonical PCM WAV header.
pub const WAV_HEADER_LEN: usize = 44;

/// Build the 44-byte WAV header for 16-bit PCM audio.
///
/// `num_samples` counts samples *per channel*; the declared data size is
/// `num_samples × channels × 2` and the RIFF size is 36 bytes more.
///
/// # Example
///
/// ```
/// use trimtone::wav_header;
///
/// let header = wav_header(44_100, 1, 44_100);
/// assert_eq!(&header[..4], b"RIFF");
/// assert_eq!(u32::from_le_bytes(header[40..44].try_into().unwrap()), 88_200);
/// ```
pub fn wav_header(sample_rate: u32, channels: u16, num_samples: u32) -> [u8; WAV_HEADER_LEN] {
    let bytes_per_frame = 2 * channels as u32; // one i16 per channel
    let data_size = num_samples * bytes_per_frame;
    let byte_rate = sample_rate * bytes_per_frame;

    let mut header = [0u8; WAV_HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36 + data_size).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // format tag 1 = PCM
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&(bytes_per_frame as u16).to_le_bytes()); // block align
    header[34..36].copy_from_slice(&16u16.to_le_bytes()); // bits per sample

    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());
    header
}
