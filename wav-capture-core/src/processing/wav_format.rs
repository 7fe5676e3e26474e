/// WAV container header utilities.
///
/// Generates the 44-byte canonical RIFF/WAVE header written in front of every
/// recording and parses it back.
///
/// The header always declares 16 bits per sample and derives byte rate and
/// block align from that, whatever bit depth the device captured at. Readers
/// of existing recordings depend on this layout, so it is kept as-is.
use crate::models::config::CaptureParameters;
use crate::models::error::CaptureError;

/// Size of the canonical WAV header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Bits per sample written to every header.
pub const HEADER_BITS_PER_SAMPLE: u16 = 16;

/// Generate the 44-byte header for `data_size` bytes of PCM.
///
/// Layout (all integers little-endian):
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    data_size + 36 (file size - 8)
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM format chunk size)
/// [20-21]  1 (PCM format code)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = 16 * sample_rate * channels / 8
/// [32-33]  block_align = channels * 2
/// [34-35]  16
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
///
/// Fails with `Storage` when the byte rate or the RIFF size does not fit its
/// 32-bit field.
pub fn generate_wav_header(
    sample_rate: u32,
    channels: u16,
    data_size: u32,
) -> Result<[u8; WAV_HEADER_SIZE], CaptureError> {
    let byte_rate = u32::try_from(
        u64::from(HEADER_BITS_PER_SAMPLE) * u64::from(sample_rate) * u64::from(channels) / 8,
    )
    .map_err(|_| {
        CaptureError::Storage(format!(
            "byte rate of {} Hz x {} channels exceeds the WAV field",
            sample_rate, channels
        ))
    })?;
    let block_align = channels
        .checked_mul(HEADER_BITS_PER_SAMPLE / 8)
        .ok_or_else(|| CaptureError::Storage(format!("block align overflows for {} channels", channels)))?;
    let chunk_size = data_size
        .checked_add(36)
        .ok_or_else(|| CaptureError::Storage(format!("{} bytes of PCM exceed the WAV size limit", data_size)))?;

    let mut header = [0u8; WAV_HEADER_SIZE];

    // RIFF chunk descriptor
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&HEADER_BITS_PER_SAMPLE.to_le_bytes());

    // data sub-chunk
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    Ok(header)
}

/// Header for a recording made with `params` holding `pcm_len` bytes.
///
/// Fails if `pcm_len` or the byte rate does not fit the 32-bit size fields.
pub fn header_for(params: &CaptureParameters, pcm_len: usize) -> Result<[u8; WAV_HEADER_SIZE], CaptureError> {
    let data_size = u32::try_from(pcm_len)
        .map_err(|_| CaptureError::Storage(format!("{} bytes of PCM exceed the WAV size limit", pcm_len)))?;
    generate_wav_header(params.sample_rate_hz(), params.channel_count(), data_size)
}

/// Fields recovered from a canonical WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeaderInfo {
    pub riff_size: u32,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

/// Parse the canonical 44-byte header at the start of `bytes`.
pub fn parse_wav_header(bytes: &[u8]) -> Result<WavHeaderInfo, CaptureError> {
    if bytes.len() < WAV_HEADER_SIZE {
        return Err(CaptureError::InvalidContainer(format!(
            "header needs {} bytes, got {}",
            WAV_HEADER_SIZE,
            bytes.len()
        )));
    }

    for (range, magic) in [(0..4, b"RIFF"), (8..12, b"WAVE"), (12..16, b"fmt "), (36..40, b"data")] {
        if &bytes[range.clone()] != magic {
            return Err(CaptureError::InvalidContainer(format!(
                "expected {:?} at offset {}",
                String::from_utf8_lossy(magic),
                range.start
            )));
        }
    }

    let format_code = read_u16(bytes, 20);
    if format_code != 1 {
        return Err(CaptureError::InvalidContainer(format!("unsupported format code {}", format_code)));
    }

    Ok(WavHeaderInfo {
        riff_size: read_u32(bytes, 4),
        channels: read_u16(bytes, 22),
        sample_rate: read_u32(bytes, 24),
        byte_rate: read_u32(bytes, 28),
        block_align: read_u16(bytes, 32),
        bits_per_sample: read_u16(bytes, 34),
        data_size: read_u32(bytes, 40),
    })
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}
