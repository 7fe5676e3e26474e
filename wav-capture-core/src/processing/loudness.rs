/// Noise-gated RMS loudness metering for raw PCM buffers.
///
/// Samples whose magnitude does not exceed 10% of full scale are ignored, so
/// background hiss does not drag the meter up during silence.
use crate::models::audio_models::BitDepth;

/// Fraction of full scale below which samples are gated out.
pub const NOISE_FLOOR_RATIO: f32 = 0.1;

/// Gate threshold in raw sample units: 12 for 8-bit, 3276 for 16-bit.
pub fn noise_floor(bit_depth: BitDepth) -> i32 {
    (bit_depth.max_amplitude() * NOISE_FLOOR_RATIO) as i32
}

/// Normalized loudness of the first `valid_len` bytes of `buffer`.
///
/// 8-bit buffers hold signed bytes, 16-bit buffers little-endian signed words
/// (a trailing odd byte is ignored). Returns `None` when no sample passes the
/// noise gate, otherwise the RMS of the gated samples divided by full scale,
/// clamped to `[0, 1]`.
pub fn analyze(buffer: &[u8], valid_len: usize, bit_depth: BitDepth) -> Option<f32> {
    let valid = &buffer[..valid_len.min(buffer.len())];
    let floor = noise_floor(bit_depth);

    let rms = match bit_depth {
        BitDepth::Eight => gated_rms(valid.iter().map(|&b| i32::from(b as i8)), floor),
        BitDepth::Sixteen => gated_rms(
            valid
                .chunks_exact(2)
                .map(|pair| i32::from(i16::from_le_bytes([pair[0], pair[1]]))),
            floor,
        ),
    }?;

    Some((rms / bit_depth.max_amplitude() as f64).clamp(0.0, 1.0) as f32)
}

fn gated_rms(samples: impl Iterator<Item = i32>, floor: i32) -> Option<f64> {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for sample in samples.filter(|s| s.abs() > floor) {
        let value = f64::from(sample);
        sum += value * value;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some((sum / count as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pcm16(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn noise_floor_values() {
        assert_eq!(noise_floor(BitDepth::Eight), 12);
        assert_eq!(noise_floor(BitDepth::Sixteen), 3276);
    }

    #[test]
    fn silence_has_no_gated_samples() {
        let buffer = vec![0u8; 640];
        assert_eq!(analyze(&buffer, buffer.len(), BitDepth::Sixteen), None);
        assert_eq!(analyze(&buffer, buffer.len(), BitDepth::Eight), None);
    }

    #[test]
    fn full_scale_is_one() {
        let buffer = pcm16(&[i16::MAX; 160]);
        let volume = analyze(&buffer, buffer.len(), BitDepth::Sixteen).unwrap();
        assert_relative_eq!(volume, 1.0, epsilon = 1e-6);

        let buffer = vec![i8::MAX as u8; 64];
        let volume = analyze(&buffer, buffer.len(), BitDepth::Eight).unwrap();
        assert_relative_eq!(volume, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn negative_full_scale_clamps_to_one() {
        let buffer = pcm16(&[i16::MIN; 16]);
        assert_eq!(analyze(&buffer, buffer.len(), BitDepth::Sixteen), Some(1.0));
    }

    #[test]
    fn hiss_below_floor_is_ignored() {
        // Quiet samples would halve the RMS if they were counted.
        let buffer = pcm16(&[16384, -16384, 100, -100, 3276, -3276]);
        let volume = analyze(&buffer, buffer.len(), BitDepth::Sixteen).unwrap();
        assert_relative_eq!(volume, 16384.0 / 32767.0, epsilon = 1e-6);
    }

    #[test]
    fn eight_bit_samples_are_signed() {
        // 0xC0 is -64 as a signed byte.
        let buffer = [0xC0u8, 0x40, 0x05];
        let volume = analyze(&buffer, buffer.len(), BitDepth::Eight).unwrap();
        assert_relative_eq!(volume, 64.0 / 127.0, epsilon = 1e-6);
    }

    #[test]
    fn only_valid_length_is_metered() {
        let mut buffer = pcm16(&[0; 4]);
        buffer.extend(pcm16(&[i16::MAX; 4]));
        assert_eq!(analyze(&buffer, 8, BitDepth::Sixteen), None);
        assert!(analyze(&buffer, buffer.len(), BitDepth::Sixteen).is_some());
    }

    #[test]
    fn trailing_odd_byte_is_ignored() {
        let mut buffer = pcm16(&[8000]);
        buffer.push(0x7F);
        let volume = analyze(&buffer, buffer.len(), BitDepth::Sixteen).unwrap();
        assert_relative_eq!(volume, 8000.0 / 32767.0, epsilon = 1e-6);
    }

    #[test]
    fn valid_len_past_buffer_end_is_clamped() {
        let buffer = pcm16(&[20000; 2]);
        assert!(analyze(&buffer, 1000, BitDepth::Sixteen).is_some());
    }

    #[test]
    fn volume_stays_in_unit_range() {
        let mut seed = 0x2545_f491_u32;
        for _ in 0..200 {
            let buffer: Vec<u8> = (0..257)
                .map(|_| {
                    seed ^= seed << 13;
                    seed ^= seed >> 17;
                    seed ^= seed << 5;
                    (seed >> 24) as u8
                })
                .collect();
            for depth in [BitDepth::Eight, BitDepth::Sixteen] {
                if let Some(volume) = analyze(&buffer, buffer.len(), depth) {
                    assert!((0.0..=1.0).contains(&volume), "{} out of range", volume);
                }
            }
        }
    }
}
