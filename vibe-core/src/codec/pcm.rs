//! f32 ↔ 16-bit PCM conversion.
//!
//! The live API speaks raw little-endian signed 16-bit PCM in both directions
//! (16 kHz mono out, 24 kHz mono in). Samples outside [-1.0, 1.0] are clamped
//! to the i16 range on encode — `as i16` saturates, so a hot microphone can
//! never wrap into the opposite sign.

use crate::error::{Result, VibeError};

/// Encode f32 samples in [-1.0, 1.0] as little-endian 16-bit PCM.
///
/// Output length is always `2 * samples.len()`.
pub fn floats_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let v = (s * 32768.0).round() as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Decode little-endian 16-bit PCM into per-channel f32 sample vectors.
///
/// Interleaved input is split across `channels` output vectors, each sample
/// mapped to `v / 32768.0`.
///
/// # Errors
/// `VibeError::MalformedPcm` when `channels` is zero or the byte length is not
/// a whole number of interleaved frames.
pub fn pcm16_to_floats(bytes: &[u8], channels: usize) -> Result<Vec<Vec<f32>>> {
    if channels == 0 {
        return Err(VibeError::MalformedPcm("channel count must be non-zero".into()));
    }
    let frame_bytes = 2 * channels;
    if bytes.len() % frame_bytes != 0 {
        return Err(VibeError::MalformedPcm(format!(
            "{} bytes is not a multiple of {} ({}ch × 2 bytes)",
            bytes.len(),
            frame_bytes,
            channels
        )));
    }

    let frames = bytes.len() / frame_bytes;
    let mut out = vec![Vec::with_capacity(frames); channels];
    for (i, pair) in bytes.chunks_exact(2).enumerate() {
        let v = i16::from_le_bytes([pair[0], pair[1]]);
        out[i % channels].push(v as f32 / 32768.0);
    }
    Ok(out)
}

/// Decode mono little-endian 16-bit PCM into a single f32 sample vector.
pub fn pcm16_to_mono_floats(bytes: &[u8]) -> Result<Vec<f32>> {
    let mut channels = pcm16_to_floats(bytes, 1)?;
    Ok(channels.pop().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn encode_length_is_two_bytes_per_sample() {
        let pcm = floats_to_pcm16(&[0.0, 0.5, -0.5]);
        assert_eq!(pcm.len(), 6);
    }

    #[test]
    fn round_trip_error_bounded_by_one_lsb() {
        let samples: Vec<f32> = (0..1000).map(|i| (i as f32 / 500.0) - 1.0).collect();
        let decoded = pcm16_to_mono_floats(&floats_to_pcm16(&samples)).unwrap();
        assert_eq!(decoded.len(), samples.len());
        for (a, b) in samples.iter().zip(&decoded) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1.0 / 32768.0);
        }
    }

    #[test]
    fn out_of_range_samples_clamp_instead_of_wrapping() {
        let pcm = floats_to_pcm16(&[1.5, -1.5]);
        let hot = i16::from_le_bytes([pcm[0], pcm[1]]);
        let cold = i16::from_le_bytes([pcm[2], pcm[3]]);
        assert_eq!(hot, i16::MAX);
        assert_eq!(cold, i16::MIN);
    }

    #[test]
    fn full_scale_negative_is_exact() {
        let pcm = floats_to_pcm16(&[-1.0]);
        assert_eq!(i16::from_le_bytes([pcm[0], pcm[1]]), -32768);
    }

    #[test]
    fn stereo_deinterleave() {
        // Interleaved L/R: L=0x0001, R=0x0002, L=0x0003, R=0x0004
        let bytes = [1u8, 0, 2, 0, 3, 0, 4, 0];
        let channels = pcm16_to_floats(&bytes, 2).unwrap();
        assert_eq!(channels.len(), 2);
        assert_abs_diff_eq!(channels[0][0], 1.0 / 32768.0);
        assert_abs_diff_eq!(channels[1][0], 2.0 / 32768.0);
        assert_abs_diff_eq!(channels[0][1], 3.0 / 32768.0);
        assert_abs_diff_eq!(channels[1][1], 4.0 / 32768.0);
    }

    #[test]
    fn misaligned_length_is_rejected() {
        assert!(pcm16_to_floats(&[0, 1, 2], 1).is_err());
        // 6 bytes = 3 mono frames but only 1.5 stereo frames
        assert!(pcm16_to_floats(&[0; 6], 2).is_err());
    }

    #[test]
    fn zero_channels_is_rejected() {
        assert!(pcm16_to_floats(&[0, 0], 0).is_err());
    }

    #[test]
    fn empty_payload_decodes_to_empty() {
        let decoded = pcm16_to_mono_floats(&[]).unwrap();
        assert!(decoded.is_empty());
    }
}
