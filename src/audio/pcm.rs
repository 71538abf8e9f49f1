//! Fixed-width little-endian PCM.
//!
//! One-byte samples are unsigned offset-binary (silence is `0x80`); wider
//! samples are signed two's complement. Full scale is `2^(bits-1) - 1` in
//! both directions so that encode and decode are symmetric around zero.

use super::signal::AudioSignal;
use crate::error::{FeatureError, Result};

fn check_layout(sample_bytes: u16, channels: u16) -> Result<()> {
    if !(1..=4).contains(&sample_bytes) {
        return Err(FeatureError::Pcm(format!(
            "unsupported sample width {} bytes",
            sample_bytes
        )));
    }
    if channels == 0 {
        return Err(FeatureError::Pcm("channel count must be at least 1".to_string()));
    }
    Ok(())
}

fn full_scale(sample_bytes: u16) -> f64 {
    ((1i64 << (8 * sample_bytes as u32 - 1)) - 1) as f64
}

/// Quantize a mono signal, writing each sample to every channel of its frame.
pub fn render_pcm(signal: &AudioSignal, sample_bytes: u16, channels: u16) -> Result<Vec<u8>> {
    check_layout(sample_bytes, channels)?;
    let width = sample_bytes as usize;
    let scale = full_scale(sample_bytes);

    let mut bytes = Vec::with_capacity(signal.len() * width * channels as usize);
    for &sample in signal.samples() {
        let value = (sample.clamp(-1.0, 1.0) as f64 * scale).round() as i64;
        let encoded = if sample_bytes == 1 {
            (value + 128).to_le_bytes()
        } else {
            value.to_le_bytes()
        };
        for _ in 0..channels {
            bytes.extend_from_slice(&encoded[..width]);
        }
    }
    Ok(bytes)
}

/// Decode interleaved PCM to mono by averaging the channels of each frame.
pub fn decode_pcm(bytes: &[u8], sample_bytes: u16, channels: u16, sample_rate: u32) -> Result<AudioSignal> {
    check_layout(sample_bytes, channels)?;
    let width = sample_bytes as usize;
    let frame_bytes = width * channels as usize;
    if bytes.len() % frame_bytes != 0 {
        return Err(FeatureError::Pcm(format!(
            "{} bytes is not a whole number of {}-byte frames",
            bytes.len(),
            frame_bytes
        )));
    }

    let scale = full_scale(sample_bytes);
    let samples = bytes
        .chunks_exact(frame_bytes)
        .map(|frame| {
            let sum: f64 = frame
                .chunks_exact(width)
                .map(|raw| decode_sample(raw) as f64 / scale)
                .sum();
            (sum / channels as f64) as f32
        })
        .collect();
    Ok(AudioSignal::new(samples, sample_rate))
}

fn decode_sample(raw: &[u8]) -> i64 {
    if raw.len() == 1 {
        return raw[0] as i64 - 128;
    }
    let mut buf = [0u8; 8];
    buf[..raw.len()].copy_from_slice(raw);
    // Sign-extend from the top bit of the last byte.
    if raw[raw.len() - 1] & 0x80 != 0 {
        buf[raw.len()..].fill(0xff);
    }
    i64::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(samples: &[f32]) -> AudioSignal {
        AudioSignal::new(samples.to_vec(), 22050)
    }

    #[test]
    fn sixteen_bit_layout() {
        let bytes = render_pcm(&signal(&[0.0, 1.0, -1.0, 2.0]), 2, 1).unwrap();
        assert_eq!(
            bytes,
            vec![0x00, 0x00, 0xff, 0x7f, 0x01, 0x80, 0xff, 0x7f]
        );
    }

    #[test]
    fn eight_bit_is_offset_binary() {
        let bytes = render_pcm(&signal(&[0.0, 1.0, -1.0]), 1, 1).unwrap();
        assert_eq!(bytes, vec![128, 255, 1]);
    }

    #[test]
    fn channels_are_duplicated() {
        let bytes = render_pcm(&signal(&[0.5, -0.25]), 3, 2).unwrap();
        assert_eq!(bytes.len(), 2 * 3 * 2);
        assert_eq!(bytes[0..3], bytes[3..6]);
        assert_eq!(bytes[6..9], bytes[9..12]);
    }

    #[test]
    fn decode_averages_to_mono() {
        let bytes = render_pcm(&signal(&[0.5, -0.25, 0.0]), 2, 2).unwrap();
        let decoded = decode_pcm(&bytes, 2, 2, 16000).unwrap();
        assert_eq!(decoded.sample_rate(), 16000);
        assert_eq!(decoded.len(), 3);
        for (a, b) in decoded.samples().iter().zip([0.5, -0.25, 0.0]) {
            assert!((a - b).abs() < 1e-4, "{} vs {}", a, b);
        }
    }

    #[test]
    fn every_width_preserves_sign_and_level() {
        let input = [0.9f32, -0.9, 0.1, -0.5];
        for width in 1..=4u16 {
            let bytes = render_pcm(&signal(&input), width, 1).unwrap();
            let decoded = decode_pcm(&bytes, width, 1, 22050).unwrap();
            let tolerance = 1.0 / full_scale(width) as f32;
            for (a, b) in decoded.samples().iter().zip(input) {
                assert!((a - b).abs() <= tolerance, "width {}: {} vs {}", width, a, b);
            }
        }
    }

    #[test]
    fn partial_frames_are_rejected() {
        assert!(matches!(
            decode_pcm(&[0u8; 5], 2, 1, 22050),
            Err(FeatureError::Pcm(_))
        ));
        assert!(matches!(
            decode_pcm(&[0u8; 6], 2, 2, 22050),
            Err(FeatureError::Pcm(_))
        ));
    }

    #[test]
    fn unsupported_widths_are_rejected() {
        assert!(render_pcm(&signal(&[0.0]), 0, 1).is_err());
        assert!(render_pcm(&signal(&[0.0]), 5, 1).is_err());
        assert!(render_pcm(&signal(&[0.0]), 2, 0).is_err());
    }
}
