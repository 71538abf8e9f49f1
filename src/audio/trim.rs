//! Leading and trailing silence removal.

use crate::config::AudioConfig;
use crate::error::{FeatureError, Result};

/// Mean-square energy below this counts as digital silence.
const POWER_FLOOR: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceTrimmer {
    sample_rate: u32,
    frame_length: usize,
    hop_length: usize,
}

impl SilenceTrimmer {
    pub fn new(sample_rate: u32, frame_length: usize, hop_length: usize) -> Result<Self> {
        if sample_rate == 0 || frame_length == 0 || hop_length == 0 {
            return Err(FeatureError::config(format!(
                "sample_rate, frame_length and hop_length must be positive (got {}, {}, {})",
                sample_rate, frame_length, hop_length
            )));
        }
        Ok(Self {
            sample_rate,
            frame_length,
            hop_length,
        })
    }

    pub fn from_config(config: &AudioConfig) -> Result<Self> {
        Self::new(config.sample_rate, config.win_length, config.hop_length)
    }

    /// Trim `signal` to its non-silent span.
    ///
    /// `margin_sec` is cut from both ends first. The remaining audio is framed
    /// and every frame within `trim_db` of the loudest one is kept; the kept
    /// span then grows by `keep_sec` on each side, bounded by the
    /// margin-trimmed signal.
    pub fn trim<'a>(
        &self,
        signal: &'a [f32],
        trim_db: f32,
        margin_sec: f64,
        keep_sec: f64,
    ) -> Result<&'a [f32]> {
        let margin = seconds_to_samples(self.sample_rate, margin_sec);
        if margin.saturating_mul(2) >= signal.len() {
            return Err(FeatureError::InsufficientSamples {
                required: margin.saturating_mul(2).saturating_add(1),
                actual: signal.len(),
            });
        }
        let inner = &signal[margin..signal.len() - margin];

        let (start, end) = self.non_silent_span(inner, trim_db)?;
        let keep = seconds_to_samples(self.sample_rate, keep_sec);
        let start = start.saturating_sub(keep);
        let end = end.saturating_add(keep).min(inner.len());
        Ok(&inner[start..end])
    }

    /// Sample range `[start, end)` covered by frames within `top_db` of the
    /// loudest frame.
    pub fn non_silent_span(&self, signal: &[f32], top_db: f32) -> Result<(usize, usize)> {
        let energies = self.frame_energies(signal);
        let peak = energies.iter().copied().fold(0.0f64, f64::max);
        if peak <= POWER_FLOOR {
            return Err(FeatureError::SilenceTrim(format!(
                "all {} samples are silent",
                signal.len()
            )));
        }

        let reference_db = power_to_db(peak);
        let loud = |energy: &f64| power_to_db(*energy) - reference_db > -(top_db as f64);
        let first = energies.iter().position(loud);
        let last = energies.iter().rposition(loud);
        match (first, last) {
            (Some(first), Some(last)) => {
                let start = first * self.hop_length;
                let end = ((last + 1) * self.hop_length).min(signal.len());
                Ok((start.min(end), end))
            }
            _ => Err(FeatureError::SilenceTrim(format!(
                "no frame within {} dB of the peak",
                top_db
            ))),
        }
    }

    /// Mean-square energy of centered, zero-padded frames.
    pub fn frame_energies(&self, signal: &[f32]) -> Vec<f64> {
        let len = signal.len();
        let mut prefix = Vec::with_capacity(len + 1);
        prefix.push(0.0f64);
        let mut acc = 0.0f64;
        for &s in signal {
            acc += (s as f64) * (s as f64);
            prefix.push(acc);
        }

        let half = self.frame_length / 2;
        let n_frames = len / self.hop_length + 1;
        (0..n_frames)
            .map(|t| {
                let center = t * self.hop_length;
                let lo = center.saturating_sub(half).min(len);
                let hi = (center + self.frame_length - half).min(len);
                (prefix[hi] - prefix[lo]) / self.frame_length as f64
            })
            .collect()
    }
}

fn seconds_to_samples(sample_rate: u32, seconds: f64) -> usize {
    (sample_rate as f64 * seconds.max(0.0)).floor() as usize
}

fn power_to_db(power: f64) -> f64 {
    10.0 * power.max(POWER_FLOOR).log10()
}
