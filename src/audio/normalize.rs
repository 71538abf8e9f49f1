//! Bounded rescaling of decibel spectrograms for model input and output.
//!
//! Both modes start from `base = ((db - ref_level_db) - min_level_db) / -min_level_db`,
//! which maps `ref_level_db + min_level_db` to 0 and `ref_level_db` to 1.
//! Symmetric mode stretches that to `[-max_norm, max_norm]`, asymmetric mode
//! to `[0, max_norm]`. With clipping enabled, both directions clamp to the
//! target range, so clipped values come back as the range boundary.

use super::signal::{MelDomain, MelSpectrogram};
use crate::config::AudioConfig;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormMode {
    /// `[-max_norm, max_norm]`.
    Symmetric,
    /// `[0, max_norm]`.
    Asymmetric,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalizer {
    mode: NormMode,
    ref_level_db: f32,
    min_level_db: f32,
    max_norm: f32,
    clip: bool,
}

impl Normalizer {
    pub fn new(mode: NormMode, ref_level_db: f32, min_level_db: f32, max_norm: f32, clip: bool) -> Self {
        Self {
            mode,
            ref_level_db,
            min_level_db,
            max_norm,
            clip,
        }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        let mode = if config.symmetric_norm {
            NormMode::Symmetric
        } else {
            NormMode::Asymmetric
        };
        Self::new(
            mode,
            config.ref_level_db,
            config.min_level_db,
            config.max_norm,
            config.clip_norm,
        )
    }

    pub fn mode(&self) -> NormMode {
        self.mode
    }

    /// `(low, high)` bounds of the normalized range.
    pub fn range(&self) -> (f32, f32) {
        match self.mode {
            NormMode::Symmetric => (-self.max_norm, self.max_norm),
            NormMode::Asymmetric => (0.0, self.max_norm),
        }
    }

    pub fn normalize_value(&self, db: f32) -> f32 {
        let base = ((db - self.ref_level_db) - self.min_level_db) / -self.min_level_db;
        let scaled = match self.mode {
            NormMode::Symmetric => 2.0 * self.max_norm * base - self.max_norm,
            NormMode::Asymmetric => self.max_norm * base,
        };
        self.clip_to_range(scaled)
    }

    pub fn denormalize_value(&self, norm: f32) -> f32 {
        let norm = self.clip_to_range(norm);
        let db = match self.mode {
            NormMode::Symmetric => {
                (norm + self.max_norm) * -self.min_level_db / (2.0 * self.max_norm)
                    + self.min_level_db
            }
            NormMode::Asymmetric => norm * -self.min_level_db / self.max_norm + self.min_level_db,
        };
        db + self.ref_level_db
    }

    pub fn normalize(&self, mel: &MelSpectrogram) -> Result<MelSpectrogram> {
        mel.expect_domain(MelDomain::Decibel)?;
        let data = mel.data().mapv(|db| self.normalize_value(db));
        Ok(MelSpectrogram::with_data(data, MelDomain::Normalized))
    }

    pub fn denormalize(&self, mel: &MelSpectrogram) -> Result<MelSpectrogram> {
        mel.expect_domain(MelDomain::Normalized)?;
        let data = mel.data().mapv(|norm| self.denormalize_value(norm));
        Ok(MelSpectrogram::with_data(data, MelDomain::Decibel))
    }

    fn clip_to_range(&self, value: f32) -> f32 {
        if !self.clip {
            return value;
        }
        let (low, high) = self.range();
        value.clamp(low, high)
    }
}
