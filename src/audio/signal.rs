use ndarray::Array2;
use realfft::num_complex::Complex32;
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};

/// Complex STFT output, `[fft_size / 2 + 1, frames]`.
pub type SpectralFrames = Array2<Complex32>;

/// Non-negative magnitudes, same shape as [`SpectralFrames`].
pub type MagnitudeSpectrogram = Array2<f32>;

/// Mono audio with its sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSignal {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioSignal {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Which scale the values of a [`MelSpectrogram`] are on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MelDomain {
    /// Linear filterbank energies.
    Amplitude,
    /// `gain * log10(amplitude)`.
    Decibel,
    /// Decibels rescaled into the model's bounded range.
    Normalized,
}

/// Mel spectrogram `[mel_channels, frames]` tagged with its domain.
#[derive(Debug, Clone, PartialEq)]
pub struct MelSpectrogram {
    data: Array2<f32>,
    domain: MelDomain,
}

impl MelSpectrogram {
    /// Wrap a matrix whose domain the caller vouches for, e.g. model output.
    pub fn new(data: Array2<f32>, domain: MelDomain) -> Self {
        Self { data, domain }
    }

    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn into_data(self) -> Array2<f32> {
        self.data
    }

    pub fn domain(&self) -> MelDomain {
        self.domain
    }

    pub fn mel_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn frames(&self) -> usize {
        self.data.ncols()
    }

    /// `(mel_channels, frames)`.
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Fail unless this spectrogram is in `expected`.
    pub fn expect_domain(&self, expected: MelDomain) -> Result<()> {
        if self.domain != expected {
            return Err(FeatureError::DomainMismatch {
                expected,
                actual: self.domain,
            });
        }
        Ok(())
    }

    /// Same tag, new values.
    pub(crate) fn with_data(data: Array2<f32>, domain: MelDomain) -> Self {
        Self { data, domain }
    }

    /// Row-major `[mel, frame]` copy, the layout model tensors are built from.
    pub fn to_row_major_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }
}
