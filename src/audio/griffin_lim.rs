//! Griffin-Lim phase reconstruction.
//!
//! Starts from uniformly random phase and alternates synthesis and
//! re-analysis, keeping the target magnitude and the latest phase estimate.
//! There is no convergence test; the loop always runs the full budget. The
//! caller supplies the random source, so seeding it makes the output
//! reproducible.

use ndarray::Zip;
use rand::Rng;
use realfft::num_complex::Complex32;
use std::f32::consts::TAU;

use super::signal::MagnitudeSpectrogram;
use super::stft::SpectralTransform;
use crate::error::{FeatureError, Result};

pub const DEFAULT_ITERATIONS: usize = 60;
pub const DEFAULT_POWER: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GriffinLim {
    iterations: usize,
    power: f32,
}

impl Default for GriffinLim {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS, DEFAULT_POWER)
    }
}

impl GriffinLim {
    /// `power` is applied to the magnitudes once, before the first pass.
    pub fn new(iterations: usize, power: f32) -> Self {
        Self { iterations, power }
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn power(&self) -> f32 {
        self.power
    }

    pub fn reconstruct<R: Rng + ?Sized>(
        &self,
        transform: &SpectralTransform,
        magnitude: &MagnitudeSpectrogram,
        rng: &mut R,
    ) -> Result<Vec<f32>> {
        let frames = magnitude.ncols();
        if frames < 2 {
            return Err(FeatureError::InsufficientFrames {
                required: 2,
                actual: frames,
            });
        }
        log::debug!(
            "griffin-lim: {} iterations over {} frames",
            self.iterations,
            frames
        );

        let power = self.power;
        let target = if power == 1.0 {
            magnitude.mapv(|m| m.max(0.0))
        } else {
            magnitude.mapv(|m| m.max(0.0).powf(power))
        };

        let mut spectrum = target.mapv(|m| Complex32::from_polar(m, rng.gen_range(0.0..TAU)));
        let mut audio = transform.inverse(&spectrum)?;

        for _ in 0..self.iterations {
            let estimate = transform.analyze(&audio)?;
            if estimate.dim() != target.dim() {
                return Err(FeatureError::ShapeMismatch {
                    expected: vec![target.nrows(), target.ncols()],
                    actual: vec![estimate.nrows(), estimate.ncols()],
                });
            }
            Zip::from(&mut spectrum)
                .and(&target)
                .and(&estimate)
                .for_each(|bin, &m, &e| {
                    let norm = e.norm();
                    *bin = if norm > 0.0 {
                        e * (m / norm)
                    } else {
                        Complex32::new(m, 0.0)
                    };
                });
            audio = transform.inverse(&spectrum)?;
        }

        Ok(audio)
    }
}
