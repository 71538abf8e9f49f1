//! Short-time Fourier transform and its overlap-add inverse.
//!
//! Frames are centered: the signal is reflect-padded by `fft_size / 2` on
//! both sides before framing, so a signal of `L` samples yields
//! `(L + 2 * (fft_size / 2) - fft_size) / hop_length + 1` frames, which is
//! `L / hop_length + 1` for an even `fft_size`. The inverse removes the same
//! padding and returns `hop_length * (frames - 1)` samples (one more when
//! `fft_size` is odd), so `inverse(forward(x))` is `x` cut down to a whole
//! number of hops.

use ndarray::Array2;
use rayon::prelude::*;
use realfft::num_complex::Complex32;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::f32::consts::PI;
use std::sync::Arc;

use super::signal::{MagnitudeSpectrogram, SpectralFrames};
use crate::config::AudioConfig;
use crate::error::{FeatureError, Result};

#[derive(Clone)]
pub struct SpectralTransform {
    fft_size: usize,
    hop_length: usize,
    win_length: usize,
    /// Hann window of `win_length`, zero-padded to `fft_size`.
    window: Vec<f32>,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
}

struct AnalysisWorkspace {
    input: Vec<f32>,
    scratch: Vec<Complex32>,
}

struct SynthesisWorkspace {
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl SpectralTransform {
    pub fn new(fft_size: usize, hop_length: usize, win_length: usize) -> Result<Self> {
        if fft_size == 0 || hop_length == 0 || win_length == 0 {
            return Err(FeatureError::config(
                "fft_size, hop_length and win_length must be positive",
            ));
        }
        if hop_length > win_length || win_length > fft_size {
            return Err(FeatureError::config(format!(
                "expected hop_length <= win_length <= fft_size, got {} / {} / {}",
                hop_length, win_length, fft_size
            )));
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);
        let window = pad_center(&hann_window(win_length), fft_size);

        Ok(Self {
            fft_size,
            hop_length,
            win_length,
            window,
            forward,
            inverse,
        })
    }

    pub fn from_config(config: &AudioConfig) -> Result<Self> {
        Self::new(config.filter_length, config.hop_length, config.win_length)
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    pub fn win_length(&self) -> usize {
        self.win_length
    }

    pub fn n_freqs(&self) -> usize {
        self.fft_size / 2 + 1
    }

    pub fn window(&self) -> &[f32] {
        &self.window
    }

    /// Frames produced for a signal of `len` samples.
    pub fn frame_count(&self, len: usize) -> usize {
        let pad = self.fft_size / 2;
        (len + 2 * pad).saturating_sub(self.fft_size) / self.hop_length + 1
    }

    /// Samples produced by [`Self::inverse`] for `frames` frames.
    pub fn output_len(&self, frames: usize) -> usize {
        if frames == 0 {
            return 0;
        }
        self.hop_length * (frames - 1) + self.fft_size % 2
    }

    /// Windowed STFT of `signal`, `[fft_size / 2 + 1, frames]`.
    pub fn forward(&self, signal: &[f32]) -> Result<SpectralFrames> {
        if signal.len() < self.win_length {
            return Err(FeatureError::InsufficientSamples {
                required: self.win_length,
                actual: signal.len(),
            });
        }
        self.analyze(signal)
    }

    /// Forward transform without the `win_length` floor. Griffin-Lim
    /// re-analyzes its own synthesis output, which may be shorter than one
    /// window for very short spectrograms.
    pub(crate) fn analyze(&self, signal: &[f32]) -> Result<SpectralFrames> {
        if signal.is_empty() {
            return Err(FeatureError::InsufficientSamples {
                required: 1,
                actual: 0,
            });
        }

        let padded = reflect_pad(signal, self.fft_size / 2);
        let n_frames = self.frame_count(signal.len());
        let n_freqs = self.n_freqs();
        let hop = self.hop_length;

        let mut flat = vec![Complex32::default(); n_frames * n_freqs];
        flat.par_chunks_mut(n_freqs).enumerate().try_for_each_init(
            || AnalysisWorkspace {
                input: self.forward.make_input_vec(),
                scratch: self.forward.make_scratch_vec(),
            },
            |workspace, (frame_index, spectrum)| -> Result<()> {
                let start = frame_index * hop;
                let frame = &padded[start..start + self.fft_size];
                for ((dst, &sample), &w) in workspace.input.iter_mut().zip(frame).zip(&self.window)
                {
                    *dst = sample * w;
                }
                self.forward
                    .process_with_scratch(&mut workspace.input, spectrum, &mut workspace.scratch)?;
                Ok(())
            },
        )?;

        // Built frame-major, handed back bin-major.
        Ok(Array2::from_shape_vec((n_frames, n_freqs), flat)?.reversed_axes())
    }

    /// Overlap-add synthesis of `frames`.
    pub fn inverse(&self, frames: &SpectralFrames) -> Result<Vec<f32>> {
        let n_freqs = self.n_freqs();
        let (bins, n_frames) = frames.dim();
        if bins != n_freqs {
            return Err(FeatureError::ShapeMismatch {
                expected: vec![n_freqs, n_frames],
                actual: vec![bins, n_frames],
            });
        }
        if n_frames == 0 {
            return Err(FeatureError::InsufficientFrames {
                required: 1,
                actual: 0,
            });
        }

        let fft_size = self.fft_size;
        let scale = 1.0 / fft_size as f32;
        let even = fft_size % 2 == 0;

        let mut segments = vec![0.0f32; n_frames * fft_size];
        segments.par_chunks_mut(fft_size).enumerate().try_for_each_init(
            || SynthesisWorkspace {
                spectrum: self.inverse.make_input_vec(),
                scratch: self.inverse.make_scratch_vec(),
            },
            |workspace, (frame_index, segment)| -> Result<()> {
                for (dst, &bin) in workspace.spectrum.iter_mut().zip(frames.column(frame_index)) {
                    *dst = bin;
                }
                // A real signal has purely real DC and Nyquist bins.
                workspace.spectrum[0].im = 0.0;
                if even {
                    workspace.spectrum[n_freqs - 1].im = 0.0;
                }
                self.inverse.process_with_scratch(
                    &mut workspace.spectrum,
                    segment,
                    &mut workspace.scratch,
                )?;
                for (sample, &w) in segment.iter_mut().zip(&self.window) {
                    *sample *= w * scale;
                }
                Ok(())
            },
        )?;

        let total = fft_size + self.hop_length * (n_frames - 1);
        let mut output = vec![0.0f32; total];
        let mut envelope = vec![0.0f32; total];
        for (frame_index, segment) in segments.chunks_exact(fft_size).enumerate() {
            let start = frame_index * self.hop_length;
            let out = &mut output[start..start + fft_size];
            let env = &mut envelope[start..start + fft_size];
            for i in 0..fft_size {
                out[i] += segment[i];
                env[i] += self.window[i] * self.window[i];
            }
        }

        for (sample, &env) in output.iter_mut().zip(&envelope) {
            if env > f32::MIN_POSITIVE {
                *sample /= env;
            }
        }

        let pad = fft_size / 2;
        let end = total - pad;
        output.truncate(end);
        output.drain(..pad);
        Ok(output)
    }
}

/// Element-wise magnitude of an STFT.
pub fn magnitude(frames: &SpectralFrames) -> MagnitudeSpectrogram {
    frames.mapv(|bin| bin.norm())
}

/// Periodic Hann window.
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let angle = 2.0 * PI * i as f32 / size as f32;
            0.5 * (1.0 - angle.cos())
        })
        .collect()
}

fn pad_center(window: &[f32], size: usize) -> Vec<f32> {
    let left = (size - window.len()) / 2;
    let mut padded = vec![0.0f32; size];
    padded[left..left + window.len()].copy_from_slice(window);
    padded
}

/// Mirror `signal` outward by `pad` samples on each side without repeating
/// the edge sample. Pads longer than the signal keep reflecting.
pub fn reflect_pad(signal: &[f32], pad: usize) -> Vec<f32> {
    let len = signal.len() as isize;
    let pad = pad as isize;
    (-pad..len + pad)
        .map(|i| signal[reflect_index(i, len)])
        .collect()
}

fn reflect_index(i: isize, len: isize) -> usize {
    if len <= 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let mut m = i.rem_euclid(period);
    if m >= len {
        m = period - m;
    }
    m as usize
}
