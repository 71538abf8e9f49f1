//! Mel filterbank projection and its least-squares inverse.
//!
//! The filterbank uses the Slaney mel scale and Slaney area normalization:
//! every triangle is scaled by `2 / (f_high - f_low)` so that it integrates to
//! one over frequency in Hz. That scale factor carries straight into every
//! decibel value downstream, so it is fixed here and not configurable.

use nalgebra::{DMatrix, SVD};
use ndarray::Array2;

use super::signal::{MagnitudeSpectrogram, MelDomain, MelSpectrogram};
use crate::config::AudioConfig;
use crate::error::{FeatureError, Result};

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;
const SVD_MAX_ITERATIONS: usize = 10_000;

fn logstep() -> f64 {
    6.4f64.ln() / 27.0
}

/// Slaney mel scale: linear below 1 kHz, logarithmic above.
pub fn hz_to_mel(freq: f64) -> f64 {
    if freq >= MIN_LOG_HZ {
        MIN_LOG_MEL + (freq / MIN_LOG_HZ).ln() / logstep()
    } else {
        freq / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * ((mel - MIN_LOG_MEL) * logstep()).exp()
    } else {
        F_SP * mel
    }
}

/// Triangular filterbank `[mel_channels, fft_size / 2 + 1]`.
///
/// `mel_channels + 2` edge frequencies are spaced evenly in mel between
/// `fmin` and `fmax`; filter `m` rises from edge `m` to edge `m + 1` and falls
/// to edge `m + 2`, evaluated at the exact bin center frequencies.
pub fn mel_filterbank(
    sample_rate: u32,
    fft_size: usize,
    mel_channels: usize,
    fmin: f32,
    fmax: f32,
) -> Array2<f32> {
    let n_freqs = fft_size / 2 + 1;
    let fft_freqs: Vec<f64> = (0..n_freqs)
        .map(|k| k as f64 * sample_rate as f64 / fft_size as f64)
        .collect();

    let mel_min = hz_to_mel(fmin as f64);
    let mel_max = hz_to_mel(fmax as f64);
    let edges: Vec<f64> = (0..mel_channels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (mel_channels + 1) as f64))
        .collect();

    let mut filters = Array2::<f32>::zeros((mel_channels, n_freqs));
    for m in 0..mel_channels {
        let (low, center, high) = (edges[m], edges[m + 1], edges[m + 2]);
        let enorm = 2.0 / (high - low);
        for (k, &freq) in fft_freqs.iter().enumerate() {
            let rising = (freq - low) / (center - low);
            let falling = (high - freq) / (high - center);
            let weight = rising.min(falling).max(0.0);
            filters[[m, k]] = (weight * enorm) as f32;
        }
    }
    filters
}

/// Moore-Penrose pseudo-inverse, `[cols, rows]` for a `[rows, cols]` matrix.
///
/// Computed in double precision from an SVD and stored as `f32`. Singular
/// values at or below `max(rows, cols) * f32::EPSILON * sigma_max` are
/// treated as zero: directions that weak cannot be resolved once the result
/// is stored in single precision. Rank-deficient filterbanks (more low
/// channels than the bins they cover) still get a least-squares inverse.
pub fn pseudo_inverse(matrix: &Array2<f32>) -> Result<Array2<f32>> {
    let (rows, cols) = matrix.dim();
    let m64 = DMatrix::<f64>::from_fn(rows, cols, |i, j| f64::from(matrix[[i, j]]));

    let svd = SVD::try_new(m64, true, true, f64::EPSILON, SVD_MAX_ITERATIONS).ok_or_else(|| {
        FeatureError::config(format!(
            "SVD of the {}x{} mel filterbank did not converge",
            rows, cols
        ))
    })?;
    let sigma_max = svd.singular_values.max();
    let cutoff = rows.max(cols) as f64 * f64::from(f32::EPSILON) * sigma_max;
    let pinv = svd
        .pseudo_inverse(cutoff)
        .map_err(|msg| FeatureError::config(format!("mel filterbank pseudo-inverse: {}", msg)))?;

    Ok(Array2::from_shape_fn((cols, rows), |(i, j)| pinv[(i, j)] as f32))
}

/// Filterbank and pseudo-inverse, built once per configuration.
#[derive(Debug, Clone)]
pub struct MelProjector {
    filterbank: Array2<f32>,
    pseudo_inverse: Array2<f32>,
    linear_floor: f32,
}

impl MelProjector {
    pub fn new(
        sample_rate: u32,
        fft_size: usize,
        mel_channels: usize,
        fmin: f32,
        fmax: f32,
        linear_floor: f32,
    ) -> Result<Self> {
        let nyquist = sample_rate as f32 / 2.0;
        if fmax > nyquist {
            return Err(FeatureError::config(format!(
                "fmax {} exceeds Nyquist frequency {}",
                fmax, nyquist
            )));
        }
        if mel_channels == 0 || fft_size == 0 || !(fmin < fmax) {
            return Err(FeatureError::config(format!(
                "invalid filterbank: {} channels over [{}, {}] Hz with fft_size {}",
                mel_channels, fmin, fmax, fft_size
            )));
        }

        let filterbank = mel_filterbank(sample_rate, fft_size, mel_channels, fmin, fmax);
        if let Some(dead) = filterbank
            .rows()
            .into_iter()
            .position(|row| row.iter().all(|&w| w <= 0.0))
        {
            return Err(FeatureError::config(format!(
                "mel channel {} has no FFT bins ({} channels over [{}, {}] Hz with fft_size {})",
                dead, mel_channels, fmin, fmax, fft_size
            )));
        }

        let pseudo_inverse = pseudo_inverse(&filterbank)?;
        Ok(Self {
            filterbank,
            pseudo_inverse,
            linear_floor,
        })
    }

    pub fn from_config(config: &AudioConfig) -> Result<Self> {
        Self::new(
            config.sample_rate,
            config.filter_length,
            config.mel_channels,
            config.mel_fmin,
            config.fmax(),
            config.linear_floor,
        )
    }

    /// `[mel_channels, n_freqs]`.
    pub fn filterbank(&self) -> &Array2<f32> {
        &self.filterbank
    }

    /// `[n_freqs, mel_channels]`.
    pub fn pseudo_inverse(&self) -> &Array2<f32> {
        &self.pseudo_inverse
    }

    pub fn mel_channels(&self) -> usize {
        self.filterbank.nrows()
    }

    pub fn n_freqs(&self) -> usize {
        self.filterbank.ncols()
    }

    pub fn linear_to_mel(&self, magnitude: &MagnitudeSpectrogram) -> Result<MelSpectrogram> {
        if magnitude.nrows() != self.n_freqs() {
            return Err(FeatureError::ShapeMismatch {
                expected: vec![self.n_freqs(), magnitude.ncols()],
                actual: vec![magnitude.nrows(), magnitude.ncols()],
            });
        }
        Ok(MelSpectrogram::with_data(
            self.filterbank.dot(magnitude),
            MelDomain::Amplitude,
        ))
    }

    /// Least-squares linear spectrum for an amplitude-domain mel spectrogram.
    ///
    /// The projection is lossy; entries are clamped to `linear_floor` because
    /// the pseudo-inverse can produce negative magnitudes.
    pub fn mel_to_linear(&self, mel: &MelSpectrogram) -> Result<MagnitudeSpectrogram> {
        mel.expect_domain(MelDomain::Amplitude)?;
        if mel.mel_channels() != self.mel_channels() {
            return Err(FeatureError::ShapeMismatch {
                expected: vec![self.mel_channels(), mel.frames()],
                actual: vec![mel.mel_channels(), mel.frames()],
            });
        }
        let floor = self.linear_floor;
        let mut linear = self.pseudo_inverse.dot(mel.data());
        linear.mapv_inplace(|v| v.max(floor));
        Ok(linear)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn default_projector() -> MelProjector {
        MelProjector::from_config(&AudioConfig::default()).expect("default filterbank")
    }

    fn frobenius(a: &Array2<f32>) -> f32 {
        a.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    #[test]
    fn mel_scale_round_trips() {
        assert!((hz_to_mel(1000.0) - 15.0).abs() < 1e-9);
        for hz in [0.0, 250.0, 999.0, 1000.0, 4000.0, 11025.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
    }

    #[test]
    fn default_filterbank_has_no_dead_rows() {
        let projector = default_projector();
        assert_eq!(projector.filterbank().dim(), (80, 513));
        assert_eq!(projector.pseudo_inverse().dim(), (513, 80));
        for row in projector.filterbank().rows() {
            assert!(row.iter().any(|&w| w > 0.0));
            assert!(row.iter().all(|&w| w >= 0.0));
        }
    }

    #[test]
    fn nothing_above_fmax_is_weighted() {
        let projector = default_projector();
        // 8000 Hz is bin 371.5 at 22050 Hz / 1024.
        let fb = projector.filterbank();
        for k in 372..513 {
            assert!(fb.column(k).iter().all(|&w| w == 0.0), "bin {}", k);
        }
    }

    #[test]
    fn wide_filters_have_unit_area() {
        let projector = default_projector();
        let bin_hz = 22050.0 / 1024.0;
        for m in 60..80 {
            let area: f32 = projector.filterbank().row(m).sum() * bin_hz;
            assert!((area - 1.0).abs() < 0.05, "channel {} area {}", m, area);
        }
    }

    #[test]
    fn fmax_above_nyquist_fails() {
        let result = MelProjector::new(16000, 512, 40, 0.0, 8001.0, 1e-10);
        assert!(matches!(result, Err(FeatureError::Configuration(_))));
    }

    #[test]
    fn too_many_channels_for_fft_size_fails_fast() {
        let result = MelProjector::new(22050, 256, 128, 0.0, 8000.0, 1e-10);
        match result {
            Err(FeatureError::Configuration(msg)) => assert!(msg.contains("no FFT bins"), "{}", msg),
            other => panic!("expected configuration error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn pseudo_inverse_is_right_inverse() {
        let projector = default_projector();
        let product = projector.filterbank().dot(projector.pseudo_inverse());
        for ((i, j), &v) in product.indexed_iter() {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert!((v - expected).abs() < 1e-3, "({}, {}) = {}", i, j, v);
        }
    }

    #[test]
    fn rank_deficient_filterbank_still_inverts() {
        // 80 channels over 0-8 kHz on a 400-point FFT: the lowest fourteen
        // triangles share thirteen bins.
        let projector = MelProjector::new(16000, 400, 80, 0.0, 8000.0, 1e-10).unwrap();
        let fb = projector.filterbank();
        let pinv = projector.pseudo_inverse();
        assert_eq!(pinv.dim(), (201, 80));
        assert!(pinv.iter().all(|v| v.is_finite()));

        let reconstructed = fb.dot(pinv).dot(fb);
        let err = frobenius(&(&reconstructed - fb)) / frobenius(fb);
        assert!(err < 1e-4, "relative error {}", err);

        let mel = MelSpectrogram::new(Array2::from_elem((80, 4), 0.5), MelDomain::Amplitude);
        let linear = projector.mel_to_linear(&mel).unwrap();
        assert!(linear.iter().all(|&v| v.is_finite() && v >= 1e-10));
    }

    #[test]
    fn pseudo_inverse_of_a_repeated_row() {
        let m = Array2::from_shape_vec((2, 3), vec![1.0f32, 2.0, 2.0, 1.0, 2.0, 2.0]).unwrap();
        let pinv = pseudo_inverse(&m).unwrap();
        // pinv(a a^T stacked) = [a, a] / (2 |a|^2) with |a|^2 = 9.
        for (i, &a) in [1.0f32, 2.0, 2.0].iter().enumerate() {
            for j in 0..2 {
                assert!((pinv[[i, j]] - a / 18.0).abs() < 1e-6, "({}, {})", i, j);
            }
        }
    }

    #[test]
    fn row_space_spectrum_is_recovered() {
        let projector = default_projector();
        let mut rng = StdRng::seed_from_u64(7);
        let weights = Array2::from_shape_fn((80, 6), |_| rng.gen_range(0.1f32..2.0));
        let linear = projector.filterbank().t().dot(&weights);

        let mel = projector.linear_to_mel(&linear).unwrap();
        let restored = projector.mel_to_linear(&mel).unwrap();
        let err = frobenius(&(&restored - &linear)) / frobenius(&linear);
        assert!(err < 1e-3, "relative error {}", err);
    }

    #[test]
    fn random_spectrum_round_trip_is_bounded_and_mel_consistent() {
        let projector = default_projector();
        let mut rng = StdRng::seed_from_u64(11);
        let linear = Array2::from_shape_fn((513, 8), |_| rng.gen_range(0.5f32..1.5));

        let mel = projector.linear_to_mel(&linear).unwrap();
        let restored = projector.mel_to_linear(&mel).unwrap();
        assert!(restored.iter().all(|&v| v >= 1e-10));

        // Projection onto the filterbank row space never grows the error
        // past the input itself.
        let err = frobenius(&(&restored - &linear)) / frobenius(&linear);
        assert!(err < 1.0, "relative error {}", err);

        // The recovered spectrum projects back onto (almost) the same mels.
        let reprojected = projector.linear_to_mel(&restored).unwrap();
        let mel_err = frobenius(&(reprojected.data() - mel.data())) / frobenius(mel.data());
        assert!(mel_err < 0.05, "mel residual {}", mel_err);
    }

    #[test]
    fn mel_to_linear_requires_amplitude_domain() {
        let projector = default_projector();
        let mel = MelSpectrogram::new(Array2::zeros((80, 3)), MelDomain::Decibel);
        assert!(matches!(
            projector.mel_to_linear(&mel),
            Err(FeatureError::DomainMismatch { .. })
        ));
    }

    #[test]
    fn linear_to_mel_checks_bin_count() {
        let projector = default_projector();
        let wrong = Array2::<f32>::zeros((257, 3));
        assert!(matches!(
            projector.linear_to_mel(&wrong),
            Err(FeatureError::ShapeMismatch { .. })
        ));
    }
}
