//! Error types for feature extraction and waveform reconstruction.

use crate::audio::MelDomain;
use thiserror::Error;

/// Result type for feature operations.
pub type Result<T> = std::result::Result<T, FeatureError>;

/// Error type for feature operations.
#[derive(Error, Debug)]
pub enum FeatureError {
    /// Invalid configuration, detected when the engine is built.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Signal too short for the requested operation.
    #[error("Insufficient samples: need at least {required}, got {actual}")]
    InsufficientSamples {
        /// Minimum number of samples.
        required: usize,
        /// Number of samples supplied.
        actual: usize,
    },

    /// Spectrogram with too few frames to synthesize audio from.
    #[error("Insufficient frames: need at least {required}, got {actual}")]
    InsufficientFrames {
        /// Minimum number of frames.
        required: usize,
        /// Number of frames supplied.
        actual: usize,
    },

    /// No frame rises above the silence threshold.
    #[error("Silence trim failed: {0}")]
    SilenceTrim(String),

    /// Spectrogram tagged with a different domain than the operation expects.
    #[error("Domain mismatch: expected {expected:?} spectrogram, got {actual:?}")]
    DomainMismatch {
        /// Domain the operation accepts.
        expected: MelDomain,
        /// Domain of the supplied spectrogram.
        actual: MelDomain,
    },

    /// Shape mismatch error.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        actual: Vec<usize>,
    },

    /// Signal recorded at a different rate than the engine was built for.
    #[error("Sample rate mismatch: engine expects {expected} Hz, signal is {actual} Hz")]
    SampleRateMismatch {
        /// Configured sample rate.
        expected: u32,
        /// Sample rate of the supplied signal.
        actual: u32,
    },

    /// PCM encoding or decoding error.
    #[error("PCM error: {0}")]
    Pcm(String),

    /// FFT buffer error.
    #[error("FFT error: {0}")]
    Fft(#[from] realfft::FftError),

    /// Array construction error.
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FeatureError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        FeatureError::Configuration(msg.into())
    }
}
