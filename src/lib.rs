//! Log-mel feature extraction and Griffin-Lim inversion for text-to-speech
//! training.
//!
//! [`AudioFeatureEngine`] turns waveforms into the mel spectrograms a model
//! trains on (`wav2mel`) and turns predicted spectrograms back into audio
//! (`mel2wav`). The individual stages live in [`audio`] and can be used on
//! their own.

pub mod audio;
pub mod config;
pub mod error;

pub use audio::{AudioFeatureEngine, AudioSignal, MelDomain, MelSpectrogram};
pub use config::AudioConfig;
pub use error::{FeatureError, Result};
