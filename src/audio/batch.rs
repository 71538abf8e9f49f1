//! Parallel feature extraction over many utterances.

use rayon::prelude::*;

use super::engine::AudioFeatureEngine;
use super::signal::{AudioSignal, MelSpectrogram};
use crate::error::Result;

/// One result per input, in input order.
pub fn wav2mel_batch(engine: &AudioFeatureEngine, signals: &[AudioSignal]) -> Vec<Result<MelSpectrogram>> {
    signals.par_iter().map(|signal| engine.wav2mel(signal)).collect()
}

/// Features for every utterance that succeeds, paired with its input index.
///
/// Failures are logged and dropped.
pub fn wav2mel_batch_ok(engine: &AudioFeatureEngine, signals: &[AudioSignal]) -> Vec<(usize, MelSpectrogram)> {
    signals
        .par_iter()
        .enumerate()
        .filter_map(|(index, signal)| match engine.wav2mel(signal) {
            Ok(mel) => Some((index, mel)),
            Err(err) => {
                log::warn!("skipping utterance {}: {}", index, err);
                None
            }
        })
        .collect()
}
