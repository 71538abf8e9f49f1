pub mod amplitude;
pub mod batch;
pub mod engine;
pub mod griffin_lim;
pub mod mel;
pub mod normalize;
pub mod pcm;
pub mod signal;
pub mod stft;
pub mod trim;

pub use amplitude::AmplitudeScaler;
pub use batch::{wav2mel_batch, wav2mel_batch_ok};
pub use engine::AudioFeatureEngine;
pub use griffin_lim::GriffinLim;
pub use mel::{mel_filterbank, pseudo_inverse, MelProjector};
pub use normalize::{NormMode, Normalizer};
pub use pcm::{decode_pcm, render_pcm};
pub use signal::{AudioSignal, MagnitudeSpectrogram, MelDomain, MelSpectrogram, SpectralFrames};
pub use stft::{magnitude, SpectralTransform};
pub use trim::SilenceTrimmer;
