//! Waveform to model features and back.
//!
//! `wav2mel`: trim → STFT → mel projection → decibels → normalization.
//! `mel2wav`: undoes whichever of those stages the input's domain tag says
//! were applied, then runs Griffin-Lim.
//!
//! All derived state (FFT plans, windows, filterbank, pseudo-inverse) is
//! built in [`AudioFeatureEngine::new`] and never mutated afterwards, so one
//! engine can be shared by reference across worker threads.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::amplitude::AmplitudeScaler;
use super::griffin_lim::GriffinLim;
use super::mel::MelProjector;
use super::normalize::Normalizer;
use super::pcm;
use super::signal::{AudioSignal, MelDomain, MelSpectrogram};
use super::stft::{magnitude, SpectralTransform};
use super::trim::SilenceTrimmer;
use crate::config::AudioConfig;
use crate::error::{FeatureError, Result};

#[derive(Clone)]
pub struct AudioFeatureEngine {
    config: AudioConfig,
    transform: SpectralTransform,
    projector: MelProjector,
    scaler: AmplitudeScaler,
    normalizer: Normalizer,
    trimmer: SilenceTrimmer,
}

impl AudioFeatureEngine {
    /// Validate `config` and build every derived cache.
    pub fn new(config: AudioConfig) -> Result<Self> {
        config.validate()?;

        let transform = SpectralTransform::from_config(&config)?;
        let projector = MelProjector::from_config(&config)?;
        log::debug!(
            "built {}x{} mel filterbank over [{}, {}] Hz at {} Hz",
            projector.mel_channels(),
            projector.n_freqs(),
            config.mel_fmin,
            config.fmax(),
            config.sample_rate
        );

        Ok(Self {
            scaler: AmplitudeScaler::from_config(&config),
            normalizer: Normalizer::from_config(&config),
            trimmer: SilenceTrimmer::from_config(&config)?,
            transform,
            projector,
            config,
        })
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    pub fn transform(&self) -> &SpectralTransform {
        &self.transform
    }

    pub fn projector(&self) -> &MelProjector {
        &self.projector
    }

    pub fn scaler(&self) -> &AmplitudeScaler {
        &self.scaler
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn trimmer(&self) -> &SilenceTrimmer {
        &self.trimmer
    }

    /// Domain of [`Self::wav2mel`] output under this configuration.
    pub fn output_domain(&self) -> MelDomain {
        if !self.config.do_dynamic_range_compression {
            MelDomain::Amplitude
        } else if self.config.signal_norm {
            MelDomain::Normalized
        } else {
            MelDomain::Decibel
        }
    }

    /// Trim with the configured threshold and margins.
    pub fn trim_silence<'a>(&self, samples: &'a [f32]) -> Result<&'a [f32]> {
        self.trimmer.trim(
            samples,
            self.config.trim_silence_db,
            self.config.trim_margin_sec,
            self.config.trim_keep_sec,
        )
    }

    pub fn wav2mel(&self, signal: &AudioSignal) -> Result<MelSpectrogram> {
        if signal.sample_rate() != self.config.sample_rate {
            return Err(FeatureError::SampleRateMismatch {
                expected: self.config.sample_rate,
                actual: signal.sample_rate(),
            });
        }

        let samples = if self.config.do_trim_silence {
            self.trim_silence(signal.samples())?
        } else {
            signal.samples()
        };

        let linear = magnitude(&self.transform.forward(samples)?);
        let mut mel = self.projector.linear_to_mel(&linear)?;
        if self.config.do_dynamic_range_compression {
            mel = self.scaler.amp_to_db(&mel)?;
            if self.config.signal_norm {
                mel = self.normalizer.normalize(&mel)?;
            }
        }
        Ok(mel)
    }

    /// Griffin-Lim inversion with an entropy-seeded phase source.
    pub fn mel2wav(&self, mel: &MelSpectrogram, iterations: usize, power: f32) -> Result<AudioSignal> {
        let mut rng = StdRng::from_entropy();
        self.mel2wav_with_rng(mel, iterations, power, &mut rng)
    }

    /// [`Self::mel2wav`] with the configured iteration count and power.
    pub fn mel2wav_default(&self, mel: &MelSpectrogram) -> Result<AudioSignal> {
        self.mel2wav(
            mel,
            self.config.griffin_lim_iters,
            self.config.griffin_lim_power,
        )
    }

    pub fn mel2wav_with_rng<R: Rng + ?Sized>(
        &self,
        mel: &MelSpectrogram,
        iterations: usize,
        power: f32,
        rng: &mut R,
    ) -> Result<AudioSignal> {
        if mel.mel_channels() != self.projector.mel_channels() {
            return Err(FeatureError::ShapeMismatch {
                expected: vec![self.projector.mel_channels(), mel.frames()],
                actual: vec![mel.mel_channels(), mel.frames()],
            });
        }

        let amplitude = self.to_amplitude(mel)?;
        let linear = self.projector.mel_to_linear(&amplitude)?;
        let samples = GriffinLim::new(iterations, power).reconstruct(&self.transform, &linear, rng)?;
        Ok(AudioSignal::new(samples, self.config.sample_rate))
    }

    /// Undo normalization and log compression as far as the domain tag says.
    fn to_amplitude(&self, mel: &MelSpectrogram) -> Result<MelSpectrogram> {
        match mel.domain() {
            MelDomain::Amplitude => Ok(mel.clone()),
            MelDomain::Decibel => self.db_to_amp(mel),
            MelDomain::Normalized => self.db_to_amp(&self.normalizer.denormalize(mel)?),
        }
    }

    fn db_to_amp(&self, mel: &MelSpectrogram) -> Result<MelSpectrogram> {
        if !self.config.convert_db_to_amp {
            return Err(FeatureError::DomainMismatch {
                expected: MelDomain::Amplitude,
                actual: mel.domain(),
            });
        }
        self.scaler.db_to_amp(mel)
    }

    /// Fixed-width PCM bytes with the configured sample width and channels.
    pub fn render_pcm(&self, signal: &AudioSignal) -> Result<Vec<u8>> {
        pcm::render_pcm(signal, self.config.sample_bytes, self.config.channels)
    }
}
