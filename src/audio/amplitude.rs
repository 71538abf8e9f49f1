//! Linear amplitude to and from decibels.

use super::signal::{MelDomain, MelSpectrogram};
use crate::config::AudioConfig;
use crate::error::Result;

/// Linear amplitude to and from `gain * log10(amplitude)`.
///
/// Amplitudes below `floor` are raised to it before the log, so anything
/// quieter than the floor comes back as exactly the floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmplitudeScaler {
    gain: f32,
    floor: f32,
}

impl AmplitudeScaler {
    pub fn new(gain: f32, floor: f32) -> Self {
        Self { gain, floor }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(config.spec_gain, config.amp_floor)
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn floor(&self) -> f32 {
        self.floor
    }

    pub fn amp_to_db_value(&self, amplitude: f32) -> f32 {
        self.gain * amplitude.max(self.floor).log10()
    }

    pub fn db_to_amp_value(&self, db: f32) -> f32 {
        10f32.powf(db / self.gain)
    }

    pub fn amp_to_db(&self, mel: &MelSpectrogram) -> Result<MelSpectrogram> {
        mel.expect_domain(MelDomain::Amplitude)?;
        let data = mel.data().mapv(|a| self.amp_to_db_value(a));
        Ok(MelSpectrogram::with_data(data, MelDomain::Decibel))
    }

    pub fn db_to_amp(&self, mel: &MelSpectrogram) -> Result<MelSpectrogram> {
        mel.expect_domain(MelDomain::Decibel)?;
        let data = mel.data().mapv(|db| self.db_to_amp_value(db));
        Ok(MelSpectrogram::with_data(data, MelDomain::Amplitude))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeatureError;
    use ndarray::Array2;

    #[test]
    fn round_trip_above_floor() {
        for gain in [1.0f32, 20.0] {
            let scaler = AmplitudeScaler::new(gain, 1e-5);
            for amp in [1e-4f32, 0.01, 0.5, 1.0, 3.0, 250.0] {
                let restored = scaler.db_to_amp_value(scaler.amp_to_db_value(amp));
                assert!(
                    ((restored - amp) / amp).abs() < 1e-4,
                    "gain {} amp {} -> {}",
                    gain,
                    amp,
                    restored
                );
            }
        }
    }

    #[test]
    fn values_below_floor_collapse_to_floor() {
        let scaler = AmplitudeScaler::new(20.0, 1e-5);
        assert!((scaler.amp_to_db_value(0.0) - (-100.0)).abs() < 1e-4);
        assert_eq!(scaler.amp_to_db_value(1e-9), scaler.amp_to_db_value(1e-5));
        let restored = scaler.db_to_amp_value(scaler.amp_to_db_value(1e-9));
        assert!((restored - 1e-5).abs() < 1e-9);
    }

    #[test]
    fn spectrogram_conversion_tracks_domain() {
        let scaler = AmplitudeScaler::new(1.0, 1e-5);
        let amp = MelSpectrogram::new(Array2::from_elem((2, 2), 10.0), MelDomain::Amplitude);
        let db = scaler.amp_to_db(&amp).unwrap();
        assert_eq!(db.domain(), MelDomain::Decibel);
        assert!(db.data().iter().all(|&v| (v - 1.0).abs() < 1e-6));

        assert!(matches!(
            scaler.amp_to_db(&db),
            Err(FeatureError::DomainMismatch { .. })
        ));
        let back = scaler.db_to_amp(&db).unwrap();
        assert_eq!(back.domain(), MelDomain::Amplitude);
    }
}
