//! Persisted audio configuration.
//!
//! Field names and defaults follow the training configuration files the
//! feature engine is paired with, so an existing `config.json` can be read
//! as-is. The audio section lives under the top-level `"audio"` key of those
//! files; everything else in them belongs to the model and trainer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{FeatureError, Result};

/// Key of the audio section inside a training configuration file.
pub const AUDIO_SECTION: &str = "audio";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// FFT size in samples.
    pub filter_length: usize,
    pub hop_length: usize,
    pub win_length: usize,
    pub mel_channels: usize,
    pub sample_rate: u32,
    /// Bytes per PCM sample when rendering audio.
    pub sample_bytes: u16,
    /// Channel count when rendering audio.
    pub channels: u16,
    pub mel_fmin: f32,
    /// Upper filterbank edge; `None` means Nyquist.
    pub mel_fmax: Option<f32>,
    pub ref_level_db: f32,
    pub spec_gain: f32,

    // Normalization
    pub signal_norm: bool,
    pub min_level_db: f32,
    pub max_norm: f32,
    pub clip_norm: bool,
    pub symmetric_norm: bool,
    pub do_dynamic_range_compression: bool,
    pub convert_db_to_amp: bool,

    // Silence trimming
    pub do_trim_silence: bool,
    pub trim_silence_db: f32,
    pub trim_margin_sec: f64,
    pub trim_keep_sec: f64,

    /// Amplitude floor applied before taking the log.
    pub amp_floor: f32,
    /// Floor applied after the pseudo-inverse mel projection.
    pub linear_floor: f32,

    // Griffin-Lim
    pub griffin_lim_iters: usize,
    pub griffin_lim_power: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            filter_length: 1024,
            hop_length: 256,
            win_length: 1024,
            mel_channels: 80,
            sample_rate: 22050,
            sample_bytes: 2,
            channels: 1,
            mel_fmin: 0.0,
            mel_fmax: Some(8000.0),
            ref_level_db: 20.0,
            spec_gain: 1.0,
            signal_norm: true,
            min_level_db: -100.0,
            max_norm: 1.0,
            clip_norm: true,
            symmetric_norm: true,
            do_dynamic_range_compression: true,
            convert_db_to_amp: true,
            do_trim_silence: false,
            trim_silence_db: 60.0,
            trim_margin_sec: 0.01,
            trim_keep_sec: 0.1,
            amp_floor: 1e-5,
            linear_floor: 1e-10,
            griffin_lim_iters: 60,
            griffin_lim_power: 1.0,
        }
    }
}

impl AudioConfig {
    /// Number of non-redundant FFT bins.
    pub fn n_freqs(&self) -> usize {
        self.filter_length / 2 + 1
    }

    pub fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    /// Upper filterbank edge with the Nyquist default applied.
    pub fn fmax(&self) -> f32 {
        self.mel_fmax.unwrap_or_else(|| self.nyquist())
    }

    /// Check every invariant that must hold before caches are derived.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(FeatureError::config("sample_rate must be positive"));
        }
        if self.filter_length == 0 || self.hop_length == 0 || self.win_length == 0 {
            return Err(FeatureError::config(format!(
                "filter_length, win_length and hop_length must be positive (got {}, {}, {})",
                self.filter_length, self.win_length, self.hop_length
            )));
        }
        if self.hop_length > self.win_length || self.win_length > self.filter_length {
            return Err(FeatureError::config(format!(
                "expected hop_length <= win_length <= filter_length, got {} / {} / {}",
                self.hop_length, self.win_length, self.filter_length
            )));
        }
        if self.mel_channels == 0 {
            return Err(FeatureError::config("mel_channels must be positive"));
        }

        let fmax = self.fmax();
        if !fmax.is_finite() || fmax > self.nyquist() {
            return Err(FeatureError::config(format!(
                "mel_fmax {} exceeds Nyquist frequency {}",
                fmax,
                self.nyquist()
            )));
        }
        if !self.mel_fmin.is_finite() || self.mel_fmin < 0.0 || self.mel_fmin >= fmax {
            return Err(FeatureError::config(format!(
                "mel_fmin must lie in [0, {}), got {}",
                fmax, self.mel_fmin
            )));
        }

        if !self.spec_gain.is_finite() || self.spec_gain == 0.0 {
            return Err(FeatureError::config(format!(
                "spec_gain must be finite and non-zero, got {}",
                self.spec_gain
            )));
        }
        if !(self.amp_floor > 0.0) || !(self.linear_floor > 0.0) {
            return Err(FeatureError::config(format!(
                "amp_floor and linear_floor must be positive (got {}, {})",
                self.amp_floor, self.linear_floor
            )));
        }
        if !self.ref_level_db.is_finite() {
            return Err(FeatureError::config(format!(
                "ref_level_db must be finite, got {}",
                self.ref_level_db
            )));
        }
        if !self.min_level_db.is_finite() || !(self.min_level_db < 0.0) {
            return Err(FeatureError::config(format!(
                "min_level_db must be negative, got {}",
                self.min_level_db
            )));
        }
        if !(self.max_norm > 0.0) || !self.max_norm.is_finite() {
            return Err(FeatureError::config(format!(
                "max_norm must be positive, got {}",
                self.max_norm
            )));
        }
        if self.signal_norm && !self.do_dynamic_range_compression {
            return Err(FeatureError::config(
                "signal_norm requires do_dynamic_range_compression",
            ));
        }

        if !(self.trim_silence_db > 0.0)
            || !(self.trim_margin_sec >= 0.0)
            || !(self.trim_keep_sec >= 0.0)
        {
            return Err(FeatureError::config(format!(
                "trim settings must be non-negative with a positive threshold (db={}, margin={}, keep={})",
                self.trim_silence_db, self.trim_margin_sec, self.trim_keep_sec
            )));
        }

        if !(1..=4).contains(&self.sample_bytes) {
            return Err(FeatureError::config(format!(
                "sample_bytes must be 1-4, got {}",
                self.sample_bytes
            )));
        }
        if self.channels == 0 {
            return Err(FeatureError::config("channels must be at least 1"));
        }
        if !self.griffin_lim_power.is_finite() || !(self.griffin_lim_power > 0.0) {
            return Err(FeatureError::config(format!(
                "griffin_lim_power must be positive, got {}",
                self.griffin_lim_power
            )));
        }

        Ok(())
    }

    /// Parse a bare audio section.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load the audio section of a training configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_and_merge(Self::default(), [path])
    }

    /// Write this config as the audio section of a configuration file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut root = serde_json::Map::new();
        root.insert(AUDIO_SECTION.to_string(), serde_json::to_value(self)?);

        let mut writer = BufWriter::new(File::create(path)?);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
        Value::Object(root).serialize(&mut ser)?;
        writer.flush()?;
        Ok(())
    }

    /// Overlay one or more configuration files on top of `base`.
    ///
    /// Each file's `"audio"` object is merged recursively into the running
    /// result, so later files only need to name the fields they change.
    pub fn load_and_merge<I, P>(base: Self, paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut merged = serde_json::to_value(&base)?;
        for path in paths {
            let path = path.as_ref();
            let reader = BufReader::new(File::open(path)?);
            let file_value: Value = serde_json::from_reader(reader)?;
            match file_value.get(AUDIO_SECTION) {
                Some(audio) => recursive_update(&mut merged, audio),
                None => log::debug!("{} has no audio section, skipping", path.display()),
            }
        }
        Ok(serde_json::from_value(merged)?)
    }
}

/// Overwrite values in `base` with values from `overlay`, descending into
/// objects present on both sides.
pub fn recursive_update(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                let nested = value.is_object() && base_map.get(key).is_some_and(Value::is_object);
                if nested {
                    if let Some(existing) = base_map.get_mut(key) {
                        recursive_update(existing, value);
                    }
                } else {
                    base_map.insert(key.clone(), value.clone());
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_config_is_valid() {
        AudioConfig::default().validate().expect("defaults should validate");
    }

    #[test]
    fn fmax_above_nyquist_is_rejected() {
        let config = AudioConfig {
            mel_fmax: Some(12000.0),
            ..AudioConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(FeatureError::Configuration(_))
        ));
    }

    #[test]
    fn missing_fmax_means_nyquist() {
        let config = AudioConfig {
            mel_fmax: None,
            ..AudioConfig::default()
        };
        assert_eq!(config.fmax(), 11025.0);
        config.validate().expect("nyquist fmax is allowed");
    }

    #[test]
    fn frame_size_ordering_is_enforced() {
        let hop_too_big = AudioConfig {
            hop_length: 2048,
            ..AudioConfig::default()
        };
        assert!(hop_too_big.validate().is_err());

        let window_too_big = AudioConfig {
            win_length: 2048,
            ..AudioConfig::default()
        };
        assert!(window_too_big.validate().is_err());
    }

    #[test]
    fn level_errors_name_the_offending_field() {
        let config = AudioConfig {
            ref_level_db: f32::NAN,
            ..AudioConfig::default()
        };
        match config.validate() {
            Err(FeatureError::Configuration(msg)) => assert!(msg.contains("ref_level_db"), "{}", msg),
            other => panic!("expected configuration error, got {:?}", other),
        }

        let config = AudioConfig {
            min_level_db: 10.0,
            ..AudioConfig::default()
        };
        match config.validate() {
            Err(FeatureError::Configuration(msg)) => assert!(msg.contains("min_level_db"), "{}", msg),
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn normalization_without_compression_is_rejected() {
        let config = AudioConfig {
            do_dynamic_range_compression: false,
            ..AudioConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AudioConfig {
            do_dynamic_range_compression: false,
            signal_norm: false,
            ..AudioConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = AudioConfig::from_json_str(r#"{"mel_channels": 64, "mel_fmax": null}"#)
            .expect("parse partial config");
        assert_eq!(config.mel_channels, 64);
        assert_eq!(config.mel_fmax, None);
        assert_eq!(config.hop_length, 256);
    }

    #[test]
    fn recursive_update_merges_nested_objects() {
        let mut base = json!({"audio": {"hop_length": 256, "win_length": 1024}, "seed": 1});
        recursive_update(&mut base, &json!({"audio": {"hop_length": 128}, "seed": 7}));
        assert_eq!(
            base,
            json!({"audio": {"hop_length": 128, "win_length": 1024}, "seed": 7})
        );
    }

    #[test]
    fn recursive_update_replaces_non_objects() {
        let mut base = json!({"mel_fmax": 8000.0});
        recursive_update(&mut base, &json!({"mel_fmax": null}));
        assert_eq!(base, json!({"mel_fmax": null}));
    }
}
