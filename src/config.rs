//! Pipeline configuration
//!
//! All tunables live here so that training-time and prediction-time feature
//! extraction read from the same place. Every struct deserializes with
//! defaults filled in, so a JSON file only needs the fields it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ClassifyError, Result};

// ============================================================================
// Defaults
// ============================================================================

/// Sample rate every waveform is resampled to before extraction (48kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Number of cepstral coefficients per feature vector
pub const DEFAULT_N_MFCC: usize = 40;

/// FFT window length in samples
pub const DEFAULT_N_FFT: usize = 2048;

/// Hop between successive analysis frames in samples
pub const DEFAULT_HOP_LENGTH: usize = 512;

/// Number of mel bands fed into the DCT
pub const DEFAULT_N_MELS: usize = 128;

/// Default probability threshold for a confident prediction
pub const DEFAULT_THRESHOLD: f64 = 0.5;

// ============================================================================
// Extraction
// ============================================================================

/// Parameters of the MFCC feature extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Target sample rate in Hz (default: 48000)
    pub target_sample_rate: u32,
    /// Coefficients kept per frame, and the feature vector length (default: 40)
    pub n_mfcc: usize,
    /// FFT window size in samples (default: 2048)
    pub n_fft: usize,
    /// Hop length in samples (default: 512)
    pub hop_length: usize,
    /// Mel filter count (default: 128)
    pub n_mels: usize,
    /// Lowest filter edge in Hz (default: 0)
    pub fmin: f64,
    /// Highest filter edge in Hz; `None` means Nyquist
    pub fmax: Option<f64>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        ExtractionConfig {
            target_sample_rate: DEFAULT_SAMPLE_RATE,
            n_mfcc: DEFAULT_N_MFCC,
            n_fft: DEFAULT_N_FFT,
            hop_length: DEFAULT_HOP_LENGTH,
            n_mels: DEFAULT_N_MELS,
            fmin: 0.0,
            fmax: None,
        }
    }
}

impl ExtractionConfig {
    /// Upper frequency bound actually used by the filter bank
    pub fn effective_fmax(&self) -> f64 {
        self.fmax
            .unwrap_or(self.target_sample_rate as f64 / 2.0)
    }

    /// Check that the parameters describe a usable extractor
    pub fn validate(&self) -> Result<()> {
        let nyquist = self.target_sample_rate as f64 / 2.0;

        if self.target_sample_rate == 0 {
            return Err(invalid("target_sample_rate must be positive"));
        }
        if self.n_fft < 2 {
            return Err(invalid("n_fft must be at least 2"));
        }
        if self.hop_length == 0 {
            return Err(invalid("hop_length must be positive"));
        }
        if self.n_mels == 0 || self.n_mfcc == 0 {
            return Err(invalid("n_mels and n_mfcc must be positive"));
        }
        if self.n_mfcc > self.n_mels {
            return Err(invalid(format!(
                "n_mfcc ({}) cannot exceed n_mels ({})",
                self.n_mfcc, self.n_mels
            )));
        }
        if !self.fmin.is_finite() || self.fmin < 0.0 {
            return Err(invalid("fmin must be a finite, non-negative frequency"));
        }
        let fmax = self.effective_fmax();
        if !fmax.is_finite() {
            return Err(invalid("fmax must be a finite frequency"));
        }
        if fmax <= self.fmin || fmax > nyquist {
            return Err(invalid(format!(
                "fmax ({fmax} Hz) must lie in ({} Hz, {nyquist} Hz]",
                self.fmin
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Dataset
// ============================================================================

/// Options for walking a labeled dataset directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// File extension (without dot) that marks a sample
    pub extension: String,
    /// Skip undecodable files instead of aborting the load
    pub skip_unreadable: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        DatasetConfig {
            extension: "wav".to_string(),
            skip_unreadable: false,
        }
    }
}

// ============================================================================
// Trainer
// ============================================================================

/// Split and solver settings for training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Fraction of rows held out for evaluation (default: 0.2)
    pub test_fraction: f64,
    /// Seed for the split permutation (default: 42)
    pub seed: u64,
    /// SVM soft-margin penalty (default: 1.0)
    pub c: f64,
    /// KKT violation gap at which the solver stops (default: 1e-3)
    pub tolerance: f64,
    /// Hard cap on solver iterations per class pair
    pub max_iterations: usize,
    /// Rows each label needs before a split is attempted (default: 2)
    pub min_samples_per_class: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            test_fraction: 0.2,
            seed: 42,
            c: 1.0,
            tolerance: 1e-3,
            max_iterations: 10_000_000,
            min_samples_per_class: 2,
        }
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(invalid("test_fraction must lie strictly between 0 and 1"));
        }
        if !(self.c > 0.0) {
            return Err(invalid("c must be positive"));
        }
        if !(self.tolerance > 0.0) {
            return Err(invalid("tolerance must be positive"));
        }
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations must be positive"));
        }
        Ok(())
    }
}

// ============================================================================
// Predictor
// ============================================================================

/// Confidence gate applied at prediction time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Minimum top-class probability for a match (inclusive)
    pub threshold: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        PredictorConfig {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl PredictorConfig {
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.threshold)
    }
}

/// Reject thresholds outside `[0, 1]` (and NaN)
pub fn validate_threshold(threshold: f64) -> Result<()> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(invalid(format!("threshold {threshold} must lie in [0, 1]")))
    }
}

// ============================================================================
// Aggregate
// ============================================================================

/// Complete configuration for one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub extraction: ExtractionConfig,
    pub dataset: DatasetConfig,
    pub trainer: TrainerConfig,
    pub predictor: PredictorConfig,
}

impl AppConfig {
    /// Load a configuration from a JSON file
    ///
    /// Missing fields take their defaults. The result is validated before it
    /// is returned.
    ///
    /// # Errors
    /// * `FileNotFound` - If the file does not exist
    /// * `Serialization` - If the file is not valid JSON for this schema
    /// * `InvalidConfig` - If a value is out of range
    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ClassifyError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let text = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.extraction.validate()?;
        self.trainer.validate()?;
        self.predictor.validate()?;
        if self.dataset.extension.is_empty() {
            return Err(invalid("dataset extension cannot be empty"));
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> ClassifyError {
    ClassifyError::InvalidConfig {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;
    use test_case::test_case;

    #[test]
    fn test_extraction_defaults() {
        let config = ExtractionConfig::default();
        assert_eq!(config.target_sample_rate, 48000);
        assert_eq!(config.n_mfcc, 40);
        assert_eq!(config.n_fft, 2048);
        assert_eq!(config.hop_length, 512);
        assert_eq!(config.effective_fmax(), 24000.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_extraction_rejects_more_coefficients_than_bands() {
        let config = ExtractionConfig {
            n_mfcc: 64,
            n_mels: 32,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ClassifyError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_extraction_rejects_fmax_above_nyquist() {
        let config = ExtractionConfig {
            target_sample_rate: 16000,
            fmax: Some(12000.0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test_case(f64::NAN, None ; "nan fmin")]
    #[test_case(0.0, Some(f64::NAN) ; "nan fmax")]
    #[test_case(f64::INFINITY, None ; "infinite fmin")]
    #[test_case(-10.0, None ; "negative fmin")]
    fn test_extraction_rejects_bad_frequency_bounds(fmin: f64, fmax: Option<f64>) {
        let config = ExtractionConfig {
            fmin,
            fmax,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ClassifyError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(validate_threshold(0.0).is_ok());
        assert!(validate_threshold(1.0).is_ok());
        assert!(validate_threshold(1.5).is_err());
        assert!(validate_threshold(f64::NAN).is_err());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "trainer": { "seed": 7 }, "predictor": { "threshold": 0.8 } }"#,
        )
        .unwrap();

        let config = AppConfig::from_json_file(&path).unwrap();
        assert_eq!(config.trainer.seed, 7);
        assert_eq!(config.trainer.test_fraction, 0.2);
        assert_eq!(config.predictor.threshold, 0.8);
        assert_eq!(config.extraction, ExtractionConfig::default());
        assert_eq!(config.dataset.extension, "wav");
    }

    #[test]
    fn test_invalid_json_value_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "trainer": { "test_fraction": 1.5 } }"#).unwrap();

        let result = AppConfig::from_json_file(&path);
        assert!(matches!(result, Err(ClassifyError::InvalidConfig { .. })));
    }

    #[test]
    fn test_missing_config_file() {
        let result = AppConfig::from_json_file(Path::new("/nonexistent/wavclass.json"));
        assert!(matches!(result, Err(ClassifyError::FileNotFound { .. })));
    }
}
