//! Feature Extraction
//!
//! Turns one recording into a fixed-length vector: the per-coefficient mean
//! of its MFCC matrix. The vector length equals `n_mfcc` whatever the
//! recording's duration, so recordings of different lengths can share one
//! feature matrix.
//!
//! Pipeline per file: decode → mono → resample → centred STFT power →
//! mel bands → dB (80 dB range) → DCT-II → mean over frames.

pub mod mel;
pub mod spectrum;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audio::{load_waveform, Waveform};
use crate::config::ExtractionConfig;
use crate::error::{ClassifyError, Result};

use mel::MelFilterBank;
use spectrum::{power_to_db, Dct, Stft};

/// Fixed-length numeric summary of one recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        FeatureVector(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        FeatureVector(values)
    }
}

/// MFCC-mean feature extractor
///
/// Holds the precomputed window, FFT plan, filter bank and DCT basis for one
/// [`ExtractionConfig`]. Extraction takes `&self`, so one extractor can be
/// shared across threads.
pub struct FeatureExtractor {
    config: ExtractionConfig,
    stft: Stft,
    mel_bank: MelFilterBank,
    dct: Dct,
}

impl std::fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FeatureExtractor {
    /// Create an extractor for `config`
    ///
    /// # Errors
    /// * `InvalidConfig` - If the configuration fails validation
    pub fn new(config: ExtractionConfig) -> Result<Self> {
        config.validate()?;

        let stft = Stft::new(config.n_fft, config.hop_length);
        let mel_bank = MelFilterBank::new(
            config.target_sample_rate,
            config.n_fft,
            config.n_mels,
            config.fmin,
            config.effective_fmax(),
        );
        let dct = Dct::new(config.n_mels, config.n_mfcc);

        Ok(FeatureExtractor {
            config,
            stft,
            mel_bank,
            dct,
        })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Length of every vector this extractor produces
    pub fn dimension(&self) -> usize {
        self.config.n_mfcc
    }

    /// Decode `path` and extract its feature vector
    ///
    /// # Errors
    /// * `FileNotFound` - If the file does not exist
    /// * `Decode` - If the file is not valid audio or holds no samples
    pub fn extract_file(&self, path: &Path) -> Result<FeatureVector> {
        let waveform = load_waveform(path, self.config.target_sample_rate)?;

        let features = self.extract_waveform(&waveform).map_err(|e| match e {
            ClassifyError::EmptyAudio => ClassifyError::Decode {
                path: path.to_path_buf(),
                reason: "audio contains no samples".to_string(),
                source: None,
            },
            other => other,
        })?;

        debug!(
            path = %path.display(),
            duration_secs = waveform.duration_secs(),
            "extracted features"
        );
        Ok(features)
    }

    /// Extract the feature vector of an in-memory waveform
    ///
    /// Waveforms at another rate are resampled first.
    ///
    /// # Errors
    /// * `EmptyAudio` - If the waveform has no samples
    pub fn extract_waveform(&self, waveform: &Waveform) -> Result<FeatureVector> {
        if waveform.is_empty() {
            return Err(ClassifyError::EmptyAudio);
        }

        let frames = if waveform.sample_rate() == self.config.target_sample_rate {
            self.mfcc(waveform.samples())
        } else {
            let resampled = waveform.clone().resampled(self.config.target_sample_rate);
            self.mfcc(resampled.samples())
        };

        let n_frames = frames.len() as f64;
        let mut mean = vec![0.0; self.config.n_mfcc];
        for frame in &frames {
            for (acc, &c) in mean.iter_mut().zip(frame) {
                *acc += c;
            }
        }
        for value in &mut mean {
            *value /= n_frames;
        }

        Ok(FeatureVector(mean))
    }

    /// MFCC matrix of `samples`, one row of `n_mfcc` coefficients per frame
    ///
    /// `samples` must already be at the target sample rate.
    pub fn mfcc(&self, samples: &[f32]) -> Vec<Vec<f64>> {
        let n_mels = self.config.n_mels;

        // The dB floor depends on the loudest cell, so all mel frames are
        // needed before any of them can be compressed.
        let mut mel_frames = Vec::new();
        let mut energies = vec![0.0; n_mels];
        self.stft.for_each_power_frame(samples, |power| {
            self.mel_bank.apply(power, &mut energies);
            mel_frames.extend_from_slice(&energies);
        });

        power_to_db(&mut mel_frames);

        mel_frames
            .chunks_exact(n_mels)
            .map(|bands| {
                let mut coeffs = vec![0.0; self.config.n_mfcc];
                self.dct.transform(bands, &mut coeffs);
                coeffs
            })
            .collect()
    }
}
