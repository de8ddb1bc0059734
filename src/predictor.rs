//! Predictor
//!
//! Threshold-gated inference with a [`TrainedModel`]. A prediction whose top
//! class probability falls below the threshold comes back as
//! [`Prediction::NoConfidentMatch`], which is an ordinary outcome and not an
//! error.

use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::config::validate_threshold;
use crate::error::{ClassifyError, Result};
use crate::features::{FeatureExtractor, FeatureVector};
use crate::model::{ClassProbabilities, TrainedModel};

/// Outcome of one prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Prediction {
    /// Top probability reached the threshold
    Match {
        label: String,
        probabilities: ClassProbabilities,
    },
    /// Top probability fell below the threshold
    NoConfidentMatch { probabilities: ClassProbabilities },
}

impl Prediction {
    pub fn label(&self) -> Option<&str> {
        match self {
            Prediction::Match { label, .. } => Some(label),
            Prediction::NoConfidentMatch { .. } => None,
        }
    }

    pub fn probabilities(&self) -> &ClassProbabilities {
        match self {
            Prediction::Match { probabilities, .. }
            | Prediction::NoConfidentMatch { probabilities } => probabilities,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Prediction::Match { .. })
    }
}

/// Predicts labels for new recordings with a fitted model
///
/// The extractor is built from the model's own extraction parameters, so
/// prediction always computes features the way training did.
#[derive(Debug)]
pub struct Predictor<'a> {
    model: &'a TrainedModel,
    extractor: FeatureExtractor,
}

impl<'a> Predictor<'a> {
    /// # Errors
    /// * `InvalidConfig` - If the model's extraction parameters are invalid
    pub fn new(model: &'a TrainedModel) -> Result<Self> {
        let extractor = FeatureExtractor::new(model.extraction_config().clone())?;
        Ok(Predictor { model, extractor })
    }

    pub fn model(&self) -> &TrainedModel {
        self.model
    }

    /// Predict the label of one audio file
    ///
    /// # Errors
    /// * `InvalidConfig` - If `threshold` is outside `[0, 1]`
    /// * `FileNotFound` - If `path` does not exist; checked before decoding
    /// * `Decode` - If the file cannot be decoded
    pub fn predict_file(&self, path: &Path, threshold: f64) -> Result<Prediction> {
        validate_threshold(threshold)?;
        if !path.is_file() {
            return Err(ClassifyError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let features = self.extractor.extract_file(path)?;
        let prediction = self.predict_features(&features, threshold)?;

        debug!(
            path = %path.display(),
            label = prediction.label().unwrap_or("-"),
            "predicted file"
        );
        Ok(prediction)
    }

    /// Predict from an already extracted feature vector
    ///
    /// The comparison is inclusive: a top probability equal to `threshold`
    /// is a match. The reported label is the model's voted hard label.
    ///
    /// # Errors
    /// * `InvalidConfig` - If `threshold` is outside `[0, 1]`
    /// * `DimensionMismatch` - If `features` has the wrong length
    pub fn predict_features(&self, features: &FeatureVector, threshold: f64) -> Result<Prediction> {
        validate_threshold(threshold)?;

        let probabilities = self.model.predict_proba(features)?;
        let top = probabilities
            .top()
            .map(|p| p.probability)
            .unwrap_or(0.0);

        if top >= threshold {
            let label = self.model.predict(features)?.to_string();
            Ok(Prediction::Match {
                label,
                probabilities,
            })
        } else {
            Ok(Prediction::NoConfidentMatch { probabilities })
        }
    }
}
