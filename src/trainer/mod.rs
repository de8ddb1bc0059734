//! Trainer
//!
//! Splits a [`Dataset`] into training and held-out rows with a seeded
//! permutation, fits a [`TrainedModel`] on the training rows and scores it on
//! the held-out rows.

pub mod report;

pub use report::{AverageMetrics, ClassMetrics, EvaluationReport};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::config::{ExtractionConfig, TrainerConfig};
use crate::dataset::Dataset;
use crate::error::{ClassifyError, Result};
use crate::model::TrainedModel;

/// Row indices for each side of a split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Seeded shuffle split of `n` rows
///
/// `ceil(test_fraction * n)` rows go to the test side. The same
/// `(n, test_fraction, seed)` always yields the same split.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Split {
    let n_test = ((test_fraction * n as f64).ceil() as usize).min(n);

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Split {
        train,
        test: indices,
    }
}

/// Everything a training run produces
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: TrainedModel,
    pub report: EvaluationReport,
    pub train_size: usize,
    pub test_size: usize,
}

/// Fits and evaluates models under one configuration
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainerConfig,
    extraction: ExtractionConfig,
}

impl Trainer {
    /// `extraction` must be the configuration the dataset's features were
    /// computed with; the fitted model carries it into prediction.
    pub fn new(config: TrainerConfig, extraction: ExtractionConfig) -> Self {
        Trainer { config, extraction }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Split, fit and evaluate
    ///
    /// # Errors
    /// * `InvalidConfig` - If the trainer settings are out of range
    /// * `InsufficientData` - If the dataset has fewer than two labels, a
    ///   label has too few rows, or the split leaves a side unusable
    pub fn train(&self, dataset: &Dataset) -> Result<TrainingOutcome> {
        self.config.validate()?;
        self.check_dataset(dataset)?;

        let split = train_test_split(dataset.len(), self.config.test_fraction, self.config.seed);
        if split.train.is_empty() || split.test.is_empty() {
            return Err(ClassifyError::InsufficientData {
                reason: format!(
                    "{} rows cannot be split into non-empty training and test sets",
                    dataset.len()
                ),
            });
        }

        let train_set = dataset.subset(&split.train);
        let test_set = dataset.subset(&split.test);
        debug!(
            train = train_set.len(),
            test = test_set.len(),
            seed = self.config.seed,
            "split dataset"
        );

        let train_labels = train_set.label_vocabulary();
        if train_labels.len() < 2 {
            return Err(ClassifyError::InsufficientData {
                reason: format!(
                    "training split holds only {} distinct label(s)",
                    train_labels.len()
                ),
            });
        }

        let model = TrainedModel::fit(&train_set, self.extraction.clone(), &self.config)?;

        let mut predicted = Vec::with_capacity(test_set.len());
        for features in test_set.features() {
            predicted.push(model.predict(features)?.to_string());
        }
        let report = EvaluationReport::from_predictions(test_set.labels(), predicted.as_slice());

        info!(
            accuracy = report.accuracy,
            train = train_set.len(),
            test = test_set.len(),
            "evaluated model on held-out rows"
        );

        Ok(TrainingOutcome {
            model,
            report,
            train_size: train_set.len(),
            test_size: test_set.len(),
        })
    }

    fn check_dataset(&self, dataset: &Dataset) -> Result<()> {
        let counts = dataset.class_counts();
        if counts.len() < 2 {
            return Err(ClassifyError::InsufficientData {
                reason: format!(
                    "need at least two distinct labels, found {}",
                    counts.len()
                ),
            });
        }

        if let Some((label, count)) = counts
            .iter()
            .find(|&(_, &count)| count < self.config.min_samples_per_class)
        {
            return Err(ClassifyError::InsufficientData {
                reason: format!(
                    "label '{label}' has {count} row(s), need at least {}",
                    self.config.min_samples_per_class
                ),
            });
        }

        Ok(())
    }
}
