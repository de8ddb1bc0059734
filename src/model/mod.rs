//! Classifier Model
//!
//! Multi-class linear SVM built one-vs-one: one binary machine per pair of
//! classes, each with its own Platt sigmoid. Hard labels come from pairwise
//! voting; probabilities from coupling the pairwise sigmoids.
//!
//! A [`TrainedModel`] is immutable once fitted. It also records the
//! extraction parameters its training features were computed with, so
//! prediction can only ever extract features the same way.

pub mod platt;
pub mod svm;

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{ExtractionConfig, TrainerConfig};
use crate::dataset::Dataset;
use crate::error::{ClassifyError, Result};
use crate::features::FeatureVector;

use platt::{couple_pairwise, PlattSigmoid};
use svm::LinearSvm;

// ============================================================================
// Class probabilities
// ============================================================================

/// One probability per class, in the model's class order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassProbabilities {
    entries: Vec<ClassProbability>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassProbability {
    pub label: String,
    pub probability: f64,
}

impl ClassProbabilities {
    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.probability)
    }

    /// Most probable class; the earliest class wins a tie
    pub fn top(&self) -> Option<&ClassProbability> {
        self.entries.iter().fold(None, |best, e| match best {
            Some(b) if b.probability >= e.probability => Some(b),
            _ => Some(e),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassProbability> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ClassProbabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {:.3}", e.label, e.probability)?;
        }
        Ok(())
    }
}

// ============================================================================
// Trained model
// ============================================================================

/// Binary machine separating `classes[positive]` (f > 0) from `classes[negative]`
#[derive(Debug, Clone)]
struct PairwiseMachine {
    positive: usize,
    negative: usize,
    svm: LinearSvm,
    sigmoid: PlattSigmoid,
}

/// Fitted one-vs-one linear SVM with probability estimates
#[derive(Debug, Clone)]
pub struct TrainedModel {
    classes: Vec<String>,
    dimension: usize,
    machines: Vec<PairwiseMachine>,
    extraction: ExtractionConfig,
}

impl TrainedModel {
    /// Fit a model on every row of `dataset`
    ///
    /// Classes are the dataset's sorted label vocabulary. Pair `(i, j)` with
    /// `i < j` treats class `i` as the positive side.
    ///
    /// # Errors
    /// * `InsufficientData` - If fewer than two classes are present
    /// * `InvalidConfig` - If the solver settings are out of range
    pub fn fit(
        dataset: &Dataset,
        extraction: ExtractionConfig,
        config: &TrainerConfig,
    ) -> Result<Self> {
        config.validate()?;

        let classes = dataset.label_vocabulary();
        if classes.len() < 2 {
            return Err(ClassifyError::InsufficientData {
                reason: format!(
                    "need at least two distinct labels to fit, found {}",
                    classes.len()
                ),
            });
        }
        let dimension = dataset.dimension().unwrap_or(0);

        let mut members: Vec<Vec<&[f64]>> = vec![Vec::new(); classes.len()];
        for (row, label) in dataset.features().iter().zip(dataset.labels()) {
            if let Ok(idx) = classes.binary_search(label) {
                members[idx].push(row.as_slice());
            }
        }

        let mut machines = Vec::with_capacity(classes.len() * (classes.len() - 1) / 2);
        for positive in 0..classes.len() {
            for negative in positive + 1..classes.len() {
                let xs: Vec<&[f64]> = members[positive]
                    .iter()
                    .chain(&members[negative])
                    .copied()
                    .collect();
                let sides: Vec<bool> = (0..xs.len())
                    .map(|i| i < members[positive].len())
                    .collect();
                let ys: Vec<f64> = sides.iter().map(|&p| if p { 1.0 } else { -1.0 }).collect();

                let outcome =
                    svm::train(&xs, &ys, config.c, config.tolerance, config.max_iterations);
                if !outcome.converged {
                    warn!(
                        positive = %classes[positive],
                        negative = %classes[negative],
                        iterations = outcome.iterations,
                        "SVM solver hit the iteration cap before converging"
                    );
                }

                let decisions: Vec<f64> = xs.iter().map(|x| outcome.svm.decision(x)).collect();
                let sigmoid = PlattSigmoid::fit(&decisions, &sides);

                machines.push(PairwiseMachine {
                    positive,
                    negative,
                    svm: outcome.svm,
                    sigmoid,
                });
            }
        }

        info!(
            classes = classes.len(),
            dimension,
            machines = machines.len(),
            rows = dataset.len(),
            "fitted linear SVM"
        );

        Ok(TrainedModel {
            classes,
            dimension,
            machines,
            extraction,
        })
    }

    /// Class labels in sorted order; probability vectors follow this order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Feature vector length the model was fitted on
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Extraction parameters the training features were computed with
    pub fn extraction_config(&self) -> &ExtractionConfig {
        &self.extraction
    }

    /// Hard label by one-vs-one majority vote
    ///
    /// # Errors
    /// * `DimensionMismatch` - If `features` has the wrong length
    pub fn predict(&self, features: &FeatureVector) -> Result<&str> {
        self.check_dimension(features)?;

        let mut votes = vec![0usize; self.classes.len()];
        for machine in &self.machines {
            if machine.svm.decision(features.as_slice()) > 0.0 {
                votes[machine.positive] += 1;
            } else {
                votes[machine.negative] += 1;
            }
        }

        let mut winner = 0;
        for (idx, &count) in votes.iter().enumerate() {
            if count > votes[winner] {
                winner = idx;
            }
        }
        Ok(&self.classes[winner])
    }

    /// Probability estimate for every class
    ///
    /// # Errors
    /// * `DimensionMismatch` - If `features` has the wrong length
    pub fn predict_proba(&self, features: &FeatureVector) -> Result<ClassProbabilities> {
        self.check_dimension(features)?;

        let k = self.classes.len();
        let probabilities = if k == 2 {
            let machine = &self.machines[0];
            let p = machine
                .sigmoid
                .probability(machine.svm.decision(features.as_slice()));
            vec![p, 1.0 - p]
        } else {
            let mut r = vec![vec![0.0; k]; k];
            for machine in &self.machines {
                let p = machine
                    .sigmoid
                    .probability(machine.svm.decision(features.as_slice()));
                r[machine.positive][machine.negative] = p;
                r[machine.negative][machine.positive] = 1.0 - p;
            }
            couple_pairwise(&r)
        };

        Ok(ClassProbabilities {
            entries: self
                .classes
                .iter()
                .zip(probabilities)
                .map(|(label, probability)| ClassProbability {
                    label: label.clone(),
                    probability,
                })
                .collect(),
        })
    }

    fn check_dimension(&self, features: &FeatureVector) -> Result<()> {
        if features.len() != self.dimension {
            return Err(ClassifyError::DimensionMismatch {
                expected: self.dimension,
                actual: features.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn blob_dataset(centres: &[(&str, f64)], per_class: usize, dim: usize) -> Dataset {
        let mut dataset = Dataset::new();
        for (label, centre) in centres {
            for i in 0..per_class {
                // Small deterministic spread around the centre
                let jitter = (i as f64 * 0.37).sin() * 0.2;
                let row = (0..dim).map(|d| centre + jitter * ((d % 3) as f64 - 1.0)).collect();
                dataset.push(FeatureVector::new(row), *label).unwrap();
            }
        }
        dataset
    }

    fn fit(dataset: &Dataset) -> TrainedModel {
        TrainedModel::fit(dataset, ExtractionConfig::default(), &TrainerConfig::default()).unwrap()
    }

    #[test]
    fn test_two_class_prediction() {
        let model = fit(&blob_dataset(&[("x", 0.0), ("y", 10.0)], 12, 8));

        assert_eq!(model.classes(), &["x", "y"]);
        assert_eq!(model.predict(&FeatureVector::new(vec![0.1; 8])).unwrap(), "x");
        assert_eq!(model.predict(&FeatureVector::new(vec![9.8; 8])).unwrap(), "y");

        let probs = model.predict_proba(&FeatureVector::new(vec![0.1; 8])).unwrap();
        assert_relative_eq!(probs.iter().map(|p| p.probability).sum::<f64>(), 1.0, epsilon = 1e-9);
        assert!(probs.get("x").unwrap() > 0.5);
        assert_eq!(probs.top().unwrap().label, "x");
    }

    #[test]
    fn test_three_class_prediction() {
        let model = fit(&blob_dataset(&[("a", 0.0), ("b", 10.0), ("c", 20.0)], 10, 4));

        for (label, centre) in [("a", 0.0), ("b", 10.0), ("c", 20.0)] {
            let x = FeatureVector::new(vec![centre; 4]);
            assert_eq!(model.predict(&x).unwrap(), label);

            let probs = model.predict_proba(&x).unwrap();
            assert_eq!(probs.len(), 3);
            assert_eq!(probs.top().unwrap().label, label);
            assert_relative_eq!(
                probs.iter().map(|p| p.probability).sum::<f64>(),
                1.0,
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn test_single_class_is_insufficient() {
        let dataset = blob_dataset(&[("only", 1.0)], 5, 3);
        let result = TrainedModel::fit(&dataset, ExtractionConfig::default(), &TrainerConfig::default());
        assert!(matches!(result, Err(ClassifyError::InsufficientData { .. })));
    }

    #[test]
    fn test_wrong_dimension_is_rejected() {
        let model = fit(&blob_dataset(&[("x", 0.0), ("y", 10.0)], 5, 8));
        let result = model.predict_proba(&FeatureVector::new(vec![0.0; 3]));
        assert!(matches!(
            result,
            Err(ClassifyError::DimensionMismatch { expected: 8, actual: 3 })
        ));
    }

    #[test]
    fn test_probabilities_display() {
        let probs = ClassProbabilities {
            entries: vec![
                ClassProbability { label: "cat".into(), probability: 0.25 },
                ClassProbability { label: "dog".into(), probability: 0.75 },
            ],
        };
        assert_eq!(probs.to_string(), "cat: 0.250, dog: 0.750");
        assert_eq!(probs.top().unwrap().label, "dog");
        assert_eq!(probs.get("bird"), None);
    }
}
