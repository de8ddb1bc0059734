//! Held-out evaluation report
//!
//! Accuracy plus per-class precision / recall / F1, with macro and
//! support-weighted averages. A metric whose denominator is zero is
//! reported as 0.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// Scores for one label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Held-out rows whose true label is this one
    pub support: usize,
}

/// Averaged scores across labels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Complete evaluation of a model on its held-out rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub classes: Vec<ClassMetrics>,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
    pub support: usize,
}

impl EvaluationReport {
    /// Score `predicted` against `truth`
    ///
    /// Rows are the sorted union of true and predicted labels, so a label the
    /// model never predicts still shows up with zero precision.
    pub fn from_predictions<S: AsRef<str>>(truth: &[S], predicted: &[S]) -> Self {
        debug_assert_eq!(truth.len(), predicted.len());

        let labels: BTreeSet<&str> = truth
            .iter()
            .chain(predicted)
            .map(AsRef::as_ref)
            .collect();

        let pairs: Vec<(&str, &str)> = truth
            .iter()
            .zip(predicted)
            .map(|(t, p)| (t.as_ref(), p.as_ref()))
            .collect();

        let correct = pairs.iter().filter(|(t, p)| t == p).count();
        let accuracy = ratio(correct, pairs.len());

        let classes: Vec<ClassMetrics> = labels
            .into_iter()
            .map(|label| {
                let tp = pairs.iter().filter(|(t, p)| *t == label && *p == label).count();
                let predicted_as = pairs.iter().filter(|(_, p)| *p == label).count();
                let support = pairs.iter().filter(|(t, _)| *t == label).count();

                let precision = ratio(tp, predicted_as);
                let recall = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };

                ClassMetrics {
                    label: label.to_string(),
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        let macro_avg = average(&classes, |_| 1.0);
        let weighted_avg = average(&classes, |m| m.support as f64);

        EvaluationReport {
            accuracy,
            classes,
            macro_avg,
            weighted_avg,
            support: pairs.len(),
        }
    }

    pub fn class(&self, label: &str) -> Option<&ClassMetrics> {
        self.classes.iter().find(|m| m.label == label)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn average<W: Fn(&ClassMetrics) -> f64>(classes: &[ClassMetrics], weight: W) -> AverageMetrics {
    let total: f64 = classes.iter().map(&weight).sum();
    if total <= 0.0 {
        return AverageMetrics {
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
        };
    }

    let weighted = |field: fn(&ClassMetrics) -> f64| {
        classes.iter().map(|m| field(m) * weight(m)).sum::<f64>() / total
    };

    AverageMetrics {
        precision: weighted(|m| m.precision),
        recall: weighted(|m| m.recall),
        f1: weighted(|m| m.f1),
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|m| m.label.len())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(0);

        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for m in &self.classes {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                m.label, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.support
        )?;
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, avg.precision, avg.recall, avg.f1, self.support
            )?;
        }
        Ok(())
    }
}
