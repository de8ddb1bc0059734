//! CLI Command Implementations
//!
//! Each handler trains or loads what it needs through the library and prints
//! results to stdout. Logging goes to stderr.

use std::io;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::json;
use tracing::{info, warn};

use crate::cli::interactive::InteractiveSession;
use crate::config::AppConfig;
use crate::dataset::{DatasetLoader, LoadOutcome};
use crate::features::FeatureExtractor;
use crate::predictor::{Prediction, Predictor};
use crate::trainer::{Trainer, TrainingOutcome};

/// Load the configuration file, or the defaults when none is given.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(AppConfig::default()),
    }
}

/// Print the label vocabulary of a dataset.
pub fn labels(dataset: &Path, config: &AppConfig) -> Result<()> {
    let extractor = FeatureExtractor::new(config.extraction.clone())?;
    let loader = DatasetLoader::new(&extractor, config.dataset.clone());

    let labels = loader
        .discover_labels(dataset)
        .with_context(|| format!("Failed to scan dataset {}", dataset.display()))?;

    if labels.is_empty() {
        println!("No labels found in {}", dataset.display());
        return Ok(());
    }
    for label in labels {
        println!("{label}");
    }
    Ok(())
}

/// Train on a dataset and print the held-out evaluation.
pub fn train(dataset: &Path, json: bool, config: &AppConfig) -> Result<()> {
    let (loaded, outcome) = load_and_train(dataset, config)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&training_summary(&loaded, &outcome))?
        );
    } else {
        print_skipped(&loaded);
        print_evaluation(&outcome);
    }
    Ok(())
}

/// JSON document printed by `train --json`
fn training_summary(loaded: &LoadOutcome, outcome: &TrainingOutcome) -> serde_json::Value {
    let skipped: Vec<_> = loaded
        .skipped
        .iter()
        .map(|s| json!({ "path": s.path, "error": s.error.to_string() }))
        .collect();

    json!({
        "classes": outcome.model.classes(),
        "train_size": outcome.train_size,
        "test_size": outcome.test_size,
        "dataset": loaded.summary(),
        "skipped": skipped,
        "report": outcome.report,
    })
}

/// Train on a dataset, then classify each file.
///
/// A file that cannot be classified is reported and skipped; the command
/// fails at the end if any file failed.
pub fn predict(
    dataset: &Path,
    files: &[impl AsRef<Path>],
    threshold: Option<f64>,
    json: bool,
    config: &AppConfig,
) -> Result<()> {
    let threshold = threshold.unwrap_or(config.predictor.threshold);
    crate::config::validate_threshold(threshold)?;

    let (loaded, outcome) = load_and_train(dataset, config)?;
    if !json {
        print_skipped(&loaded);
        print_evaluation(&outcome);
        println!();
    }

    let predictor = Predictor::new(&outcome.model)?;
    let mut results = Vec::with_capacity(files.len());
    let mut failures = 0usize;

    for file in files {
        let path = file.as_ref();
        match predictor.predict_file(path, threshold) {
            Ok(prediction) => {
                if !json {
                    print_prediction(path, &prediction);
                }
                results.push(json!({ "path": path, "prediction": prediction }));
            }
            Err(e) => {
                failures += 1;
                warn!(path = %path.display(), code = e.error_code(), "prediction failed");
                if !json {
                    println!("{}: {e}", path.display());
                }
                results.push(json!({
                    "path": path,
                    "error": e.to_string(),
                    "code": e.error_code(),
                }));
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }
    if failures > 0 {
        bail!("{failures} of {} file(s) could not be classified", files.len());
    }
    Ok(())
}

/// Train on a dataset, then answer clip names typed on stdin.
pub fn interactive(
    dataset: &Path,
    input_dir: &Path,
    threshold: Option<f64>,
    config: &AppConfig,
) -> Result<()> {
    let threshold = threshold.unwrap_or(config.predictor.threshold);
    crate::config::validate_threshold(threshold)?;

    let (loaded, outcome) = load_and_train(dataset, config)?;
    print_skipped(&loaded);
    print_evaluation(&outcome);

    let predictor = Predictor::new(&outcome.model)?;
    let session =
        InteractiveSession::new(&predictor, input_dir, config.dataset.extension.clone(), threshold);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    session
        .run(stdin.lock(), &mut stdout)
        .context("Interactive session I/O failed")?;
    Ok(())
}

fn load_and_train(dataset: &Path, config: &AppConfig) -> Result<(LoadOutcome, TrainingOutcome)> {
    info!(dataset = %dataset.display(), "loading dataset");

    let extractor = FeatureExtractor::new(config.extraction.clone())?;
    let loader = DatasetLoader::new(&extractor, config.dataset.clone());
    let loaded = loader
        .load(dataset)
        .with_context(|| format!("Failed to load dataset {}", dataset.display()))?;

    let trainer = Trainer::new(config.trainer.clone(), config.extraction.clone());
    let outcome = trainer
        .train(&loaded.dataset)
        .context("Training failed")?;

    Ok((loaded, outcome))
}

fn print_skipped(loaded: &LoadOutcome) {
    for skipped in &loaded.skipped {
        println!("Skipped {}: {}", skipped.path.display(), skipped.error);
    }
}

fn print_evaluation(outcome: &TrainingOutcome) {
    println!(
        "Trained on {} rows, evaluated on {} rows",
        outcome.train_size, outcome.test_size
    );
    println!("Accuracy: {}", outcome.report.accuracy);
    println!("{}", outcome.report);
}

fn print_prediction(path: &Path, prediction: &Prediction) {
    match prediction {
        Prediction::Match {
            label,
            probabilities,
        } => {
            println!("{}: {label}", path.display());
            println!("  Probabilities: {probabilities}");
        }
        Prediction::NoConfidentMatch { probabilities } => {
            println!("{}: No matching result found.", path.display());
            println!("  Probabilities: {probabilities}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{generate_test_tone, save_waveform};
    use crate::config::DatasetConfig;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_lenient_training_reports_skips_in_summary() {
        let dir = tempdir().unwrap();
        for (label, frequency) in [("high", 5000.0), ("low", 220.0)] {
            let class_dir = dir.path().join(label);
            std::fs::create_dir(&class_dir).unwrap();
            for i in 0..3 {
                let tone = generate_test_tone(frequency + i as f32, 0.1, 48000);
                save_waveform(&tone, &class_dir.join(format!("{i}.wav")), 16).unwrap();
            }
        }
        let bad = dir.path().join("low").join("zz.wav");
        std::fs::write(&bad, b"garbage").unwrap();

        let config = AppConfig {
            dataset: DatasetConfig {
                skip_unreadable: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let (loaded, outcome) = load_and_train(dir.path(), &config).unwrap();
        let summary = training_summary(&loaded, &outcome);

        assert_eq!(summary["dataset"]["rows"], 6);
        assert_eq!(summary["dataset"]["skipped"], 1);
        assert_eq!(summary["skipped"].as_array().unwrap().len(), 1);
        assert_eq!(summary["skipped"][0]["path"], json!(bad));
        assert_eq!(summary["classes"], json!(["high", "low"]));

        // One document, parseable on its own
        let text = serde_json::to_string_pretty(&summary).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, summary);
    }
}
