//! wavclass - Supervised Audio Classification
//!
//! Trains a classifier from a directory of labeled `.wav` recordings and
//! predicts labels for new recordings behind a confidence threshold.
//!
//! # Pipeline
//!
//! - [`features`]: one recording → mean MFCC vector (40 values by default)
//! - [`dataset`]: `root/<label>/<clip>.wav` → feature matrix + labels
//! - [`trainer`]: seeded 80/20 split, one-vs-one linear SVM with Platt
//!   probabilities, held-out evaluation report
//! - [`predictor`]: file → label, or an explicit "no confident match"
//!
//! ```no_run
//! use std::path::Path;
//! use wavclass::{AppConfig, DatasetLoader, FeatureExtractor, Predictor, Trainer};
//!
//! # fn main() -> wavclass::Result<()> {
//! let config = AppConfig::default();
//! let extractor = FeatureExtractor::new(config.extraction.clone())?;
//! let loaded = DatasetLoader::new(&extractor, config.dataset.clone()).load(Path::new("samples"))?;
//!
//! let outcome = Trainer::new(config.trainer.clone(), config.extraction.clone())
//!     .train(&loaded.dataset)?;
//! println!("{}", outcome.report);
//!
//! let predictor = Predictor::new(&outcome.model)?;
//! let prediction = predictor.predict_file(Path::new("input/clip.wav"), 0.5)?;
//! println!("{:?}", prediction.label());
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod model;
pub mod predictor;
pub mod trainer;

pub use config::{AppConfig, DatasetConfig, ExtractionConfig, PredictorConfig, TrainerConfig};
pub use dataset::{Dataset, DatasetLoader, LoadOutcome, SkippedFile};
pub use error::{ClassifyError, Result};
pub use features::{FeatureExtractor, FeatureVector};
pub use model::{ClassProbabilities, ClassProbability, TrainedModel};
pub use predictor::{Prediction, Predictor};
pub use trainer::{ClassMetrics, EvaluationReport, Trainer, TrainingOutcome};
