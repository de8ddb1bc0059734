//! CLI Module
//!
//! Command-line interface for wavclass.

pub mod commands;
pub mod interactive;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// wavclass - train an audio classifier from labeled folders and predict new clips
#[derive(Parser, Debug)]
#[command(name = "wavclass")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON configuration file; missing fields keep their defaults
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the labels discovered in a dataset directory
    #[command(name = "labels")]
    Labels {
        /// Dataset root with one subdirectory per label
        dataset: PathBuf,
    },

    /// Train a model and print its held-out evaluation
    #[command(name = "train")]
    Train {
        /// Dataset root with one subdirectory per label
        dataset: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Train a model, then classify each given file
    #[command(name = "predict")]
    Predict {
        /// Dataset root with one subdirectory per label
        dataset: PathBuf,

        /// Audio files to classify
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Minimum top-class probability for a match
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Train a model, then classify clips by name from an input directory
    #[command(name = "interactive")]
    Interactive {
        /// Dataset root with one subdirectory per label
        dataset: PathBuf,

        /// Directory the typed clip names are resolved against
        input_dir: PathBuf,

        /// Minimum top-class probability for a match
        #[arg(short, long)]
        threshold: Option<f64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_predict() {
        let cli = Cli::parse_from([
            "wavclass",
            "--verbose",
            "predict",
            "data",
            "a.wav",
            "b.wav",
            "--threshold",
            "0.7",
        ]);

        assert!(cli.verbose);
        match cli.command {
            Commands::Predict {
                dataset,
                files,
                threshold,
                json,
            } => {
                assert_eq!(dataset, PathBuf::from("data"));
                assert_eq!(files.len(), 2);
                assert_eq!(threshold, Some(0.7));
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_predict_requires_a_file() {
        assert!(Cli::try_parse_from(["wavclass", "predict", "data"]).is_err());
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["wavclass", "train", "data", "--config", "cfg.json"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("cfg.json")));
    }
}
