//! Interactive prediction loop
//!
//! Prompts for a bare clip name, resolves it to `<input_dir>/<name>.<ext>`
//! and prints the prediction. Per-file failures are printed and the loop
//! carries on; typing `exit` (any case) or closing the input ends it.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::error::ClassifyError;
use crate::predictor::{Prediction, Predictor};

const PROMPT: &str = "Enter the audio file name (without path) to predict (or type 'exit' to quit): ";
const NO_MATCH: &str = "No matching result found.";
const NOT_FOUND: &str = "File not found. Please make sure the file exists and the name is correct.";

/// One interactive prediction session
pub struct InteractiveSession<'p, 'm> {
    predictor: &'p Predictor<'m>,
    input_dir: PathBuf,
    extension: String,
    threshold: f64,
}

impl<'p, 'm> InteractiveSession<'p, 'm> {
    pub fn new(
        predictor: &'p Predictor<'m>,
        input_dir: impl Into<PathBuf>,
        extension: impl Into<String>,
        threshold: f64,
    ) -> Self {
        InteractiveSession {
            predictor,
            input_dir: input_dir.into(),
            extension: extension.into(),
            threshold,
        }
    }

    /// Path a typed clip name refers to
    pub fn resolve(&self, name: &str) -> PathBuf {
        self.input_dir.join(format!("{name}.{}", self.extension))
    }

    /// Run the loop until `exit` or end of input
    ///
    /// Only I/O errors on `input` / `output` end the loop early.
    pub fn run<R: BufRead, W: Write>(&self, mut input: R, output: &mut W) -> io::Result<()> {
        let mut line = String::new();
        loop {
            write!(output, "{PROMPT}")?;
            output.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                writeln!(output)?;
                return Ok(());
            }

            let name = line.trim();
            if name.eq_ignore_ascii_case("exit") {
                return Ok(());
            }

            self.answer(&self.resolve(name), output)?;
        }
    }

    fn answer<W: Write>(&self, path: &Path, output: &mut W) -> io::Result<()> {
        match self.predictor.predict_file(path, self.threshold) {
            Ok(Prediction::Match {
                label,
                probabilities,
            }) => {
                writeln!(output)?;
                writeln!(output, "Predicted label: {label}")?;
                writeln!(output, "Probabilities: {probabilities}")
            }
            Ok(Prediction::NoConfidentMatch { .. }) => writeln!(output, "{NO_MATCH}"),
            Err(ClassifyError::FileNotFound { .. }) => writeln!(output, "{NOT_FOUND}"),
            Err(e) => writeln!(output, "An error occurred: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{generate_test_tone, save_waveform};
    use crate::config::{ExtractionConfig, TrainerConfig};
    use crate::dataset::Dataset;
    use crate::features::FeatureVector;
    use crate::model::TrainedModel;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn model() -> TrainedModel {
        let mut dataset = Dataset::new();
        for _ in 0..10 {
            dataset.push(FeatureVector::new(vec![-300.0; 40]), "quiet").unwrap();
            dataset.push(FeatureVector::new(vec![100.0; 40]), "loud").unwrap();
        }
        TrainedModel::fit(&dataset, ExtractionConfig::default(), &TrainerConfig::default()).unwrap()
    }

    fn run(session: &InteractiveSession, input: &str) -> String {
        let mut output = Vec::new();
        session.run(Cursor::new(input), &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_resolve_appends_extension() {
        let model = model();
        let predictor = Predictor::new(&model).unwrap();
        let session = InteractiveSession::new(&predictor, "/clips", "wav", 0.5);

        assert_eq!(session.resolve("dog"), PathBuf::from("/clips/dog.wav"));
    }

    #[test]
    fn test_missing_file_then_exit() {
        let model = model();
        let predictor = Predictor::new(&model).unwrap();
        let dir = tempdir().unwrap();
        let session = InteractiveSession::new(&predictor, dir.path(), "wav", 0.5);

        let text = run(&session, "nothing-here\nEXIT\nnothing-here\n");

        assert_eq!(text.matches(NOT_FOUND).count(), 1);
        assert_eq!(text.matches(PROMPT).count(), 2);
    }

    #[test]
    fn test_existing_file_is_predicted() {
        let model = model();
        let predictor = Predictor::new(&model).unwrap();
        let dir = tempdir().unwrap();
        let tone = generate_test_tone(440.0, 0.5, 48000);
        save_waveform(&tone, &dir.path().join("tone.wav"), 16).unwrap();

        let session = InteractiveSession::new(&predictor, dir.path(), "wav", 0.0);
        let text = run(&session, "tone\nexit\n");

        assert!(text.contains("Predicted label: "));
        assert!(text.contains("Probabilities: "));
    }

    #[test]
    fn test_corrupt_file_reports_error_and_continues() {
        let model = model();
        let predictor = Predictor::new(&model).unwrap();
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("bad.wav"), b"garbage").unwrap();

        let session = InteractiveSession::new(&predictor, dir.path(), "wav", 0.5);
        let text = run(&session, "bad\nmissing\n");

        assert!(text.contains("An error occurred: "));
        assert!(text.contains(NOT_FOUND));
    }

    #[test]
    fn test_end_of_input_stops_loop() {
        let model = model();
        let predictor = Predictor::new(&model).unwrap();
        let session = InteractiveSession::new(&predictor, "/clips", "wav", 0.5);

        let text = run(&session, "");
        assert_eq!(text.matches(PROMPT).count(), 1);
    }
}
