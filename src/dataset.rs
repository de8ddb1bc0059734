//! Labeled dataset loading
//!
//! A dataset root holds one subdirectory per label; every file with the
//! configured extension inside a label directory is one sample:
//!
//! ```text
//! root/
//!   dog/bark1.wav
//!   dog/bark2.wav
//!   cat/meow1.wav
//! ```
//!
//! Labels come only from directory names. Labels and files are visited in
//! name order, so the row order of a loaded dataset is reproducible.
//! Symbolic links to label directories and to sample files are followed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::DatasetConfig;
use crate::error::{ClassifyError, Result};
use crate::features::{FeatureExtractor, FeatureVector};

// ============================================================================
// Dataset
// ============================================================================

/// Feature matrix with an index-aligned label column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    features: Vec<FeatureVector>,
    labels: Vec<String>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dataset from parallel rows
    ///
    /// # Errors
    /// * `InsufficientData` - If the two sequences differ in length
    /// * `DimensionMismatch` - If the rows do not share one length
    pub fn from_rows(features: Vec<FeatureVector>, labels: Vec<String>) -> Result<Self> {
        if features.len() != labels.len() {
            return Err(ClassifyError::InsufficientData {
                reason: format!(
                    "{} feature rows but {} labels",
                    features.len(),
                    labels.len()
                ),
            });
        }

        let mut dataset = Dataset::new();
        for (row, label) in features.into_iter().zip(labels) {
            dataset.push(row, label)?;
        }
        Ok(dataset)
    }

    /// Append one row
    ///
    /// # Errors
    /// * `DimensionMismatch` - If `features` differs in length from earlier rows
    pub fn push(&mut self, features: FeatureVector, label: impl Into<String>) -> Result<()> {
        if let Some(expected) = self.dimension() {
            if features.len() != expected {
                return Err(ClassifyError::DimensionMismatch {
                    expected,
                    actual: features.len(),
                });
            }
        }

        self.features.push(features);
        self.labels.push(label.into());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Feature vector length, `None` for an empty dataset
    pub fn dimension(&self) -> Option<usize> {
        self.features.first().map(FeatureVector::len)
    }

    pub fn features(&self) -> &[FeatureVector] {
        &self.features
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Distinct labels in sorted order
    pub fn label_vocabulary(&self) -> Vec<String> {
        self.class_counts().into_keys().collect()
    }

    /// Row count per label
    pub fn class_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(label.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// New dataset holding the rows at `indices`, in that order
    ///
    /// Every index must be below `len()`.
    pub(crate) fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i].clone()).collect(),
        }
    }
}

// ============================================================================
// Loader
// ============================================================================

/// A file dropped during a lenient load, with the reason
#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub error: ClassifyError,
}

/// Result of a lenient load
#[derive(Debug)]
pub struct LoadOutcome {
    pub dataset: Dataset,
    pub skipped: Vec<SkippedFile>,
}

/// Summary counts for one load, suitable for printing
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub rows: usize,
    pub labels: BTreeMap<String, usize>,
    pub skipped: usize,
}

impl LoadOutcome {
    pub fn summary(&self) -> LoadSummary {
        LoadSummary {
            rows: self.dataset.len(),
            labels: self.dataset.class_counts(),
            skipped: self.skipped.len(),
        }
    }
}

/// Walks a dataset root and extracts one feature vector per sample file
pub struct DatasetLoader<'a> {
    extractor: &'a FeatureExtractor,
    config: DatasetConfig,
}

impl<'a> DatasetLoader<'a> {
    pub fn new(extractor: &'a FeatureExtractor, config: DatasetConfig) -> Self {
        DatasetLoader { extractor, config }
    }

    /// Labels that would contribute rows, without extracting anything
    pub fn discover_labels(&self, root: &Path) -> Result<Vec<String>> {
        Ok(self
            .scan(root)?
            .into_iter()
            .map(|(label, _)| label)
            .collect())
    }

    /// Load every sample under `root`
    ///
    /// Fails on the first undecodable file unless `skip_unreadable` is set,
    /// in which case failures are collected into [`LoadOutcome::skipped`].
    ///
    /// # Errors
    /// * `FileNotFound` - If `root` does not exist
    /// * `NotADirectory` - If `root` is a file
    /// * `Decode` - If a sample cannot be decoded (fail-fast mode only)
    pub fn load(&self, root: &Path) -> Result<LoadOutcome> {
        let mut dataset = Dataset::new();
        let mut skipped = Vec::new();

        for (label, files) in self.scan(root)? {
            for path in files {
                match self.extractor.extract_file(&path) {
                    Ok(features) => dataset.push(features, label.clone())?,
                    Err(error) if self.config.skip_unreadable && error.is_recoverable() => {
                        warn!(path = %path.display(), %error, "skipping unreadable sample");
                        skipped.push(SkippedFile { path, error });
                    }
                    Err(error) => return Err(error),
                }
            }
        }

        info!(
            root = %root.display(),
            rows = dataset.len(),
            labels = dataset.class_counts().len(),
            skipped = skipped.len(),
            "loaded dataset"
        );

        Ok(LoadOutcome { dataset, skipped })
    }

    /// Sorted `(label, sample files)` pairs for labels with at least one file
    fn scan(&self, root: &Path) -> Result<Vec<(String, Vec<PathBuf>)>> {
        if !root.exists() {
            return Err(ClassifyError::FileNotFound {
                path: root.to_path_buf(),
            });
        }
        if !root.is_dir() {
            return Err(ClassifyError::NotADirectory {
                path: root.to_path_buf(),
            });
        }

        let suffix = format!(".{}", self.config.extension);
        let mut labels = Vec::new();

        for entry in WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.map_err(walk_error)?;
            if !entry.file_type().is_dir() {
                continue;
            }

            let label = entry.file_name().to_string_lossy().into_owned();
            let files: Vec<PathBuf> = WalkDir::new(entry.path())
                .min_depth(1)
                .max_depth(1)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(walk_error)?
                .into_iter()
                .filter(|e| e.file_type().is_file())
                .filter(|e| e.file_name().to_string_lossy().ends_with(&suffix))
                .map(|e| e.into_path())
                .collect();

            if !files.is_empty() {
                labels.push((label, files));
            }
        }

        Ok(labels)
    }
}

fn walk_error(e: walkdir::Error) -> ClassifyError {
    let message = e.to_string();
    match e.into_io_error() {
        Some(io) => ClassifyError::Io(io),
        None => ClassifyError::Io(std::io::Error::new(std::io::ErrorKind::Other, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{generate_test_tone, save_waveform};
    use crate::config::ExtractionConfig;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn write_tone(path: &Path, frequency: f32) {
        save_waveform(&generate_test_tone(frequency, 0.1, 48000), path, 16).unwrap();
    }

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(ExtractionConfig::default()).unwrap()
    }

    #[test]
    fn test_push_rejects_dimension_change() {
        let mut dataset = Dataset::new();
        dataset.push(FeatureVector::new(vec![0.0; 3]), "a").unwrap();

        let result = dataset.push(FeatureVector::new(vec![0.0; 4]), "b");
        assert!(matches!(
            result,
            Err(ClassifyError::DimensionMismatch { expected: 3, actual: 4 })
        ));
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn test_from_rows_requires_alignment() {
        let result = Dataset::from_rows(vec![FeatureVector::new(vec![1.0])], Vec::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_subset_and_vocabulary() {
        let dataset = Dataset::from_rows(
            vec![
                FeatureVector::new(vec![0.0]),
                FeatureVector::new(vec![1.0]),
                FeatureVector::new(vec![2.0]),
            ],
            vec!["b".into(), "a".into(), "b".into()],
        )
        .unwrap();

        assert_eq!(dataset.label_vocabulary(), vec!["a", "b"]);

        let picked = dataset.subset(&[2, 1]);
        assert_eq!(picked.labels(), &["b".to_string(), "a".to_string()]);
        assert_eq!(picked.features()[0].as_slice(), &[2.0]);
    }

    #[test]
    fn test_load_groups_rows_by_label() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("A");
        let b = dir.path().join("B");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();
        for i in 0..3 {
            write_tone(&a.join(format!("a{}.wav", i)), 300.0 + i as f32);
        }
        for i in 0..2 {
            write_tone(&b.join(format!("b{}.wav", i)), 3000.0 + i as f32);
        }

        let ex = extractor();
        let outcome = DatasetLoader::new(&ex, DatasetConfig::default())
            .load(dir.path())
            .unwrap();
        let dataset = outcome.dataset;

        assert_eq!(dataset.len(), 5);
        assert_eq!(dataset.features().len(), dataset.labels().len());
        assert_eq!(dataset.labels(), &["A", "A", "A", "B", "B"]);
        assert_eq!(dataset.dimension(), Some(40));
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn test_non_audio_files_and_empty_dirs_are_ignored() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("A");
        let empty = dir.path().join("empty");
        let notes = dir.path().join("notes");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&empty).unwrap();
        std::fs::create_dir_all(&notes).unwrap();
        write_tone(&a.join("one.wav"), 440.0);
        std::fs::write(a.join("readme.txt"), "not audio").unwrap();
        std::fs::write(notes.join("todo.md"), "still not audio").unwrap();
        std::fs::write(dir.path().join("stray.wav"), "top-level files are not labels").unwrap();

        let ex = extractor();
        let loader = DatasetLoader::new(&ex, DatasetConfig::default());

        assert_eq!(loader.discover_labels(dir.path()).unwrap(), vec!["A"]);
        let dataset = loader.load(dir.path()).unwrap().dataset;
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn test_empty_root_yields_empty_dataset() {
        let dir = tempdir().unwrap();
        let ex = extractor();

        let outcome = DatasetLoader::new(&ex, DatasetConfig::default())
            .load(dir.path())
            .unwrap();
        assert!(outcome.dataset.is_empty());
        assert_eq!(outcome.dataset.dimension(), None);
    }

    #[test]
    fn test_corrupt_file_aborts_load_with_its_path() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("A");
        std::fs::create_dir_all(&a).unwrap();
        write_tone(&a.join("good.wav"), 440.0);
        let bad = a.join("bad.wav");
        std::fs::write(&bad, b"garbage").unwrap();

        let ex = extractor();
        let result = DatasetLoader::new(&ex, DatasetConfig::default()).load(dir.path());

        match result {
            Err(err @ ClassifyError::Decode { .. }) => assert_eq!(err.path(), Some(bad.as_path())),
            other => panic!("Expected Decode error, got: {:?}", other),
        }
    }

    #[test]
    fn test_lenient_load_collects_failures() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("A");
        std::fs::create_dir_all(&a).unwrap();
        write_tone(&a.join("good.wav"), 440.0);
        std::fs::write(a.join("bad.wav"), b"garbage").unwrap();

        let ex = extractor();
        let config = DatasetConfig {
            skip_unreadable: true,
            ..Default::default()
        };
        let outcome = DatasetLoader::new(&ex, config).load(dir.path()).unwrap();

        assert_eq!(outcome.dataset.len(), 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert!(outcome.skipped[0].path.ends_with("bad.wav"));
        assert_eq!(outcome.summary().skipped, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_labels_and_samples_are_followed() {
        use std::os::unix::fs::symlink;

        let dir = tempdir().unwrap();
        let elsewhere = tempdir().unwrap();

        let root = dir.path();
        let a = root.join("A");
        std::fs::create_dir_all(&a).unwrap();
        write_tone(&a.join("a.wav"), 440.0);
        symlink(a.join("a.wav"), a.join("linked.wav")).unwrap();

        let outside_b = elsewhere.path().join("B");
        std::fs::create_dir_all(&outside_b).unwrap();
        write_tone(&outside_b.join("b.wav"), 3000.0);
        symlink(&outside_b, root.join("B")).unwrap();

        let ex = extractor();
        let loader = DatasetLoader::new(&ex, DatasetConfig::default());

        assert_eq!(loader.discover_labels(root).unwrap(), vec!["A", "B"]);
        let dataset = loader.load(root).unwrap().dataset;
        assert_eq!(dataset.labels(), &["A", "A", "B"]);
    }

    #[test]
    fn test_missing_and_file_roots() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file.wav");
        std::fs::write(&file, b"x").unwrap();

        let ex = extractor();
        let loader = DatasetLoader::new(&ex, DatasetConfig::default());

        assert!(matches!(
            loader.load(&dir.path().join("missing")),
            Err(ClassifyError::FileNotFound { .. })
        ));
        assert!(matches!(
            loader.load(&file),
            Err(ClassifyError::NotADirectory { .. })
        ));
    }
}
