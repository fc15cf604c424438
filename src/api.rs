//! High-level API for kernel matched subspace detection
//!
//! This module provides a user-friendly interface for training a detector,
//! scoring new observations and evaluating detection quality.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use kmsd::api::KMSD;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Train on a labeled CSV file (last column: 1 = target, 0 = background)
//! let detector = KMSD::new()
//!     .with_sigma(0.5)
//!     .with_chunk_size(500)
//!     .train_from_csv("train.csv")?;
//!
//! // One likelihood-ratio statistic per row
//! let scores = detector.score_from_csv("scene.csv")?;
//! println!("AUC: {:.3}", detector.evaluate_from_csv("test.csv")?.auc());
//! # Ok(())
//! # }
//! ```

use crate::core::{
    rows_to_matrix, ClassLabel, Dataset, Detection, DetectorConfig, KMSDError, Result, Sample,
};
use crate::data::{load_observations, CSVDataset, LabeledDataset};
use crate::pipeline::{self, ModelInfo, TrainedModel};
use nalgebra::DMatrix;
use std::cmp::Ordering;
use std::path::Path;

/// High-level detector interface with builder pattern
#[derive(Debug, Clone, Default)]
pub struct KMSD {
    config: DetectorConfig,
}

impl KMSD {
    /// Create a detector builder with default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn with_config(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Set the RBF width sigma
    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.config.sigma = sigma;
        self
    }

    /// Set the spectral energy fraction kept by each basis
    pub fn with_energy_threshold(mut self, energy_threshold: f64) -> Self {
        self.config.energy_threshold = energy_threshold;
        self
    }

    /// Set the maximum number of rows scored at once
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = chunk_size;
        self
    }

    /// Enable or disable parallel chunk scoring
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Set the smallest accepted reciprocal condition number of Gamma
    pub fn with_rcond(mut self, rcond: f64) -> Self {
        self.config.rcond = rcond;
        self
    }

    /// Current configuration
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Train on a dataset
    pub fn train<D: Dataset>(self, dataset: &D) -> Result<TrainedDetector> {
        let model = pipeline::train(&self.config, dataset)?;
        Ok(TrainedDetector {
            model,
            config: self.config,
        })
    }

    /// Train on samples
    pub fn train_samples(self, samples: &[Sample]) -> Result<TrainedDetector> {
        self.config.validate()?;
        let dataset = LabeledDataset::from_samples(samples.to_vec())?;
        self.train(&dataset)
    }

    /// Train from CSV file (automatically detects headers)
    pub fn train_from_csv<P: AsRef<Path>>(self, path: P) -> Result<TrainedDetector> {
        self.config.validate()?;
        let dataset = CSVDataset::from_file(path)?;
        self.train(&dataset)
    }
}

/// Trained detector with high-level scoring interface
#[derive(Debug, Clone)]
pub struct TrainedDetector {
    model: TrainedModel,
    config: DetectorConfig,
}

impl TrainedDetector {
    /// Score every row of an observation matrix
    pub fn score(&self, samples: &DMatrix<f64>) -> Result<Vec<f64>> {
        score_with(&self.model, &self.config, samples)
    }

    /// Score samples (labels are ignored)
    pub fn score_samples(&self, samples: &[Sample]) -> Result<Vec<f64>> {
        if let Some(bad) = samples.iter().find(|s| s.dim() != self.model.dim()) {
            return Err(KMSDError::DimensionMismatch {
                expected: self.model.dim(),
                actual: bad.dim(),
            });
        }
        self.score(&rows_to_matrix(samples, self.model.dim()))
    }

    /// Score every sample of a dataset
    pub fn score_dataset<D: Dataset>(&self, dataset: &D) -> Result<Vec<f64>> {
        if dataset.is_empty() {
            return Ok(Vec::new());
        }
        if dataset.dim() != self.model.dim() {
            return Err(KMSDError::DimensionMismatch {
                expected: self.model.dim(),
                actual: dataset.dim(),
            });
        }
        self.score(&dataset.observations())
    }

    /// Score an unlabeled CSV file
    pub fn score_from_csv<P: AsRef<Path>>(&self, path: P) -> Result<Vec<f64>> {
        let observations = load_observations(path, false)?;
        self.score(&observations)
    }

    /// Score and threshold every row
    pub fn detect(&self, samples: &DMatrix<f64>, threshold: f64) -> Result<Vec<Detection>> {
        Ok(self
            .score(samples)?
            .into_iter()
            .map(|statistic| Detection::new(statistic, threshold))
            .collect())
    }

    /// Score a labeled dataset and compare against its labels
    pub fn evaluate<D: Dataset>(&self, dataset: &D) -> Result<DetectionMetrics> {
        let scores = self.score_dataset(dataset)?;
        DetectionMetrics::new(scores, dataset.get_labels())
    }

    /// Evaluate on a labeled CSV file
    pub fn evaluate_from_csv<P: AsRef<Path>>(&self, path: P) -> Result<DetectionMetrics> {
        let dataset = CSVDataset::from_file(path)?;
        self.evaluate(&dataset)
    }

    /// Get model information
    pub fn info(&self) -> ModelInfo {
        self.model.info()
    }

    /// Configuration the detector was trained with
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Get the underlying trained model
    pub fn inner(&self) -> &TrainedModel {
        &self.model
    }
}

fn score_with(
    model: &TrainedModel,
    config: &DetectorConfig,
    samples: &DMatrix<f64>,
) -> Result<Vec<f64>> {
    if config.parallel {
        pipeline::score_parallel(model, samples, config.chunk_size)
    } else {
        pipeline::score(model, samples, config.chunk_size)
    }
}

/// Detector with an explicit `Untrained -> Trained` lifecycle
///
/// Training happens once; the trained model is read-only afterwards.
#[derive(Debug, Clone)]
pub struct Detector {
    config: DetectorConfig,
    model: Option<TrainedModel>,
}

impl Detector {
    /// Create an untrained detector with a validated configuration
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            model: None,
        })
    }

    /// Train the detector; fails if it has already been trained
    pub fn fit<D: Dataset>(&mut self, dataset: &D) -> Result<&TrainedModel> {
        if self.model.is_some() {
            return Err(KMSDError::ModelAlreadyTrained);
        }
        let model = pipeline::train(&self.config, dataset)?;
        Ok(&*self.model.insert(model))
    }

    /// Score every row of an observation matrix
    pub fn score(&self, samples: &DMatrix<f64>) -> Result<Vec<f64>> {
        let model = self.model.as_ref().ok_or(KMSDError::ModelNotTrained)?;
        score_with(model, &self.config, samples)
    }

    /// Whether `fit` has completed
    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    /// The trained model, if any
    pub fn model(&self) -> Option<&TrainedModel> {
        self.model.as_ref()
    }

    /// Detector configuration
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }
}

/// Detection quality of a set of statistics against known labels
#[derive(Debug, Clone)]
pub struct DetectionMetrics {
    scores: Vec<f64>,
    labels: Vec<ClassLabel>,
    auc: f64,
}

impl DetectionMetrics {
    /// Pair statistics with labels; both classes must be present
    pub fn new(scores: Vec<f64>, labels: Vec<ClassLabel>) -> Result<Self> {
        if scores.len() != labels.len() {
            return Err(KMSDError::DimensionMismatch {
                expected: labels.len(),
                actual: scores.len(),
            });
        }
        for label in [ClassLabel::Target, ClassLabel::Background] {
            if !labels.contains(&label) {
                return Err(KMSDError::MissingClass { label });
            }
        }

        let auc = roc_auc(&scores, &labels);
        Ok(Self {
            scores,
            labels,
            auc,
        })
    }

    /// Area under the ROC curve: the probability that a random target sample
    /// outscores a random background sample (ties count half)
    pub fn auc(&self) -> f64 {
        self.auc
    }

    /// Statistics in dataset order
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    /// Confusion counts when declaring `statistic >= threshold` a target
    pub fn at_threshold(&self, threshold: f64) -> ConfusionMatrix {
        let mut confusion = ConfusionMatrix::default();
        for (&score, &label) in self.scores.iter().zip(&self.labels) {
            match (score >= threshold, label) {
                (true, ClassLabel::Target) => confusion.true_positives += 1,
                (false, ClassLabel::Background) => confusion.true_negatives += 1,
                (true, ClassLabel::Background) => confusion.false_positives += 1,
                (false, ClassLabel::Target) => confusion.false_negatives += 1,
            }
        }
        confusion
    }
}

/// Mann-Whitney estimate of the ROC AUC with midranks for ties
fn roc_auc(scores: &[f64], labels: &[ClassLabel]) -> f64 {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based midrank of the tie group i..=j
        let midrank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = midrank;
        }
        i = j + 1;
    }

    let n_target = labels.iter().filter(|&&l| l == ClassLabel::Target).count() as f64;
    let n_background = labels.len() as f64 - n_target;
    let target_rank_sum: f64 = ranks
        .iter()
        .zip(labels)
        .filter(|(_, &l)| l == ClassLabel::Target)
        .map(|(r, _)| r)
        .sum();

    (target_rank_sum - n_target * (n_target + 1.0) / 2.0) / (n_target * n_background)
}

/// Confusion counts at a fixed threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub true_positives: usize,
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl ConfusionMatrix {
    /// Calculate accuracy: (TP + TN) / (TP + TN + FP + FN)
    pub fn accuracy(&self) -> f64 {
        let total =
            self.true_positives + self.true_negatives + self.false_positives + self.false_negatives;
        ratio(self.true_positives + self.true_negatives, total)
    }

    /// Calculate precision: TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        ratio(
            self.true_positives,
            self.true_positives + self.false_positives,
        )
    }

    /// Calculate recall (detection rate): TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        ratio(
            self.true_positives,
            self.true_positives + self.false_negatives,
        )
    }

    /// Calculate F1 score: 2 * (precision * recall) / (precision + recall)
    pub fn f1_score(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * (p * r) / (p + r)
        }
    }

    /// Calculate specificity: TN / (TN + FP)
    pub fn specificity(&self) -> f64 {
        ratio(
            self.true_negatives,
            self.true_negatives + self.false_positives,
        )
    }

    /// False alarm rate: FP / (FP + TN)
    pub fn false_alarm_rate(&self) -> f64 {
        ratio(
            self.false_positives,
            self.false_positives + self.true_negatives,
        )
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Convenience functions for quick operations
pub mod quick {
    use super::*;

    /// Train a detector on CSV data with default parameters and the given sigma
    pub fn train_csv<P: AsRef<Path>>(path: P, sigma: f64) -> Result<TrainedDetector> {
        KMSD::new().with_sigma(sigma).train_from_csv(path)
    }

    /// Quick evaluation: train on one labeled CSV file, return the AUC on another
    pub fn evaluate_split<P1: AsRef<Path>, P2: AsRef<Path>>(
        train_path: P1,
        test_path: P2,
        sigma: f64,
    ) -> Result<f64> {
        let detector = train_csv(train_path, sigma)?;
        Ok(detector.evaluate_from_csv(test_path)?.auc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn training_samples() -> Vec<Sample> {
        let mut samples = Vec::new();
        for i in 0..15 {
            let t = i as f64;
            samples.push(Sample::target(vec![
                3.0 + 0.4 * (t * 1.1).sin(),
                3.0 + 0.4 * (t * 0.6).cos(),
            ]));
            samples.push(Sample::background(vec![
                0.4 * (t * 0.8).cos(),
                0.4 * (t * 1.9).sin(),
            ]));
        }
        samples
    }

    #[test]
    fn test_builder_pattern() {
        let builder = KMSD::new()
            .with_sigma(2.0)
            .with_energy_threshold(0.8)
            .with_chunk_size(64)
            .with_parallel(false)
            .with_rcond(1e-10);

        assert_eq!(builder.config().sigma, 2.0);
        assert_eq!(builder.config().energy_threshold, 0.8);
        assert_eq!(builder.config().chunk_size, 64);
        assert!(!builder.config().parallel);
        assert_eq!(builder.config().rcond, 1e-10);
    }

    #[test]
    fn test_train_and_score() {
        let detector = KMSD::new()
            .with_sigma(0.5)
            .train_samples(&training_samples())
            .expect("Training should succeed");

        let probes = vec![Sample::target(vec![3.0, 3.0]), Sample::background(vec![0.0, 0.0])];
        let scores = detector.score_samples(&probes).unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores[0] > scores[1]);

        let info = detector.info();
        assert_eq!(info.n_target, 15);
        assert_eq!(info.n_background, 15);
        assert_eq!(info.gamma_size, info.tau_columns + info.beta_columns);
    }

    #[test]
    fn test_invalid_sigma_rejected() {
        let result = KMSD::new().with_sigma(0.0).train_samples(&training_samples());
        assert!(matches!(result, Err(KMSDError::InvalidParameter(_))));

        let result = KMSD::new().with_sigma(-1.0).train_from_csv("/nonexistent/file.csv");
        assert!(matches!(result, Err(KMSDError::InvalidParameter(_))));
    }

    #[test]
    fn test_detect_thresholds() {
        let detector = KMSD::new()
            .with_sigma(0.5)
            .train_samples(&training_samples())
            .unwrap();
        let probes = DMatrix::from_row_slice(2, 2, &[3.0, 3.0, 0.0, 0.0]);
        let scores = detector.score(&probes).unwrap();
        let threshold = (scores[0] + scores[1]) / 2.0;

        let detections = detector.detect(&probes, threshold).unwrap();
        assert!(detections[0].is_target);
        assert!(!detections[1].is_target);
    }

    #[test]
    fn test_evaluate_on_training_data() {
        let samples = training_samples();
        let detector = KMSD::new().with_sigma(0.5).train_samples(&samples).unwrap();
        let dataset = LabeledDataset::from_samples(samples).unwrap();

        let metrics = detector.evaluate(&dataset).unwrap();
        assert_relative_eq!(metrics.auc(), 1.0);
        assert_eq!(metrics.scores().len(), 30);
    }

    #[test]
    fn test_score_dimension_mismatch() {
        let detector = KMSD::new()
            .with_sigma(0.5)
            .train_samples(&training_samples())
            .unwrap();
        let result = detector.score_samples(&[Sample::target(vec![1.0, 2.0, 3.0])]);
        assert!(matches!(
            result,
            Err(KMSDError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_score_empty_dataset() {
        let detector = KMSD::new()
            .with_sigma(0.5)
            .train_samples(&training_samples())
            .unwrap();
        let empty = LabeledDataset::default();
        assert!(detector.score_dataset(&empty).unwrap().is_empty());
        assert!(detector.score_samples(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_detector_lifecycle() {
        let mut detector = Detector::new(DetectorConfig::new(0.5).unwrap()).unwrap();
        assert!(!detector.is_trained());
        assert!(detector.model().is_none());

        let probes = DMatrix::from_row_slice(1, 2, &[3.0, 3.0]);
        assert!(matches!(
            detector.score(&probes),
            Err(KMSDError::ModelNotTrained)
        ));

        let dataset = LabeledDataset::from_samples(training_samples()).unwrap();
        detector.fit(&dataset).unwrap();
        assert!(detector.is_trained());
        assert_eq!(detector.score(&probes).unwrap().len(), 1);

        assert!(matches!(
            detector.fit(&dataset),
            Err(KMSDError::ModelAlreadyTrained)
        ));
    }

    #[test]
    fn test_detector_rejects_invalid_config() {
        let config = DetectorConfig {
            sigma: 0.0,
            ..DetectorConfig::default()
        };
        assert!(matches!(
            Detector::new(config),
            Err(KMSDError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_roc_auc() {
        use ClassLabel::{Background as B, Target as T};

        assert_relative_eq!(roc_auc(&[0.9, 0.8, 0.2, 0.1], &[T, T, B, B]), 1.0);
        assert_relative_eq!(roc_auc(&[0.1, 0.2, 0.8, 0.9], &[T, T, B, B]), 0.0);
        assert_relative_eq!(roc_auc(&[0.5, 0.5, 0.5, 0.5], &[T, B, T, B]), 0.5);
        // One of four target/background pairs is misordered
        assert_relative_eq!(roc_auc(&[0.9, 0.3, 0.4, 0.1], &[T, T, B, B]), 0.75);
    }

    #[test]
    fn test_detection_metrics_requires_both_classes() {
        let result = DetectionMetrics::new(vec![0.1, 0.2], vec![ClassLabel::Target; 2]);
        assert!(matches!(
            result,
            Err(KMSDError::MissingClass {
                label: ClassLabel::Background
            })
        ));
    }

    #[test]
    fn test_confusion_matrix() {
        use ClassLabel::{Background as B, Target as T};

        let metrics =
            DetectionMetrics::new(vec![0.9, 0.6, 0.4, 0.7, 0.1], vec![T, T, T, B, B]).unwrap();
        let confusion = metrics.at_threshold(0.5);

        assert_eq!(confusion.true_positives, 2);
        assert_eq!(confusion.false_negatives, 1);
        assert_eq!(confusion.false_positives, 1);
        assert_eq!(confusion.true_negatives, 1);
        assert_relative_eq!(confusion.accuracy(), 0.6);
        assert_relative_eq!(confusion.precision(), 2.0 / 3.0);
        assert_relative_eq!(confusion.recall(), 2.0 / 3.0);
        assert_relative_eq!(confusion.specificity(), 0.5);
        assert_relative_eq!(confusion.false_alarm_rate(), 0.5);
        assert!(confusion.f1_score() > 0.0);
    }

    #[test]
    fn test_quick_evaluate_split() {
        let mut train_file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(train_file, "x,y,label").unwrap();
        for sample in training_samples() {
            writeln!(
                train_file,
                "{},{},{}",
                sample.features[0],
                sample.features[1],
                sample.label.as_index()
            )
            .unwrap();
        }
        train_file.flush().unwrap();

        let mut test_file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(test_file, "3.1,2.9,1").unwrap();
        writeln!(test_file, "2.8,3.2,1").unwrap();
        writeln!(test_file, "0.1,-0.1,0").unwrap();
        writeln!(test_file, "-0.2,0.2,0").unwrap();
        test_file.flush().unwrap();

        let auc = quick::evaluate_split(train_file.path(), test_file.path(), 0.5).unwrap();
        assert_relative_eq!(auc, 1.0);
    }
}
