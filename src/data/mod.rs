//! Data loading and dataset implementations
//!
//! This module provides implementations of the Dataset trait: an in-memory
//! dataset and a dense CSV loader.

pub mod csv;

pub use self::csv::*;

use crate::core::{ClassLabel, Dataset, KMSDError, Result, Sample};
use nalgebra::DMatrix;

/// In-memory labeled dataset with a fixed feature dimension
#[derive(Debug, Clone, Default)]
pub struct LabeledDataset {
    samples: Vec<Sample>,
    dimensions: usize,
}

impl LabeledDataset {
    /// Build from samples; every sample must have the same number of features
    pub fn from_samples(samples: Vec<Sample>) -> Result<Self> {
        let dimensions = samples.first().map(Sample::dim).unwrap_or(0);
        if let Some(bad) = samples.iter().find(|s| s.dim() != dimensions) {
            return Err(KMSDError::DimensionMismatch {
                expected: dimensions,
                actual: bad.dim(),
            });
        }
        Ok(Self {
            samples,
            dimensions,
        })
    }

    /// Build from an n x d observation matrix and n labels
    pub fn from_matrix(observations: &DMatrix<f64>, labels: &[ClassLabel]) -> Result<Self> {
        if observations.nrows() != labels.len() {
            return Err(KMSDError::InvalidDataset(format!(
                "{} observations but {} labels",
                observations.nrows(),
                labels.len()
            )));
        }

        let samples = observations
            .row_iter()
            .zip(labels)
            .map(|(row, &label)| Sample::new(row.iter().copied().collect(), label))
            .collect();
        Ok(Self {
            samples,
            dimensions: observations.ncols(),
        })
    }

    /// All samples in insertion order
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples carrying `label`
    pub fn count(&self, label: ClassLabel) -> usize {
        self.samples.iter().filter(|s| s.label == label).count()
    }
}

impl Dataset for LabeledDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn dim(&self) -> usize {
        self.dimensions
    }

    fn get_sample(&self, i: usize) -> Sample {
        self.samples[i].clone()
    }

    fn get_labels(&self) -> Vec<ClassLabel> {
        self.samples.iter().map(|s| s.label).collect()
    }
}
