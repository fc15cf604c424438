//! Core traits for the detector

use crate::core::{ClassLabel, Sample};
use nalgebra::DMatrix;

/// Labeled dataset abstraction consumed by training and evaluation
pub trait Dataset: Send + Sync {
    /// Number of samples in the dataset
    fn len(&self) -> usize;

    /// Number of features (dimensionality)
    fn dim(&self) -> usize;

    /// Get a single sample by index
    ///
    /// # Panics
    /// Panics if index >= len()
    fn get_sample(&self, i: usize) -> Sample;

    /// Get all labels as a vector
    fn get_labels(&self) -> Vec<ClassLabel>;

    /// Check if the dataset is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All observations as an n x d matrix, one row per sample
    fn observations(&self) -> DMatrix<f64> {
        let samples: Vec<Sample> = (0..self.len()).map(|i| self.get_sample(i)).collect();
        rows_to_matrix(&samples, self.dim())
    }

    /// Observations with the given label, in dataset order
    fn class_observations(&self, label: ClassLabel) -> DMatrix<f64> {
        let samples: Vec<Sample> = (0..self.len())
            .map(|i| self.get_sample(i))
            .filter(|s| s.label == label)
            .collect();
        rows_to_matrix(&samples, self.dim())
    }
}

/// Stack sample feature vectors as matrix rows
pub(crate) fn rows_to_matrix(samples: &[Sample], dim: usize) -> DMatrix<f64> {
    DMatrix::from_row_iterator(
        samples.len(),
        dim,
        samples.iter().flat_map(|s| s.features.iter().copied()),
    )
}
