//! RBF (Radial Basis Function) kernel implementation
//!
//! The detector uses a dimension-scaled RBF width:
//! K(x, y) = exp(-||x - y||² / (d * σ))
//! where d is the number of features and σ (sigma) the configured width.

use crate::core::{validate_sigma, KMSDError, Result};
use nalgebra::{DMatrix, DVector};

/// RBF kernel with the dimension-scaled width K(x, y) = exp(-||x - y||² / (d * σ))
///
/// Larger sigma widens the kernel, so distant observations still look similar.
/// The feature count d is taken from the inputs at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RBFKernel {
    sigma: f64,
}

impl RBFKernel {
    /// Create a new RBF kernel with the given sigma
    ///
    /// Fails with `InvalidParameter` unless sigma is positive and finite.
    pub fn new(sigma: f64) -> Result<Self> {
        validate_sigma(sigma)?;
        Ok(Self { sigma })
    }

    /// Get the sigma parameter
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Compute the Gram matrix between the rows of `x1` and `x2`
    pub fn gram(&self, x1: &DMatrix<f64>, x2: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        rbf_gram(x1, x2, self.sigma)
    }
}

/// Pairwise RBF similarities between the rows of `x1` (n1 x d) and `x2` (n2 x d)
///
/// Returns an n1 x n2 matrix. Squared distances use the expansion
/// ||a||² + ||b||² - 2a·b and are clamped at zero before exponentiation.
pub fn rbf_gram(x1: &DMatrix<f64>, x2: &DMatrix<f64>, sigma: f64) -> Result<DMatrix<f64>> {
    validate_sigma(sigma)?;

    let dim = x1.ncols();
    if x2.ncols() != dim {
        return Err(KMSDError::DimensionMismatch {
            expected: dim,
            actual: x2.ncols(),
        });
    }
    if dim == 0 {
        return Err(no_features());
    }

    let norms1 = row_norms_squared(x1);
    let norms2 = row_norms_squared(x2);
    let cross = x1 * x2.transpose();
    let width = dim as f64 * sigma;

    Ok(DMatrix::from_fn(x1.nrows(), x2.nrows(), |i, j| {
        // Cancellation can leave tiny negatives for (near-)identical rows
        let squared_distance = (norms1[i] + norms2[j] - 2.0 * cross[(i, j)]).max(0.0);
        (-squared_distance / width).exp()
    }))
}

fn row_norms_squared(x: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_iterator(x.nrows(), x.row_iter().map(|row| row.norm_squared()))
}

fn no_features() -> KMSDError {
    KMSDError::InvalidDataset("Observations must have at least one feature".to_string())
}
