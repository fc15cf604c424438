//! Subspace basis construction by spectral energy
//!
//! A kernel matrix is eigendecomposed and truncated to the smallest set of
//! leading eigenvectors whose normalized eigenvalues sum past an energy
//! threshold. The detector builds three such bases: Delta (joint library),
//! Tau (target library) and Beta (background library).

use crate::core::{KMSDError, Result};
use nalgebra::{DMatrix, SymmetricEigen};
use std::cmp::Ordering;

/// Upper bound on QR sweeps per matrix row before the eigensolver gives up
const MAX_SWEEPS_PER_ROW: usize = 100;

/// Orthonormal eigenvector basis of a kernel matrix
#[derive(Debug, Clone)]
pub struct SubspaceBasis {
    vectors: DMatrix<f64>,
    eigenvalues: Vec<f64>,
    captured_energy: f64,
}

impl SubspaceBasis {
    /// Basis vectors as columns, largest eigenvalue first
    pub fn vectors(&self) -> &DMatrix<f64> {
        &self.vectors
    }

    /// Consume the basis, keeping only the column matrix
    pub fn into_vectors(self) -> DMatrix<f64> {
        self.vectors
    }

    /// Eigenvalues of the selected columns, descending
    pub fn eigenvalues(&self) -> &[f64] {
        &self.eigenvalues
    }

    /// Fraction of the total spectral energy carried by the selected columns
    pub fn captured_energy(&self) -> f64 {
        self.captured_energy
    }

    /// Number of basis vectors
    pub fn len(&self) -> usize {
        self.vectors.ncols()
    }

    /// True when the basis has no columns (never produced by `energy_basis`)
    pub fn is_empty(&self) -> bool {
        self.vectors.ncols() == 0
    }
}

/// Build the minimal leading-eigenvector basis of `kernel` that captures more
/// than `threshold` of its spectral energy.
///
/// `kernel` must be square, symmetric and non-empty; `threshold` must lie in (0, 1).
pub fn energy_basis(kernel: &DMatrix<f64>, threshold: f64) -> Result<SubspaceBasis> {
    if !kernel.is_square() {
        return Err(KMSDError::DimensionMismatch {
            expected: kernel.nrows(),
            actual: kernel.ncols(),
        });
    }
    if kernel.is_empty() {
        return Err(KMSDError::EmptyDataset);
    }
    if !(threshold > 0.0 && threshold < 1.0) {
        return Err(KMSDError::InvalidParameter(format!(
            "Energy threshold must lie in (0, 1), got: {threshold}"
        )));
    }
    if kernel.iter().any(|v| !v.is_finite()) {
        return Err(KMSDError::NumericalInstability(
            "kernel matrix contains non-finite entries".to_string(),
        ));
    }

    let n = kernel.nrows();
    let eigen = SymmetricEigen::try_new(kernel.clone(), f64::EPSILON, MAX_SWEEPS_PER_ROW * n)
        .ok_or_else(|| {
            KMSDError::NumericalInstability(format!(
                "eigendecomposition of {n}x{n} kernel matrix did not converge"
            ))
        })?;

    if eigen.eigenvalues.iter().any(|v| !v.is_finite())
        || eigen.eigenvectors.iter().any(|v| !v.is_finite())
    {
        return Err(KMSDError::NumericalInstability(
            "eigendecomposition produced non-finite values".to_string(),
        ));
    }

    let total: f64 = eigen.eigenvalues.iter().sum();
    if !(total > 0.0 && total.is_finite()) {
        return Err(KMSDError::NumericalInstability(format!(
            "kernel spectrum has non-positive total energy: {total}"
        )));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .partial_cmp(&eigen.eigenvalues[a])
            .unwrap_or(Ordering::Equal)
    });

    let spectrum: Vec<f64> = order
        .iter()
        .map(|&i| eigen.eigenvalues[i] / total)
        .collect();
    let k = basis_size(&spectrum, threshold);

    let columns: Vec<_> = order[..k]
        .iter()
        .map(|&i| eigen.eigenvectors.column(i))
        .collect();

    Ok(SubspaceBasis {
        vectors: DMatrix::from_columns(&columns),
        eigenvalues: order[..k].iter().map(|&i| eigen.eigenvalues[i]).collect(),
        captured_energy: spectrum[..k].iter().sum(),
    })
}

/// Number of leading entries of a descending, normalized spectrum whose
/// cumulative sum first exceeds `threshold`.
///
/// Returns the full length when no prefix exceeds the threshold.
pub fn basis_size(spectrum: &[f64], threshold: f64) -> usize {
    let mut cumulative = 0.0;
    for (idx, &energy) in spectrum.iter().enumerate() {
        cumulative += energy;
        if cumulative > threshold {
            return idx + 1;
        }
    }
    spectrum.len()
}
