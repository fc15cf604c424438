//! Cross-subspace correlation (Gamma) matrix
//!
//! ```text
//! Gamma = [ Tauᵗ·Kt_t·Tau     Tauᵗ·Kt_b·Beta  ]
//!         [ Betaᵗ·Kb_t·Tau    Betaᵗ·Kb_b·Beta ]
//! ```

use crate::core::{KMSDError, Result};
use nalgebra::{DMatrix, Dyn, SVD};

const MAX_SVD_SWEEPS_PER_ROW: usize = 100;

/// Assemble Gamma from the target/background bases and the four kernel blocks.
///
/// `tau` is nt x ct, `beta` is nb x cb; the kernel blocks are target-target
/// (nt x nt), target-background (nt x nb), background-target (nb x nt) and
/// background-background (nb x nb). The result is (ct + cb) square.
pub fn build_gamma(
    tau: &DMatrix<f64>,
    beta: &DMatrix<f64>,
    kt_t: &DMatrix<f64>,
    kt_b: &DMatrix<f64>,
    kb_t: &DMatrix<f64>,
    kb_b: &DMatrix<f64>,
) -> Result<DMatrix<f64>> {
    let (nt, ct) = tau.shape();
    let (nb, cb) = beta.shape();

    check_shape(kt_t, (nt, nt))?;
    check_shape(kt_b, (nt, nb))?;
    check_shape(kb_t, (nb, nt))?;
    check_shape(kb_b, (nb, nb))?;

    let mut gamma = DMatrix::zeros(ct + cb, ct + cb);
    gamma
        .view_mut((0, 0), (ct, ct))
        .copy_from(&(tau.tr_mul(kt_t) * tau));
    gamma
        .view_mut((0, ct), (ct, cb))
        .copy_from(&(tau.tr_mul(kt_b) * beta));
    gamma
        .view_mut((ct, 0), (cb, ct))
        .copy_from(&(beta.tr_mul(kb_t) * tau));
    gamma
        .view_mut((ct, ct), (cb, cb))
        .copy_from(&(beta.tr_mul(kb_b) * beta));

    Ok(gamma)
}

/// Ratio of the smallest to the largest singular value of `gamma`
pub fn reciprocal_condition(gamma: &DMatrix<f64>) -> Result<f64> {
    let singular_values = singular_values(gamma)?;
    Ok(rcond_of(&singular_values))
}

/// Invert Gamma through its SVD.
///
/// Fails with `NumericalInstability` when the SVD does not converge, produces
/// non-finite values, or the reciprocal condition number falls below `min_rcond`.
/// With `min_rcond == 0` singular directions are dropped, giving the
/// Moore-Penrose inverse.
pub fn invert_gamma(gamma: &DMatrix<f64>, min_rcond: f64) -> Result<DMatrix<f64>> {
    if !gamma.is_square() {
        return Err(KMSDError::DimensionMismatch {
            expected: gamma.nrows(),
            actual: gamma.ncols(),
        });
    }

    let svd = decompose(gamma, true)?;
    let rcond = rcond_of(svd.singular_values.as_slice());
    if min_rcond > 0.0 && rcond <= min_rcond {
        return Err(KMSDError::NumericalInstability(format!(
            "Gamma is singular or ill-conditioned (rcond = {rcond:e}, required > {min_rcond:e})"
        )));
    }

    let inverse = svd
        .pseudo_inverse(0.0)
        .map_err(|e| KMSDError::NumericalInstability(format!("Gamma inversion failed: {e}")))?;

    if inverse.iter().any(|v| !v.is_finite()) {
        return Err(KMSDError::NumericalInstability(
            "Gamma inverse contains non-finite values".to_string(),
        ));
    }
    Ok(inverse)
}

fn decompose(gamma: &DMatrix<f64>, vectors: bool) -> Result<SVD<f64, Dyn, Dyn>> {
    if gamma.iter().any(|v| !v.is_finite()) {
        return Err(KMSDError::NumericalInstability(
            "Gamma contains non-finite entries".to_string(),
        ));
    }

    let n = gamma.nrows().max(1);
    let svd = gamma
        .clone()
        .try_svd(vectors, vectors, f64::EPSILON, MAX_SVD_SWEEPS_PER_ROW * n)
        .ok_or_else(|| {
            KMSDError::NumericalInstability("SVD of Gamma did not converge".to_string())
        })?;

    if svd.singular_values.iter().any(|v| !v.is_finite()) {
        return Err(KMSDError::NumericalInstability(
            "SVD of Gamma produced non-finite singular values".to_string(),
        ));
    }
    Ok(svd)
}

fn singular_values(gamma: &DMatrix<f64>) -> Result<Vec<f64>> {
    Ok(decompose(gamma, false)?.singular_values.iter().copied().collect())
}

fn rcond_of(singular_values: &[f64]) -> f64 {
    let max = singular_values.iter().copied().fold(0.0_f64, f64::max);
    let min = singular_values
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    if max > 0.0 {
        min / max
    } else {
        0.0
    }
}

fn check_shape(block: &DMatrix<f64>, expected: (usize, usize)) -> Result<()> {
    let (rows, cols) = block.shape();
    if rows != expected.0 {
        return Err(KMSDError::DimensionMismatch {
            expected: expected.0,
            actual: rows,
        });
    }
    if cols != expected.1 {
        return Err(KMSDError::DimensionMismatch {
            expected: expected.1,
            actual: cols,
        });
    }
    Ok(())
}
