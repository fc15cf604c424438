//! Generalized likelihood-ratio detection statistic
//!
//! For a sample y with empirical kernel maps k_tb = K(Ztb, y), k_t = K(Zt, y)
//! and k_b = K(Zb, y):
//!
//! ```text
//! numerator   = ||Deltaᵗ k_tb||² - ||Betaᵗ k_b||²
//! denominator = ||Deltaᵗ k_tb||² - pᵗ Gamma⁻¹ p,   p = [Tauᵗ k_t; Betaᵗ k_b]
//! statistic   = numerator / denominator
//! ```
//!
//! Only the per-sample (diagonal) terms are formed, one column at a time.

use crate::core::{KMSDError, Result};
use crate::detector::invert_gamma;
use crate::pipeline::TrainedModel;
use nalgebra::DMatrix;

/// Score every row of `samples` against a trained model.
///
/// Inverts Gamma on each call; batch callers should go through
/// [`crate::pipeline::score`], which inverts once per batch.
pub fn detection_statistic(model: &TrainedModel, samples: &DMatrix<f64>) -> Result<Vec<f64>> {
    check_dim(model, samples)?;
    let gamma_inv = invert_gamma(model.gamma(), model.rcond())?;
    statistic_with_inverse(model, &gamma_inv, samples, 0)
}

pub(crate) fn check_dim(model: &TrainedModel, samples: &DMatrix<f64>) -> Result<()> {
    if samples.ncols() != model.dim() {
        return Err(KMSDError::DimensionMismatch {
            expected: model.dim(),
            actual: samples.ncols(),
        });
    }
    Ok(())
}

/// Statistic for each row of `samples` with a precomputed Gamma inverse.
///
/// `row_offset` is the index of the first row within the caller's full batch
/// and only appears in error messages.
pub(crate) fn statistic_with_inverse(
    model: &TrainedModel,
    gamma_inv: &DMatrix<f64>,
    samples: &DMatrix<f64>,
    row_offset: usize,
) -> Result<Vec<f64>> {
    check_dim(model, samples)?;
    let m = samples.nrows();
    if m == 0 {
        return Ok(Vec::new());
    }

    let kernel = model.kernel();
    let ktb_y = kernel.gram(model.ztb(), samples)?;
    let kb_y = kernel.gram(model.zb(), samples)?;
    let kt_y = kernel.gram(model.zt(), samples)?;

    let joint = model.delta().tr_mul(&ktb_y);
    let target = model.tau().tr_mul(&kt_y);
    let background = model.beta().tr_mul(&kb_y);

    let ct = target.nrows();
    let cb = background.nrows();
    let mut stacked = DMatrix::zeros(ct + cb, m);
    stacked.rows_mut(0, ct).copy_from(&target);
    stacked.rows_mut(ct, cb).copy_from(&background);
    let whitened = gamma_inv * &stacked;

    let mut statistics = Vec::with_capacity(m);
    for j in 0..m {
        let joint_energy = joint.column(j).norm_squared();
        let background_energy = background.column(j).norm_squared();
        let cross = stacked.column(j).dot(&whitened.column(j));

        let numerator = joint_energy - background_energy;
        let denominator = joint_energy - cross;
        let statistic = numerator / denominator;
        if !statistic.is_finite() {
            return Err(KMSDError::NumericalInstability(format!(
                "statistic for row {} is not finite (numerator {numerator:e}, denominator {denominator:e})",
                row_offset + j
            )));
        }
        statistics.push(statistic);
    }

    Ok(statistics)
}
