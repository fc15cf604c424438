//! Training and batch-scoring pipeline
//!
//! Training is one-shot: split the dataset into target and background
//! libraries, compute the kernel blocks, build the Delta/Tau/Beta bases and
//! Gamma. Scoring splits large inputs into contiguous row chunks; each chunk
//! depends only on the model and its own rows, so chunked and whole-batch
//! results agree.

pub mod model;

pub use self::model::*;

use crate::core::{
    validate_chunk_size, ClassLabel, Dataset, DetectorConfig, KMSDError, Result,
};
use crate::detector::gamma::{build_gamma, invert_gamma, reciprocal_condition};
use crate::detector::statistic::{check_dim, statistic_with_inverse};
use crate::kernel::RBFKernel;
use crate::subspace::energy_basis;
use log::{debug, warn};
use nalgebra::DMatrix;
use rayon::prelude::*;

/// Train a model on a labeled dataset
pub fn train<D: Dataset>(config: &DetectorConfig, dataset: &D) -> Result<TrainedModel> {
    config.validate()?;

    let zt = dataset.class_observations(ClassLabel::Target);
    let zb = dataset.class_observations(ClassLabel::Background);
    train_libraries(config, zt, zb)
}

/// Train a model from explicit target (`zt`) and background (`zb`) libraries
pub fn train_libraries(
    config: &DetectorConfig,
    zt: DMatrix<f64>,
    zb: DMatrix<f64>,
) -> Result<TrainedModel> {
    config.validate()?;

    if zt.nrows() == 0 {
        return Err(KMSDError::MissingClass {
            label: ClassLabel::Target,
        });
    }
    if zb.nrows() == 0 {
        return Err(KMSDError::MissingClass {
            label: ClassLabel::Background,
        });
    }
    if zt.ncols() != zb.ncols() {
        return Err(KMSDError::DimensionMismatch {
            expected: zt.ncols(),
            actual: zb.ncols(),
        });
    }

    let (nt, nb, dim) = (zt.nrows(), zb.nrows(), zt.ncols());
    debug!("Training on {nt} target and {nb} background samples, {dim} features");

    // Target rows first: every block index below relies on it
    let mut ztb = DMatrix::zeros(nt + nb, dim);
    ztb.rows_mut(0, nt).copy_from(&zt);
    ztb.rows_mut(nt, nb).copy_from(&zb);

    let kernel = RBFKernel::new(config.sigma)?;
    let kt_t = kernel.gram(&zt, &zt)?;
    let kb_b = kernel.gram(&zb, &zb)?;
    let kt_b = kernel.gram(&zt, &zb)?;
    let kb_t = kt_b.transpose();
    let joint = joint_kernel(&kt_t, &kt_b, &kb_t, &kb_b);

    let delta = energy_basis(&joint, config.energy_threshold)?;
    let tau = energy_basis(&kt_t, config.energy_threshold)?;
    let beta = energy_basis(&kb_b, config.energy_threshold)?;
    debug!(
        "Basis columns: delta={} ({:.3} energy), tau={} ({:.3}), beta={} ({:.3})",
        delta.len(),
        delta.captured_energy(),
        tau.len(),
        tau.captured_energy(),
        beta.len(),
        beta.captured_energy()
    );

    let delta = delta.into_vectors();
    let tau = tau.into_vectors();
    let beta = beta.into_vectors();
    let gamma = build_gamma(&tau, &beta, &kt_t, &kt_b, &kb_t, &kb_b)?;

    let gamma_rcond = reciprocal_condition(&gamma).ok();
    match (gamma_condition(gamma_rcond, config.rcond), gamma_rcond) {
        (GammaCondition::Rejected, Some(rcond)) => warn!(
            "Gamma is ill-conditioned (rcond = {rcond:e} <= {:e}); scoring will fail",
            config.rcond
        ),
        (GammaCondition::NearBound, Some(rcond)) => warn!(
            "Gamma is close to the conditioning bound (rcond = {rcond:e}, bound {:e})",
            config.rcond
        ),
        (GammaCondition::Unavailable, _) => {
            warn!("SVD of Gamma did not converge; scoring will fail")
        }
        (_, rcond) => debug!("Gamma is {0}x{0}, rcond = {rcond:?}", gamma.nrows()),
    }

    Ok(TrainedModel {
        kernel,
        energy_threshold: config.energy_threshold,
        rcond: config.rcond,
        zt,
        zb,
        ztb,
        delta,
        tau,
        beta,
        kt_t,
        kb_b,
        kt_b,
        kb_t,
        gamma,
        gamma_rcond,
    })
}

/// A Gamma within this factor of the rcond bound is reported as near the bound
const NEAR_BOUND_FACTOR: f64 = 1e3;

/// How Gamma's reciprocal condition number relates to the configured bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GammaCondition {
    Healthy,
    NearBound,
    Rejected,
    Unavailable,
}

pub(crate) fn gamma_condition(rcond: Option<f64>, bound: f64) -> GammaCondition {
    match rcond {
        None => GammaCondition::Unavailable,
        Some(_) if bound <= 0.0 => GammaCondition::Healthy,
        Some(r) if r <= bound => GammaCondition::Rejected,
        Some(r) if r <= NEAR_BOUND_FACTOR * bound => GammaCondition::NearBound,
        Some(_) => GammaCondition::Healthy,
    }
}

/// Joint kernel [Kt_t Kt_b; Kb_t Kb_b], equal to kernel(Ztb, Ztb)
fn joint_kernel(
    kt_t: &DMatrix<f64>,
    kt_b: &DMatrix<f64>,
    kb_t: &DMatrix<f64>,
    kb_b: &DMatrix<f64>,
) -> DMatrix<f64> {
    let (nt, nb) = (kt_t.nrows(), kb_b.nrows());
    let mut joint = DMatrix::zeros(nt + nb, nt + nb);
    joint.view_mut((0, 0), (nt, nt)).copy_from(kt_t);
    joint.view_mut((0, nt), (nt, nb)).copy_from(kt_b);
    joint.view_mut((nt, 0), (nb, nt)).copy_from(kb_t);
    joint.view_mut((nt, nt), (nb, nb)).copy_from(kb_b);
    joint
}

/// Score every row of `samples`, at most `chunk_size` rows at a time.
///
/// Results keep the input row order.
pub fn score(model: &TrainedModel, samples: &DMatrix<f64>, chunk_size: usize) -> Result<Vec<f64>> {
    validate_chunk_size(chunk_size)?;
    check_dim(model, samples)?;
    let gamma_inv = invert_gamma(model.gamma(), model.rcond())?;

    let n = samples.nrows();
    if n <= chunk_size {
        return statistic_with_inverse(model, &gamma_inv, samples, 0);
    }

    debug!("Scoring {n} samples in chunks of {chunk_size}");
    let mut scores = Vec::with_capacity(n);
    for (start, len) in chunk_ranges(n, chunk_size) {
        let chunk = samples.rows(start, len).into_owned();
        scores.extend(statistic_with_inverse(model, &gamma_inv, &chunk, start)?);
    }
    Ok(scores)
}

/// Like [`score`], with chunks scored on the rayon thread pool
pub fn score_parallel(
    model: &TrainedModel,
    samples: &DMatrix<f64>,
    chunk_size: usize,
) -> Result<Vec<f64>> {
    validate_chunk_size(chunk_size)?;
    check_dim(model, samples)?;
    let gamma_inv = invert_gamma(model.gamma(), model.rcond())?;

    let n = samples.nrows();
    if n <= chunk_size {
        return statistic_with_inverse(model, &gamma_inv, samples, 0);
    }

    let ranges: Vec<(usize, usize)> = chunk_ranges(n, chunk_size).collect();
    debug!(
        "Scoring {n} samples in {} parallel chunks of {chunk_size}",
        ranges.len()
    );

    let chunks = ranges
        .into_par_iter()
        .map(|(start, len)| {
            let chunk = samples.rows(start, len).into_owned();
            statistic_with_inverse(model, &gamma_inv, &chunk, start)
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    Ok(chunks.concat())
}

/// Contiguous `(start, len)` row ranges covering `0..n`; the last may be shorter
pub fn chunk_ranges(n: usize, chunk_size: usize) -> impl Iterator<Item = (usize, usize)> {
    let step = chunk_size.max(1);
    (0..n)
        .step_by(step)
        .map(move |start| (start, step.min(n - start)))
}
