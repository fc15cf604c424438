//! Trained detector model

use crate::kernel::RBFKernel;
use nalgebra::DMatrix;
use serde::Serialize;

/// Immutable result of training.
///
/// Holds everything scoring needs: the kernel width, the three observation
/// libraries, the Delta/Tau/Beta bases, the four library kernel blocks and Gamma.
/// The joint library lists target rows first, then background rows.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub(crate) kernel: RBFKernel,
    pub(crate) energy_threshold: f64,
    pub(crate) rcond: f64,
    pub(crate) zt: DMatrix<f64>,
    pub(crate) zb: DMatrix<f64>,
    pub(crate) ztb: DMatrix<f64>,
    pub(crate) delta: DMatrix<f64>,
    pub(crate) tau: DMatrix<f64>,
    pub(crate) beta: DMatrix<f64>,
    pub(crate) kt_t: DMatrix<f64>,
    pub(crate) kb_b: DMatrix<f64>,
    pub(crate) kt_b: DMatrix<f64>,
    pub(crate) kb_t: DMatrix<f64>,
    pub(crate) gamma: DMatrix<f64>,
    pub(crate) gamma_rcond: Option<f64>,
}

impl TrainedModel {
    /// Kernel used for every library and scoring Gram matrix
    pub fn kernel(&self) -> &RBFKernel {
        &self.kernel
    }

    /// RBF width used for every kernel evaluation
    pub fn sigma(&self) -> f64 {
        self.kernel.sigma()
    }

    /// Spectral energy fraction the bases were truncated at
    pub fn energy_threshold(&self) -> f64 {
        self.energy_threshold
    }

    /// Smallest reciprocal condition number of Gamma accepted when scoring
    pub fn rcond(&self) -> f64 {
        self.rcond
    }

    /// Feature dimension of the libraries
    pub fn dim(&self) -> usize {
        self.ztb.ncols()
    }

    /// Target library (Zt)
    pub fn zt(&self) -> &DMatrix<f64> {
        &self.zt
    }

    /// Background library (Zb)
    pub fn zb(&self) -> &DMatrix<f64> {
        &self.zb
    }

    /// Joint library (Ztb)
    pub fn ztb(&self) -> &DMatrix<f64> {
        &self.ztb
    }

    /// Joint subspace basis
    pub fn delta(&self) -> &DMatrix<f64> {
        &self.delta
    }

    /// Target subspace basis
    pub fn tau(&self) -> &DMatrix<f64> {
        &self.tau
    }

    /// Background subspace basis
    pub fn beta(&self) -> &DMatrix<f64> {
        &self.beta
    }

    /// Target-target kernel block
    pub fn kt_t(&self) -> &DMatrix<f64> {
        &self.kt_t
    }

    /// Background-background kernel block
    pub fn kb_b(&self) -> &DMatrix<f64> {
        &self.kb_b
    }

    /// Target-background kernel block
    pub fn kt_b(&self) -> &DMatrix<f64> {
        &self.kt_b
    }

    /// Background-target kernel block
    pub fn kb_t(&self) -> &DMatrix<f64> {
        &self.kb_t
    }

    /// Cross-subspace correlation matrix
    pub fn gamma(&self) -> &DMatrix<f64> {
        &self.gamma
    }

    /// Summary of the model's sizes
    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            n_target: self.zt.nrows(),
            n_background: self.zb.nrows(),
            dim: self.dim(),
            sigma: self.kernel.sigma(),
            energy_threshold: self.energy_threshold,
            delta_columns: self.delta.ncols(),
            tau_columns: self.tau.ncols(),
            beta_columns: self.beta.ncols(),
            gamma_size: self.gamma.nrows(),
            gamma_rcond: self.gamma_rcond,
        }
    }
}

/// Model information
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub n_target: usize,
    pub n_background: usize,
    pub dim: usize,
    pub sigma: f64,
    pub energy_threshold: f64,
    pub delta_columns: usize,
    pub tau_columns: usize,
    pub beta_columns: usize,
    pub gamma_size: usize,
    /// `None` when the SVD of Gamma did not converge
    pub gamma_rcond: Option<f64>,
}
