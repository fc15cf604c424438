//! Kernel matched subspace detection (KMSD)
//!
//! A two-class detector that maps observations into an RBF feature space,
//! models the target and background classes by low-rank kernel subspaces and
//! scores new observations with a generalized likelihood-ratio statistic.
//! Larger statistics mean the observation is more target-like.

pub mod api;
pub mod core;
pub mod data;
pub mod detector;
pub mod kernel;
pub mod pipeline;
pub mod subspace;

// Re-export main types for convenience
pub use crate::api::{ConfusionMatrix, DetectionMetrics, Detector, TrainedDetector, KMSD};
pub use crate::core::error::*;
pub use crate::core::traits::Dataset;
pub use crate::core::types::*;
pub use crate::data::{load_observations, CSVDataset, LabeledDataset};
pub use crate::detector::{build_gamma, detection_statistic, invert_gamma};
pub use crate::kernel::{rbf_gram, RBFKernel};
pub use crate::pipeline::{score, score_parallel, train, train_libraries, ModelInfo, TrainedModel};
pub use crate::subspace::{energy_basis, SubspaceBasis};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
