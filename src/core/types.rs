//! Core type definitions for the detector

use crate::core::{KMSDError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Class of a training observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassLabel {
    /// Label 0: background clutter
    Background = 0,
    /// Label 1: the target class
    Target = 1,
}

impl ClassLabel {
    /// Map a raw numeric label: positive values are targets, everything else background.
    ///
    /// Accepts both the 0/1 and the -1/+1 conventions.
    pub fn from_value(value: f64) -> Self {
        if value > 0.0 {
            ClassLabel::Target
        } else {
            ClassLabel::Background
        }
    }

    /// Numeric label (0 or 1)
    pub fn as_index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassLabel::Background => write!(f, "background (label 0)"),
            ClassLabel::Target => write!(f, "target (label 1)"),
        }
    }
}

/// Labeled dense observation
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Feature vector
    pub features: Vec<f64>,
    /// Class label
    pub label: ClassLabel,
}

impl Sample {
    /// Create a new sample
    pub fn new(features: Vec<f64>, label: ClassLabel) -> Self {
        Self { features, label }
    }

    /// Shorthand for a target sample
    pub fn target(features: Vec<f64>) -> Self {
        Self::new(features, ClassLabel::Target)
    }

    /// Shorthand for a background sample
    pub fn background(features: Vec<f64>) -> Self {
        Self::new(features, ClassLabel::Background)
    }

    /// Number of features
    pub fn dim(&self) -> usize {
        self.features.len()
    }
}

/// Detection result containing the statistic and the thresholded decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    /// Generalized likelihood-ratio statistic
    pub statistic: f64,
    /// Whether the statistic reached the decision threshold
    pub is_target: bool,
}

impl Detection {
    /// Threshold a statistic
    pub fn new(statistic: f64, threshold: f64) -> Self {
        Self {
            statistic,
            is_target: statistic >= threshold,
        }
    }

    /// Decided class
    pub fn label(&self) -> ClassLabel {
        if self.is_target {
            ClassLabel::Target
        } else {
            ClassLabel::Background
        }
    }
}

/// Default fraction of spectral energy kept by each subspace basis
pub const DEFAULT_ENERGY_THRESHOLD: f64 = 0.9;

/// Default number of test rows scored per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default minimal reciprocal condition number accepted for Gamma
pub const DEFAULT_RCOND: f64 = 1e-12;

/// Configuration for training and scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// RBF width; the exponent is -||x - y||² / (d * sigma)
    pub sigma: f64,
    /// Fraction of spectral energy each basis must exceed
    pub energy_threshold: f64,
    /// Maximum number of test rows scored at once
    pub chunk_size: usize,
    /// Score chunks on the rayon thread pool
    pub parallel: bool,
    /// Smallest accepted reciprocal condition number of Gamma
    pub rcond: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sigma: 1.0,
            energy_threshold: DEFAULT_ENERGY_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            parallel: true,
            rcond: DEFAULT_RCOND,
        }
    }
}

impl DetectorConfig {
    /// Create a validated configuration with default settings and the given sigma
    pub fn new(sigma: f64) -> Result<Self> {
        let config = Self {
            sigma,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every field
    pub fn validate(&self) -> Result<()> {
        validate_sigma(self.sigma)?;

        if !(self.energy_threshold > 0.0 && self.energy_threshold < 1.0) {
            return Err(KMSDError::InvalidParameter(format!(
                "Energy threshold must lie in (0, 1), got: {}",
                self.energy_threshold
            )));
        }

        validate_chunk_size(self.chunk_size)?;

        if !(self.rcond >= 0.0 && self.rcond < 1.0) {
            return Err(KMSDError::InvalidParameter(format!(
                "rcond must lie in [0, 1), got: {}",
                self.rcond
            )));
        }

        Ok(())
    }
}

pub(crate) fn validate_sigma(sigma: f64) -> Result<()> {
    if sigma > 0.0 && sigma.is_finite() {
        Ok(())
    } else {
        Err(KMSDError::InvalidParameter(format!(
            "Sigma must be positive and finite, got: {sigma}"
        )))
    }
}

pub(crate) fn validate_chunk_size(chunk_size: usize) -> Result<()> {
    if chunk_size == 0 {
        Err(KMSDError::InvalidParameter(
            "Chunk size must be at least 1".to_string(),
        ))
    } else {
        Ok(())
    }
}
