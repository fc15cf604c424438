//! Kernel functions for the detector

pub mod rbf;

pub use self::rbf::*;
