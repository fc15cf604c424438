//! Detection stages: the Gamma correlation matrix and the likelihood-ratio statistic
//!
//! Free functions taking every matrix they need as an explicit argument, so each
//! stage can be exercised on its own.

pub mod gamma;
pub mod statistic;

pub use self::gamma::*;
pub use self::statistic::detection_statistic;
