//! Utility modules for field analysis
//!
//! Contains shared functionality used across multiple analyses:
//! - Normalization: threshold-band scoring and classification
//! - Statistics: regression, smoothing and robust spread for short series

pub mod normalization;
pub mod statistics;

// Re-export commonly used items
pub use normalization::{band_score, classify};
pub use statistics::{linear_regression, mad, mean, median, moving_average, std_dev, LinearFit};
