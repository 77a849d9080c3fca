//! Normalization Utilities
//!
//! Converts raw index values to 0-100 scores and health classes using
//! crop-specific threshold bands.

use crate::analysis::types::HealthStatus;
use crate::crops::IndexThresholds;

const BAND_SCORES: [f64; 6] = [0.0, 20.0, 40.0, 60.0, 80.0, 100.0];

fn breakpoints(t: &IndexThresholds) -> [f64; 6] {
    [
        t.critical - (t.poor - t.critical),
        t.critical,
        t.poor,
        t.moderate,
        t.good,
        t.good + (t.good - t.moderate),
    ]
}

/// Score a raw value against threshold bands using linear interpolation
///
/// Algorithm:
/// 1. Breakpoints are the four thresholds plus one band-width extension on
///    each side, mapped to scores 0, 20, 40, 60, 80, 100
/// 2. Find the bracketing breakpoints and interpolate linearly
/// 3. Values outside the extended range clamp to 0 or 100
pub fn band_score(value: f64, thresholds: &IndexThresholds) -> f64 {
    let values = breakpoints(thresholds);

    if value <= values[0] {
        return 0.0;
    }
    if value >= values[5] {
        return 100.0;
    }

    for i in 0..5 {
        if values[i] <= value && value <= values[i + 1] {
            let fraction = if values[i + 1] - values[i] > 0.0 {
                (value - values[i]) / (values[i + 1] - values[i])
            } else {
                0.0
            };
            return BAND_SCORES[i] + fraction * (BAND_SCORES[i + 1] - BAND_SCORES[i]);
        }
    }

    50.0
}

/// Classify a raw value directly against the thresholds
pub fn classify(value: f64, thresholds: &IndexThresholds) -> HealthStatus {
    if value < thresholds.critical {
        HealthStatus::Critical
    } else if value < thresholds.poor {
        HealthStatus::Poor
    } else if value < thresholds.moderate {
        HealthStatus::Moderate
    } else if value < thresholds.good {
        HealthStatus::Good
    } else {
        HealthStatus::Excellent
    }
}
