//! Index Time-Series Analysis
//!
//! Trend direction and velocity, anomaly detection and short-horizon
//! projection for satellite index series (NDVI, NDMI, ReCI, SMI).
//!
//! Series are short (tens of scenes) and noisy: cloud-contaminated scenes
//! are dropped first, the remainder is smoothed with a centered moving
//! average, and the trend is a least-squares line through the most recent
//! smoothed points.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::analysis::types::{Confidence, TrendDirection};
use crate::config::{TrendConfig, MAX_PROJECTION_DAYS};
use crate::data::{clean_observations, IndexKind, IndexSeries};
use crate::error::{AnalysisError, AnalysisResult};
use crate::utils::{linear_regression, mad, moving_average};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub kind: IndexKind,
    pub direction: TrendDirection,
    /// Slope of the fitted trend (index units per day)
    pub velocity_per_day: f64,
    pub weekly_change: f64,
    pub r_squared: f64,
    pub confidence: Confidence,
    /// Last smoothed value
    pub current_value: f64,
    /// Highest smoothed value in the series
    pub peak_value: f64,
    /// Smoothed change from first to last observation
    pub total_change: f64,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub points_used: usize,
    /// Days covered by the trend fit window
    pub fit_span_days: f64,
    pub residual_std: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Drop,
    Spike,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: IndexKind,
    pub date: NaiveDate,
    pub value: f64,
    /// Value interpolated from the neighbouring scenes
    pub expected: f64,
    pub z_score: f64,
    pub anomaly: AnomalyKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projection {
    pub date: NaiveDate,
    pub days_ahead: u32,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Cleaned series on a day axis
struct PreparedSeries {
    kind: IndexKind,
    dates: Vec<NaiveDate>,
    days: Vec<f64>,
    raw: Vec<f64>,
    smoothed: Vec<f64>,
}

fn prepare(series: &IndexSeries, config: &TrendConfig, needed: usize) -> AnalysisResult<PreparedSeries> {
    let cleaned = clean_observations(&series.observations, config.max_cloud_cover_pct);
    if cleaned.len() < needed {
        return Err(AnalysisError::InsufficientData {
            kind: series.kind,
            needed,
            got: cleaned.len(),
        });
    }

    let first = cleaned[0].date;
    let dates: Vec<NaiveDate> = cleaned.iter().map(|o| o.date).collect();
    let days: Vec<f64> = dates.iter().map(|d| (*d - first).num_days() as f64).collect();
    let raw: Vec<f64> = cleaned.iter().map(|o| o.value).collect();
    let smoothed = moving_average(&raw, config.smoothing_window);

    Ok(PreparedSeries { kind: series.kind, dates, days, raw, smoothed })
}

/// Fit the trend of an index series
///
/// Requires at least two scenes on distinct dates after cloud filtering.
pub fn analyze_trend(series: &IndexSeries, config: &TrendConfig) -> AnalysisResult<TrendAnalysis> {
    let prepared = prepare(series, config, 2)?;
    let n = prepared.raw.len();

    let start = n.saturating_sub(config.fit_points.max(2));
    let x = &prepared.days[start..];
    let y = &prepared.smoothed[start..];

    let fit = linear_regression(x, y).ok_or(AnalysisError::InsufficientData {
        kind: prepared.kind,
        needed: 2,
        got: 1,
    })?;

    let stable = prepared.kind.stable_slope_per_day();
    let direction = if fit.slope.abs() < stable {
        TrendDirection::Stable
    } else if fit.slope > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };

    let points_used = x.len();
    let confidence = if points_used < 4 {
        Confidence::Low
    } else if direction == TrendDirection::Stable {
        // A flat series has no variance to explain; judge by scatter instead
        if fit.residual_std <= prepared.kind.noise_floor() {
            Confidence::High
        } else {
            Confidence::Medium
        }
    } else if fit.r_squared < 0.3 {
        Confidence::Low
    } else if fit.r_squared < 0.7 {
        Confidence::Medium
    } else {
        Confidence::High
    };

    let current_value = prepared.smoothed[n - 1];
    let peak_value = prepared.smoothed.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Ok(TrendAnalysis {
        kind: prepared.kind,
        direction,
        velocity_per_day: fit.slope,
        weekly_change: fit.slope * 7.0,
        r_squared: fit.r_squared,
        confidence,
        current_value,
        peak_value,
        total_change: current_value - prepared.smoothed[0],
        first_date: prepared.dates[0],
        last_date: prepared.dates[n - 1],
        points_used,
        fit_span_days: x[x.len() - 1] - x[0],
        residual_std: fit.residual_std,
    })
}

/// Flag scenes that break sharply from their neighbours
///
/// Each interior scene is compared to the date-weighted interpolation of
/// the scenes either side. A candidate's residual is scaled robustly
/// (1.4826 × MAD of the other residuals, floored at the index noise level),
/// leaving out its immediate neighbours because a single drop inflates their
/// residuals too. Neighbours of a flagged scene are never flagged.
pub fn detect_anomalies(series: &IndexSeries, config: &TrendConfig) -> Vec<Anomaly> {
    let Ok(prepared) = prepare(series, config, 3) else {
        return Vec::new();
    };
    let n = prepared.raw.len();

    let mut candidates: Vec<(usize, f64, f64)> = Vec::with_capacity(n - 2);
    for i in 1..n - 1 {
        let (d0, d1, d2) = (prepared.days[i - 1], prepared.days[i], prepared.days[i + 1]);
        let (v0, v2) = (prepared.raw[i - 1], prepared.raw[i + 1]);
        let expected = v0 + (v2 - v0) * (d1 - d0) / (d2 - d0);
        candidates.push((i, expected, prepared.raw[i] - expected));
    }

    let mut ranked = candidates.clone();
    ranked.sort_by(|a, b| b.2.abs().total_cmp(&a.2.abs()));

    let mut flagged: Vec<usize> = Vec::new();
    let mut anomalies = Vec::new();
    for (i, expected, residual) in ranked {
        if flagged.iter().any(|f| f.abs_diff(i) <= 1) {
            continue;
        }

        let others: Vec<f64> = candidates
            .iter()
            .filter(|c| c.0.abs_diff(i) > 1)
            .map(|c| c.2)
            .collect();
        let scale = mad(&others)
            .map(|m| 1.4826 * m)
            .unwrap_or(0.0)
            .max(prepared.kind.noise_floor());

        let z = residual / scale;
        if z.abs() <= config.anomaly_z {
            continue;
        }

        flagged.push(i);
        anomalies.push(Anomaly {
            kind: prepared.kind,
            date: prepared.dates[i],
            value: prepared.raw[i],
            expected,
            z_score: z,
            anomaly: if z < 0.0 { AnomalyKind::Drop } else { AnomalyKind::Spike },
        });
    }

    anomalies.sort_by_key(|a| a.date);
    anomalies
}

/// Project a fitted trend forward
///
/// The slope decays by `damping` per day so projections flatten rather than
/// run off linearly; values and bands are clamped to the index range.
pub fn project_trend(
    trend: &TrendAnalysis,
    horizon_days: u32,
    config: &TrendConfig,
) -> AnalysisResult<Vec<Projection>> {
    if horizon_days == 0 {
        return Err(AnalysisError::InvalidInput("projection horizon must be at least 1 day".to_string()));
    }
    if horizon_days > MAX_PROJECTION_DAYS {
        return Err(AnalysisError::HorizonTooLong {
            requested: horizon_days,
            max: MAX_PROJECTION_DAYS,
        });
    }

    let step = config.projection_step_days.max(1);
    let mut offsets: Vec<u32> = (1..)
        .map(|k| k * step)
        .take_while(|t| *t < horizon_days)
        .collect();
    offsets.push(horizon_days);

    let (lo, hi) = trend.kind.valid_range();
    let sigma = trend.residual_std.max(trend.kind.noise_floor());
    let span = trend.fit_span_days.max(1.0);
    let d = config.damping;

    let projections = offsets
        .into_iter()
        .map(|t| {
            let tf = t as f64;
            let displacement = if d >= 1.0 {
                trend.velocity_per_day * tf
            } else {
                trend.velocity_per_day * d * (1.0 - d.powi(t as i32)) / (1.0 - d)
            };
            let value = (trend.current_value + displacement).clamp(lo, hi);
            let half_width = 1.96 * sigma * (1.0 + tf / span).sqrt();
            Projection {
                date: trend.last_date + Duration::days(t as i64),
                days_ahead: t,
                value,
                lower: (value - half_width).clamp(lo, hi),
                upper: (value + half_width).clamp(lo, hi),
            }
        })
        .collect();

    Ok(projections)
}

/// Fit and project a series in one step
pub fn project(series: &IndexSeries, horizon_days: u32, config: &TrendConfig) -> AnalysisResult<Vec<Projection>> {
    let trend = analyze_trend(series, config)?;
    project_trend(&trend, horizon_days, config)
}

/// Most recent usable value of a series
pub fn latest_value(series: &IndexSeries, config: &TrendConfig) -> Option<(NaiveDate, f64)> {
    clean_observations(&series.observations, config.max_cloud_cover_pct)
        .last()
        .map(|o| (o.date, o.value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Observation;
    use approx::assert_relative_eq;

    fn series(kind: IndexKind, points: &[(i64, f64)]) -> IndexSeries {
        let start = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        IndexSeries::new(
            kind,
            points
                .iter()
                .map(|(day, v)| Observation::new(start + Duration::days(*day), *v))
                .collect(),
        )
    }

    #[test]
    fn test_increasing_ndvi_trend() {
        let s = series(IndexKind::Ndvi, &[(0, 0.30), (5, 0.35), (10, 0.40), (15, 0.45), (20, 0.50), (25, 0.55)]);
        let trend = analyze_trend(&s, &TrendConfig::default()).unwrap();

        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert_relative_eq!(trend.velocity_per_day, 0.01, epsilon = 1e-9);
        assert_relative_eq!(trend.weekly_change, 0.07, epsilon = 1e-9);
        assert_eq!(trend.confidence, Confidence::High);
        assert_eq!(trend.points_used, 6);
    }

    #[test]
    fn test_flat_series_is_stable() {
        let s = series(IndexKind::Ndvi, &[(0, 0.70), (6, 0.71), (12, 0.70), (18, 0.69), (24, 0.70)]);
        let trend = analyze_trend(&s, &TrendConfig::default()).unwrap();

        assert_eq!(trend.direction, TrendDirection::Stable);
        assert_eq!(trend.confidence, Confidence::High);
    }

    #[test]
    fn test_declining_smi() {
        let s = series(IndexKind::Smi, &[(0, 0.5), (7, 0.0), (14, -0.5), (21, -1.0)]);
        let trend = analyze_trend(&s, &TrendConfig::default()).unwrap();
        assert_eq!(trend.direction, TrendDirection::Decreasing);
        assert!(trend.total_change < 0.0);
    }

    #[test]
    fn test_insufficient_data() {
        let s = series(IndexKind::Ndvi, &[(0, 0.5)]);
        let err = analyze_trend(&s, &TrendConfig::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { needed: 2, got: 1, .. }));
    }

    #[test]
    fn test_cloudy_scenes_excluded() {
        let start = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let s = IndexSeries::new(
            IndexKind::Ndvi,
            vec![
                Observation { date: start, value: 0.5, cloud_cover_pct: Some(90.0) },
                Observation { date: start + Duration::days(5), value: 0.55, cloud_cover_pct: Some(10.0) },
            ],
        );
        assert!(analyze_trend(&s, &TrendConfig::default()).is_err());
    }

    #[test]
    fn test_detects_single_drop() {
        let s = series(
            IndexKind::Ndvi,
            &[(0, 0.60), (5, 0.61), (10, 0.62), (15, 0.30), (20, 0.63), (25, 0.64), (30, 0.64)],
        );
        let anomalies = detect_anomalies(&s, &TrendConfig::default());

        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].anomaly, AnomalyKind::Drop);
        assert_eq!(anomalies[0].value, 0.30);
        assert!(anomalies[0].z_score < -2.5);
    }

    #[test]
    fn test_no_anomalies_in_smooth_series() {
        let s = series(IndexKind::Ndvi, &[(0, 0.3), (5, 0.35), (10, 0.4), (15, 0.45), (20, 0.5)]);
        assert!(detect_anomalies(&s, &TrendConfig::default()).is_empty());
        assert!(detect_anomalies(&series(IndexKind::Ndvi, &[(0, 0.3), (5, 0.1)]), &TrendConfig::default()).is_empty());
    }

    #[test]
    fn test_projection_steps_and_clamp() {
        let s = series(IndexKind::Ndvi, &[(0, 0.60), (5, 0.70), (10, 0.80), (15, 0.90), (20, 0.95)]);
        let projections = project(&s, 30, &TrendConfig::default()).unwrap();

        let offsets: Vec<u32> = projections.iter().map(|p| p.days_ahead).collect();
        assert_eq!(offsets, vec![7, 14, 21, 28, 30]);
        for p in &projections {
            assert!(p.value <= 1.0 && p.upper <= 1.0);
            assert!(p.lower <= p.value && p.value <= p.upper);
        }
    }

    #[test]
    fn test_projection_damped_below_linear() {
        let s = series(IndexKind::Ndvi, &[(0, 0.30), (5, 0.35), (10, 0.40), (15, 0.45), (20, 0.50), (25, 0.55)]);
        let config = TrendConfig::default();
        let trend = analyze_trend(&s, &config).unwrap();
        let projections = project_trend(&trend, 14, &config).unwrap();

        let last = projections.last().unwrap();
        let linear = trend.current_value + trend.velocity_per_day * 14.0;
        assert!(last.value > trend.current_value);
        assert!(last.value < linear);
    }

    #[test]
    fn test_projection_horizon_limits() {
        let s = series(IndexKind::Ndvi, &[(0, 0.3), (5, 0.35)]);
        let config = TrendConfig::default();
        assert!(matches!(project(&s, 0, &config), Err(AnalysisError::InvalidInput(_))));
        assert!(matches!(
            project(&s, 45, &config),
            Err(AnalysisError::HorizonTooLong { requested: 45, max: 30 })
        ));
    }
}
