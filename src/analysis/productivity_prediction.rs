//! Productivity Outlook
//!
//! Short-horizon outlook combining where the canopy is heading (projected
//! NDVI against the crop's bands) with current health and weather risk.

use serde::{Deserialize, Serialize};

use crate::analysis::eos_analysis::{analyze_trend, project_trend, Projection};
use crate::analysis::types::{Confidence, Severity, TrendDirection};
use crate::analysis::vegetation_health::VegetationHealth;
use crate::config::AdvisorConfig;
use crate::crops::CropProfile;
use crate::data::{IndexKind, IndexSeries};
use crate::error::{AnalysisError, AnalysisResult};
use crate::utils::band_score;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outlook {
    Improving,
    Stable,
    Declining,
    AtRisk,
}

impl Outlook {
    pub fn display_text(&self) -> &'static str {
        match self {
            Outlook::Improving => "Improving",
            Outlook::Stable => "Stable",
            Outlook::Declining => "Declining",
            Outlook::AtRisk => "At risk",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductivityPrediction {
    pub horizon_days: u32,
    pub current_ndvi: f64,
    pub projected_ndvi: f64,
    pub projected_change: f64,
    /// Productivity index 0-100
    pub index: f64,
    pub outlook: Outlook,
    pub confidence: Confidence,
    pub projections: Vec<Projection>,
}

/// Project NDVI and rate the field's productivity over the configured horizon
pub fn predict_productivity(
    ndvi: &IndexSeries,
    crop: &CropProfile,
    health: &VegetationHealth,
    weather_risk: Severity,
    config: &AdvisorConfig,
) -> AnalysisResult<ProductivityPrediction> {
    if ndvi.kind != IndexKind::Ndvi {
        return Err(AnalysisError::InvalidInput(format!(
            "productivity needs an NDVI series, got {}",
            ndvi.kind
        )));
    }

    let horizon = config.projection_horizon_days;
    let trend = analyze_trend(ndvi, &config.trend)?;
    let projections = project_trend(&trend, horizon, &config.trend)?;
    let projected = projections.last().map(|p| p.value).unwrap_or(trend.current_value);
    let change = projected - trend.current_value;

    let canopy_score = band_score(projected, &crop.ndvi);
    let penalty = match weather_risk {
        Severity::Critical => 20.0,
        Severity::High => 10.0,
        _ => 0.0,
    };
    let index = (0.6 * canopy_score + 0.4 * health.score - penalty).clamp(0.0, 100.0);

    let stable_band = IndexKind::Ndvi.stable_slope_per_day() * horizon as f64;
    let outlook = if index < 40.0 || (trend.direction == TrendDirection::Decreasing && weather_risk >= Severity::High) {
        Outlook::AtRisk
    } else if change > stable_band {
        Outlook::Improving
    } else if change < -stable_band {
        Outlook::Declining
    } else {
        Outlook::Stable
    };

    Ok(ProductivityPrediction {
        horizon_days: horizon,
        current_ndvi: trend.current_value,
        projected_ndvi: projected,
        projected_change: change,
        index,
        outlook,
        confidence: trend.confidence,
        projections,
    })
}
