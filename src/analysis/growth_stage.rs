//! Growth Stage Assessment
//!
//! Places the crop on its development calendar, preferably from thermal
//! time since sowing, otherwise from the shape of the NDVI curve, and
//! compares canopy vigor with what the stage should show.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::analysis::eos_analysis::TrendAnalysis;
use crate::analysis::types::{GrowthStage, TrendDirection};
use crate::analysis::weather_analysis::growing_degree_days;
use crate::crops::CropProfile;
use crate::data::{days_before, WeatherDay};

/// Window for the recent thermal-time rate (days)
const GDD_RATE_WINDOW: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageSource {
    ThermalTime,
    Canopy,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VigorClass {
    Behind,
    OnTrack,
    Ahead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthAssessment {
    pub stage: GrowthStage,
    pub source: StageSource,
    pub gdd_since_sowing: Option<f64>,
    /// Fraction of the current stage completed (0-1)
    pub stage_progress: Option<f64>,
    pub next_stage: Option<GrowthStage>,
    pub days_to_next_stage: Option<f64>,
    pub expected_ndvi: Option<f64>,
    pub current_ndvi: Option<f64>,
    pub vigor_ratio: Option<f64>,
    pub vigor: Option<VigorClass>,
    pub advice: String,
}

/// Expected NDVI for a stage as a fraction of the crop's peak reference
fn expected_ndvi_fraction(stage: GrowthStage) -> Option<f64> {
    match stage {
        GrowthStage::Dormant => None,
        GrowthStage::Emergence => Some(0.25),
        GrowthStage::Vegetative => Some(0.5),
        GrowthStage::RapidGrowth => Some(0.8),
        GrowthStage::Flowering => Some(1.0),
        GrowthStage::GrainFill => Some(0.9),
        GrowthStage::Maturity => Some(0.5),
    }
}

fn next_stage(stage: GrowthStage) -> Option<GrowthStage> {
    match stage {
        GrowthStage::Dormant => Some(GrowthStage::Emergence),
        GrowthStage::Emergence => Some(GrowthStage::Vegetative),
        GrowthStage::Vegetative => Some(GrowthStage::RapidGrowth),
        GrowthStage::RapidGrowth => Some(GrowthStage::Flowering),
        GrowthStage::Flowering => Some(GrowthStage::GrainFill),
        GrowthStage::GrainFill => Some(GrowthStage::Maturity),
        GrowthStage::Maturity => None,
    }
}

/// Stage reached after accumulating `gdd` since sowing
pub fn stage_from_gdd(crop: &CropProfile, gdd: f64) -> GrowthStage {
    GrowthStage::thermal_stages()
        .iter()
        .zip(crop.stage_gdd.iter())
        .filter(|(_, start)| gdd >= **start)
        .map(|(stage, _)| *stage)
        .last()
        .unwrap_or(GrowthStage::Dormant)
}

/// Phenophase read from the NDVI curve
pub fn stage_from_canopy(crop: &CropProfile, trend: &TrendAnalysis) -> GrowthStage {
    let reference = crop.ndvi_peak_reference;
    let current = trend.current_value;
    let peak = trend.peak_value;
    let had_canopy = peak >= 0.6 * reference;

    match trend.direction {
        TrendDirection::Increasing if current < 0.35 * reference => GrowthStage::Emergence,
        TrendDirection::Increasing if current < 0.7 * reference => GrowthStage::Vegetative,
        TrendDirection::Increasing => GrowthStage::RapidGrowth,
        _ if current < 0.2 => GrowthStage::Dormant,
        TrendDirection::Stable if current >= 0.8 * reference || (had_canopy && current >= 0.9 * peak) => {
            GrowthStage::Flowering
        }
        TrendDirection::Stable if had_canopy => GrowthStage::GrainFill,
        TrendDirection::Stable => GrowthStage::Vegetative,
        TrendDirection::Decreasing if had_canopy && current < 0.6 * peak => GrowthStage::Maturity,
        TrendDirection::Decreasing if had_canopy => GrowthStage::GrainFill,
        TrendDirection::Decreasing => GrowthStage::Vegetative,
    }
}

/// Locate the crop in its development cycle
pub fn assess_growth(
    crop: &CropProfile,
    sowing_date: Option<NaiveDate>,
    reference_date: NaiveDate,
    weather: &[WeatherDay],
    ndvi_trend: Option<&TrendAnalysis>,
) -> GrowthAssessment {
    let current_ndvi = ndvi_trend.map(|t| t.current_value);

    let season: Vec<&WeatherDay> = match sowing_date {
        Some(sowing) => weather
            .iter()
            .filter(|d| d.date >= sowing && d.date <= reference_date)
            .collect(),
        None => Vec::new(),
    };

    let mut assessment = GrowthAssessment {
        stage: GrowthStage::Dormant,
        source: StageSource::Unknown,
        gdd_since_sowing: None,
        stage_progress: None,
        next_stage: None,
        days_to_next_stage: None,
        expected_ndvi: None,
        current_ndvi,
        vigor_ratio: None,
        vigor: None,
        advice: String::new(),
    };

    match sowing_date {
        Some(sowing) if sowing > reference_date => {
            assessment.source = StageSource::ThermalTime;
            assessment.next_stage = Some(GrowthStage::Emergence);
        }
        Some(_) if !season.is_empty() => {
            let gdd: f64 = season.iter().map(|d| growing_degree_days(d, crop)).sum();
            let stage = stage_from_gdd(crop, gdd);
            let start = crop.stage_start_gdd(stage);
            let next = next_stage(stage);

            assessment.stage = stage;
            assessment.source = StageSource::ThermalTime;
            assessment.gdd_since_sowing = Some(gdd);
            assessment.next_stage = next;

            match next {
                Some(next) => {
                    let end = crop.stage_start_gdd(next);
                    let width = (end - start).max(1.0);
                    assessment.stage_progress = Some(((gdd - start) / width).clamp(0.0, 1.0));

                    let window_start = days_before(reference_date, GDD_RATE_WINDOW);
                    let recent: Vec<f64> = season
                        .iter()
                        .filter(|d| d.date > window_start)
                        .map(|d| growing_degree_days(d, crop))
                        .collect();
                    if !recent.is_empty() {
                        let rate = recent.iter().sum::<f64>() / recent.len() as f64;
                        if rate > 0.1 {
                            assessment.days_to_next_stage = Some(((end - gdd) / rate).max(0.0));
                        }
                    }
                }
                None => assessment.stage_progress = Some(1.0),
            }

            // Vigor against the stage is only meaningful when the stage
            // comes from thermal time rather than from the canopy itself
            assessment.expected_ndvi = expected_ndvi_fraction(stage).map(|f| f * crop.ndvi_peak_reference);
            if let (Some(expected), Some(current)) = (assessment.expected_ndvi, current_ndvi) {
                let ratio = current / expected;
                assessment.vigor_ratio = Some(ratio);
                assessment.vigor = Some(if ratio < 0.85 {
                    VigorClass::Behind
                } else if ratio > 1.15 {
                    VigorClass::Ahead
                } else {
                    VigorClass::OnTrack
                });
            }
        }
        _ => {
            if let Some(trend) = ndvi_trend {
                assessment.stage = stage_from_canopy(crop, trend);
                assessment.source = StageSource::Canopy;
                assessment.next_stage = next_stage(assessment.stage);
                assessment.expected_ndvi =
                    expected_ndvi_fraction(assessment.stage).map(|f| f * crop.ndvi_peak_reference);
            }
        }
    }

    assessment.advice = stage_advice(crop, &assessment);
    assessment
}

fn stage_advice(crop: &CropProfile, growth: &GrowthAssessment) -> String {
    let base = match growth.stage {
        GrowthStage::Dormant => "No active crop: plan soil preparation and base fertilization".to_string(),
        GrowthStage::Emergence => "Check stand establishment and weed pressure; avoid crusting after heavy rain".to_string(),
        GrowthStage::Vegetative => format!("Canopy building: first nitrogen top-dressing window for {}", crop.name.to_lowercase()),
        GrowthStage::RapidGrowth => "Peak nitrogen and water demand: complete top-dressing and keep soil moisture up".to_string(),
        GrowthStage::Flowering => "Most sensitive stage to heat and water stress: prioritize irrigation".to_string(),
        GrowthStage::GrainFill => "Yield is being set: avoid water deficit, no further nitrogen".to_string(),
        GrowthStage::Maturity => "Crop drying down: plan harvest logistics".to_string(),
    };

    match growth.vigor {
        Some(VigorClass::Behind) => format!("{}. Canopy is behind the expected development for this stage", base),
        Some(VigorClass::Ahead) => format!("{}. Canopy is ahead of the expected development", base),
        _ => base,
    }
}
