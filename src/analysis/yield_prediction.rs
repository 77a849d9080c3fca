//! Yield Prediction
//!
//! Attainable yield scales with the canopy the crop has built (peak NDVI
//! relative to a healthy reference canopy). Stresses observed during the
//! season then remove a capped share each, combined multiplicatively.

use serde::{Deserialize, Serialize};

use crate::analysis::nitrogen_analysis::NitrogenAssessment;
use crate::analysis::types::{Confidence, GrowthStage};
use crate::analysis::vegetation_health::VegetationHealth;
use crate::analysis::weather_analysis::WeatherSummary;
use crate::crops::CropProfile;
use crate::error::{AnalysisError, AnalysisResult};

/// NDVI of bare soil, the zero point of the canopy factor
const BARE_SOIL_NDVI: f64 = 0.1;
const MAX_CANOPY_FACTOR: f64 = 1.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossFactor {
    Heat,
    Water,
    Nitrogen,
    Frost,
    Health,
}

impl LossFactor {
    pub fn display_text(&self) -> &'static str {
        match self {
            LossFactor::Heat => "Heat stress",
            LossFactor::Water => "Water deficit",
            LossFactor::Nitrogen => "Nitrogen shortage",
            LossFactor::Frost => "Frost damage",
            LossFactor::Health => "Poor crop health",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YieldLoss {
    pub factor: LossFactor,
    /// Fraction of yield lost (0-1)
    pub fraction: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YieldClass {
    AboveAverage,
    Average,
    BelowAverage,
}

/// Everything the yield model reads
#[derive(Debug, Clone, Copy)]
pub struct YieldInputs<'a> {
    pub peak_ndvi: f64,
    pub crop: &'a CropProfile,
    pub stage: GrowthStage,
    pub observation_count: usize,
    pub health: Option<&'a VegetationHealth>,
    pub weather: Option<&'a WeatherSummary>,
    pub nitrogen: Option<&'a NitrogenAssessment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YieldPrediction {
    pub expected_t_ha: f64,
    pub low_t_ha: f64,
    pub high_t_ha: f64,
    pub canopy_factor: f64,
    pub losses: Vec<YieldLoss>,
    /// Combined fraction lost to all stresses
    pub total_loss_fraction: f64,
    pub confidence: Confidence,
    pub class: YieldClass,
    /// Expected yield / reference yield
    pub relative_to_reference: f64,
    pub gross_value_eur_ha: f64,
}

impl YieldPrediction {
    pub fn loss(&self, factor: LossFactor) -> Option<f64> {
        self.losses.iter().find(|l| l.factor == factor).map(|l| l.fraction)
    }
}

fn stress_losses(inputs: &YieldInputs) -> Vec<YieldLoss> {
    let crop = inputs.crop;
    let mut losses = Vec::new();

    if let Some(weather) = inputs.weather {
        losses.push(YieldLoss {
            factor: LossFactor::Heat,
            fraction: (weather.heat_stress_days as f64 * 0.015).min(0.25),
        });

        let deficit = (-weather.water_balance_mm).max(0.0);
        if crop.seasonal_water_need_mm > 0.0 {
            losses.push(YieldLoss {
                factor: LossFactor::Water,
                fraction: (deficit / crop.seasonal_water_need_mm * crop.water_sensitivity).min(0.40),
            });
        }

        losses.push(YieldLoss {
            factor: LossFactor::Frost,
            fraction: (weather.frost_days as f64 * 0.04).min(0.30),
        });
    }

    if let Some(nitrogen) = inputs.nitrogen {
        losses.push(YieldLoss {
            factor: LossFactor::Nitrogen,
            fraction: ((1.0 - nitrogen.nni).max(0.0) * 0.5).min(0.30),
        });
    }

    if let Some(health) = inputs.health {
        if health.score < 50.0 {
            losses.push(YieldLoss {
                factor: LossFactor::Health,
                fraction: ((50.0 - health.score) / 200.0).min(0.20),
            });
        }
    }

    losses.retain(|l| l.fraction > 0.0);
    losses
}

fn confidence(stage: GrowthStage, observations: usize) -> Confidence {
    if stage < GrowthStage::Flowering || observations < 5 {
        Confidence::Low
    } else if stage >= GrowthStage::GrainFill && observations >= 8 {
        Confidence::High
    } else {
        Confidence::Medium
    }
}

/// Predict yield from canopy development and observed stresses
pub fn predict_yield(inputs: &YieldInputs) -> AnalysisResult<YieldPrediction> {
    let crop = inputs.crop;
    if !inputs.peak_ndvi.is_finite() {
        return Err(AnalysisError::InvalidInput("peak NDVI is not finite".to_string()));
    }
    if crop.ndvi_peak_reference <= BARE_SOIL_NDVI {
        return Err(AnalysisError::InvalidInput(format!(
            "crop '{}' has an NDVI peak reference at or below bare soil",
            crop.key
        )));
    }

    let canopy_factor = ((inputs.peak_ndvi - BARE_SOIL_NDVI) / (crop.ndvi_peak_reference - BARE_SOIL_NDVI))
        .clamp(0.0, MAX_CANOPY_FACTOR);

    let losses = stress_losses(inputs);
    let retained: f64 = losses.iter().map(|l| 1.0 - l.fraction).product();
    let expected = crop.potential_yield_t_ha * canopy_factor * retained;

    let confidence = confidence(inputs.stage, inputs.observation_count);
    let spread = match confidence {
        Confidence::Low => 0.30,
        Confidence::Medium => 0.20,
        Confidence::High => 0.10,
    };

    let relative = if crop.reference_yield_t_ha > 0.0 {
        expected / crop.reference_yield_t_ha
    } else {
        1.0
    };
    let class = if relative >= 1.1 {
        YieldClass::AboveAverage
    } else if relative >= 0.9 {
        YieldClass::Average
    } else {
        YieldClass::BelowAverage
    };

    Ok(YieldPrediction {
        expected_t_ha: expected,
        low_t_ha: expected * (1.0 - spread),
        high_t_ha: expected * (1.0 + spread),
        canopy_factor,
        losses,
        total_loss_fraction: 1.0 - retained,
        confidence,
        class,
        relative_to_reference: relative,
        gross_value_eur_ha: expected * crop.price_eur_t,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::nitrogen_analysis::{FertilizationUrgency, NitrogenStatus};
    use crate::analysis::types::Severity;
    use crate::crops::CropCatalog;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn weather(heat_days: usize, water_balance_mm: f64) -> WeatherSummary {
        let d = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        WeatherSummary {
            first_date: d,
            last_date: d,
            days: 30,
            mean_temp_c: 26.0,
            total_precipitation_mm: 20.0,
            total_et0_mm: 150.0,
            crop_et_mm: 180.0,
            water_balance_mm,
            gdd: 450.0,
            heat_stress_days: heat_days,
            frost_days: 0,
            max_dry_spell_days: 8,
            heavy_rain_days: 0,
            risks: Vec::new(),
            overall_risk: Severity::Low,
        }
    }

    fn nitrogen(nni: f64) -> NitrogenAssessment {
        NitrogenAssessment {
            reci: nni * 3.25,
            nni,
            status: NitrogenStatus::from_nni(nni),
            stage: GrowthStage::GrainFill,
            stage_share: 0.0,
            applied_kg_ha: 200.0,
            remaining_budget_kg_ha: 50.0,
            recommended_dose_kg_ha: 0.0,
            urgency: FertilizationUrgency::None,
            notes: Vec::new(),
        }
    }

    #[test]
    fn test_full_canopy_no_stress() {
        let catalog = CropCatalog::builtin();
        let maize = catalog.get("maize").unwrap();
        let prediction = predict_yield(&YieldInputs {
            peak_ndvi: 0.85,
            crop: maize,
            stage: GrowthStage::GrainFill,
            observation_count: 10,
            health: None,
            weather: None,
            nitrogen: None,
        })
        .unwrap();

        assert_relative_eq!(prediction.canopy_factor, 1.0, epsilon = 1e-12);
        assert_relative_eq!(prediction.expected_t_ha, 14.0, epsilon = 1e-9);
        assert_eq!(prediction.confidence, Confidence::High);
        assert_relative_eq!(prediction.low_t_ha, 12.6, epsilon = 1e-9);
        assert_eq!(prediction.class, YieldClass::AboveAverage);
        assert_relative_eq!(prediction.gross_value_eur_ha, 14.0 * 220.0, epsilon = 1e-6);
    }

    #[test]
    fn test_losses_combine_multiplicatively() {
        let catalog = CropCatalog::builtin();
        let maize = catalog.get("maize").unwrap();
        let summary = weather(4, 10.0);
        let n = nitrogen(0.6);
        let prediction = predict_yield(&YieldInputs {
            peak_ndvi: 0.85,
            crop: maize,
            stage: GrowthStage::Flowering,
            observation_count: 6,
            health: None,
            weather: Some(&summary),
            nitrogen: Some(&n),
        })
        .unwrap();

        assert_relative_eq!(prediction.loss(LossFactor::Heat).unwrap(), 0.06, epsilon = 1e-12);
        assert_relative_eq!(prediction.loss(LossFactor::Nitrogen).unwrap(), 0.2, epsilon = 1e-12);
        assert!(prediction.loss(LossFactor::Water).is_none());
        assert_relative_eq!(prediction.expected_t_ha, 14.0 * 0.94 * 0.8, epsilon = 1e-9);
        assert_eq!(prediction.confidence, Confidence::Medium);
        assert_eq!(prediction.class, YieldClass::Average);
    }

    #[test]
    fn test_water_loss_is_capped() {
        let catalog = CropCatalog::builtin();
        let maize = catalog.get("maize").unwrap();
        let summary = weather(0, -600.0);
        let prediction = predict_yield(&YieldInputs {
            peak_ndvi: 0.6,
            crop: maize,
            stage: GrowthStage::Vegetative,
            observation_count: 3,
            health: None,
            weather: Some(&summary),
            nitrogen: None,
        })
        .unwrap();

        assert_relative_eq!(prediction.loss(LossFactor::Water).unwrap(), 0.40, epsilon = 1e-12);
        assert_eq!(prediction.confidence, Confidence::Low);
        assert_eq!(prediction.class, YieldClass::BelowAverage);
    }

    #[test]
    fn test_invalid_peak() {
        let catalog = CropCatalog::builtin();
        let maize = catalog.get("maize").unwrap();
        let result = predict_yield(&YieldInputs {
            peak_ndvi: f64::NAN,
            crop: maize,
            stage: GrowthStage::Flowering,
            observation_count: 6,
            health: None,
            weather: None,
            nitrogen: None,
        });
        assert!(result.is_err());
    }
}
