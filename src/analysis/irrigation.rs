//! Irrigation Scheduling
//!
//! A one-week water budget: crop water need from reference ET0 and the
//! stage crop coefficient, less the share of forecast rain that actually
//! reaches the root zone. Soil moisture (SMI) sets how urgent the gap is,
//! canopy moisture (NDMI) confirms it.

use serde::{Deserialize, Serialize};

use crate::analysis::types::{GrowthStage, HealthStatus};
use crate::analysis::weather_analysis::day_et0;
use crate::crops::CropProfile;
use crate::data::{FieldLocation, WeatherDay};

const PLANNING_DAYS: usize = 7;
/// Daily rain below this is lost to interception and evaporation (mm)
const EFFECTIVE_RAIN_MIN_MM: f64 = 2.0;
const EFFECTIVE_RAIN_FRACTION: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IrrigationUrgency {
    NotNeeded,
    Monitor,
    Soon,
    Immediate,
}

impl IrrigationUrgency {
    fn escalate(self) -> Self {
        match self {
            IrrigationUrgency::NotNeeded => IrrigationUrgency::Monitor,
            IrrigationUrgency::Monitor => IrrigationUrgency::Soon,
            IrrigationUrgency::Soon | IrrigationUrgency::Immediate => IrrigationUrgency::Immediate,
        }
    }

    pub fn display_text(&self) -> &'static str {
        match self {
            IrrigationUrgency::NotNeeded => "Not needed",
            IrrigationUrgency::Monitor => "Monitor",
            IrrigationUrgency::Soon => "Irrigate within 2-3 days",
            IrrigationUrgency::Immediate => "Irrigate now",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrrigationAdvice {
    pub urgency: IrrigationUrgency,
    /// Mean daily reference ET0 used for the budget (mm/day)
    pub reference_et0_mm: f64,
    pub kc: f64,
    /// Crop water need over the next 7 days (mm)
    pub water_need_mm: f64,
    /// Forecast rain expected to reach the root zone (mm)
    pub effective_rain_mm: f64,
    pub recommended_depth_mm: f64,
    /// False when no weather was available to size the application
    #[serde(default = "default_true")]
    pub water_need_known: bool,
    pub notes: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl IrrigationAdvice {
    /// What to do when irrigation is due
    pub fn action_text(&self) -> String {
        if self.water_need_known {
            format!("Apply {:.0} mm", self.recommended_depth_mm)
        } else {
            "Irrigate to field capacity; add weather data to size the application".to_string()
        }
    }
}

fn mean_et0(days: &[&WeatherDay], latitude: f64) -> Option<f64> {
    if days.is_empty() {
        None
    } else {
        Some(days.iter().map(|d| day_et0(d, latitude)).sum::<f64>() / days.len() as f64)
    }
}

fn urgency_from_smi(smi: f64) -> IrrigationUrgency {
    if smi < -1.5 {
        IrrigationUrgency::Immediate
    } else if smi < -0.8 {
        IrrigationUrgency::Soon
    } else if smi < 0.0 {
        IrrigationUrgency::Monitor
    } else {
        IrrigationUrgency::NotNeeded
    }
}

/// Advise on irrigation for the coming week
pub fn advise_irrigation(
    smi: Option<f64>,
    ndmi_status: Option<HealthStatus>,
    crop: &CropProfile,
    stage: GrowthStage,
    history: &[WeatherDay],
    forecast: &[WeatherDay],
    location: &FieldLocation,
) -> IrrigationAdvice {
    let mut notes = Vec::new();
    let smi = smi.filter(|v| v.is_finite());

    let mut upcoming: Vec<&WeatherDay> = forecast.iter().collect();
    upcoming.sort_by_key(|d| d.date);
    upcoming.truncate(PLANNING_DAYS);

    let mut past: Vec<&WeatherDay> = history.iter().collect();
    past.sort_by_key(|d| d.date);
    let recent = &past[past.len().saturating_sub(PLANNING_DAYS)..];

    let et0 = mean_et0(&upcoming, location.latitude).or_else(|| mean_et0(recent, location.latitude));
    let water_need_known = et0.is_some();
    let reference_et0 = match et0 {
        Some(et0) => et0,
        None => {
            notes.push("No weather data: water need could not be estimated".to_string());
            0.0
        }
    };

    let kc = crop.kc_for_stage(stage);
    let water_need = reference_et0 * kc * PLANNING_DAYS as f64;
    let effective_rain: f64 = upcoming
        .iter()
        .map(|d| d.precipitation_mm)
        .filter(|p| *p >= EFFECTIVE_RAIN_MIN_MM)
        .sum::<f64>()
        * EFFECTIVE_RAIN_FRACTION;

    let canopy_dry = matches!(ndmi_status, Some(HealthStatus::Poor | HealthStatus::Critical));
    let mut urgency = match (smi, ndmi_status) {
        (Some(smi), _) => {
            let from_soil = urgency_from_smi(smi);
            if canopy_dry {
                from_soil.escalate()
            } else {
                from_soil
            }
        }
        (None, Some(HealthStatus::Critical)) => IrrigationUrgency::Soon,
        (None, Some(HealthStatus::Poor)) => IrrigationUrgency::Monitor,
        (None, Some(_)) => IrrigationUrgency::NotNeeded,
        (None, None) => {
            notes.push("No soil or canopy moisture data available".to_string());
            IrrigationUrgency::NotNeeded
        }
    };

    if water_need > 0.0 && effective_rain >= water_need && urgency > IrrigationUrgency::Monitor {
        urgency = IrrigationUrgency::Monitor;
        notes.push(format!(
            "Forecast rain ({:.0} mm effective) covers the weekly need",
            effective_rain
        ));
    }
    if stage == GrowthStage::Maturity && urgency > IrrigationUrgency::Monitor {
        urgency = IrrigationUrgency::Monitor;
        notes.push("Crop at maturity: irrigation no longer adds yield".to_string());
    }
    if stage == GrowthStage::Dormant || smi.is_some_and(|v| v > 1.5) {
        urgency = IrrigationUrgency::NotNeeded;
    }

    let recommended_depth = if urgency >= IrrigationUrgency::Soon {
        (water_need - effective_rain).clamp(0.0, crop.max_irrigation_mm)
    } else {
        0.0
    };

    if !water_need_known && urgency >= IrrigationUrgency::Soon {
        notes.push(format!(
            "Application depth unknown without weather data: irrigate to field capacity (at most {:.0} mm)",
            crop.max_irrigation_mm
        ));
    }
    if stage == GrowthStage::Flowering && urgency >= IrrigationUrgency::Soon {
        notes.push("Flowering is the most water-sensitive stage".to_string());
    }
    if !crop.irrigated && urgency >= IrrigationUrgency::Soon {
        notes.push(format!(
            "{} is normally rainfed: consider supplemental irrigation only where water is available",
            crop.name
        ));
    }

    IrrigationAdvice {
        urgency,
        reference_et0_mm: reference_et0,
        kc,
        water_need_mm: water_need,
        effective_rain_mm: effective_rain,
        recommended_depth_mm: recommended_depth,
        water_need_known,
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crops::CropCatalog;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn forecast(rain_on_day_two: f64) -> Vec<WeatherDay> {
        let start = NaiveDate::from_ymd_opt(2024, 7, 10).unwrap();
        (0..7)
            .map(|i| WeatherDay {
                date: start + Duration::days(i),
                t_min_c: 20.0,
                t_max_c: 34.0,
                precipitation_mm: if i == 2 { rain_on_day_two } else { 0.0 },
                et0_mm: Some(6.0),
            })
            .collect()
    }

    fn location() -> FieldLocation {
        FieldLocation { latitude: 45.0, longitude: 9.0, province: None }
    }

    #[test]
    fn test_dry_soil_at_flowering() {
        let catalog = CropCatalog::builtin();
        let maize = catalog.get("maize").unwrap();
        let advice = advise_irrigation(
            Some(-1.8),
            Some(HealthStatus::Good),
            maize,
            GrowthStage::Flowering,
            &[],
            &forecast(0.0),
            &location(),
        );
        assert_eq!(advice.urgency, IrrigationUrgency::Immediate);
        assert_relative_eq!(advice.water_need_mm, 6.0 * 1.2 * 7.0, epsilon = 1e-9);
        // 50.4 mm need, capped by the maximum single application
        assert_relative_eq!(advice.recommended_depth_mm, 35.0);
    }

    #[test]
    fn test_rain_reduces_depth() {
        let catalog = CropCatalog::builtin();
        let maize = catalog.get("maize").unwrap();
        let advice = advise_irrigation(
            Some(-1.0),
            None,
            maize,
            GrowthStage::RapidGrowth,
            &[],
            &forecast(25.0),
            &location(),
        );
        assert_eq!(advice.urgency, IrrigationUrgency::Soon);
        assert_relative_eq!(advice.effective_rain_mm, 20.0, epsilon = 1e-9);
        assert_relative_eq!(advice.recommended_depth_mm, 50.4 - 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rain_covers_need() {
        let catalog = CropCatalog::builtin();
        let maize = catalog.get("maize").unwrap();
        let advice = advise_irrigation(
            Some(-1.8),
            None,
            maize,
            GrowthStage::Flowering,
            &[],
            &forecast(70.0),
            &location(),
        );
        assert_eq!(advice.urgency, IrrigationUrgency::Monitor);
        assert_relative_eq!(advice.recommended_depth_mm, 0.0);
    }

    #[test]
    fn test_canopy_escalation_and_wet_soil() {
        let catalog = CropCatalog::builtin();
        let maize = catalog.get("maize").unwrap();
        let escalated = advise_irrigation(
            Some(-0.5),
            Some(HealthStatus::Poor),
            maize,
            GrowthStage::Vegetative,
            &[],
            &forecast(0.0),
            &location(),
        );
        assert_eq!(escalated.urgency, IrrigationUrgency::Soon);

        let wet = advise_irrigation(
            Some(2.0),
            Some(HealthStatus::Critical),
            maize,
            GrowthStage::Vegetative,
            &[],
            &forecast(0.0),
            &location(),
        );
        assert_eq!(wet.urgency, IrrigationUrgency::NotNeeded);
    }

    #[test]
    fn test_history_fallback_and_rainfed_note() {
        let catalog = CropCatalog::builtin();
        let wheat = catalog.get("wheat_durum").unwrap();
        let history = forecast(0.0);
        let advice = advise_irrigation(
            None,
            Some(HealthStatus::Critical),
            wheat,
            GrowthStage::Flowering,
            &history,
            &[],
            &location(),
        );
        assert_eq!(advice.urgency, IrrigationUrgency::Soon);
        assert_relative_eq!(advice.reference_et0_mm, 6.0);
        assert_relative_eq!(advice.effective_rain_mm, 0.0);
        assert!(advice.notes.iter().any(|n| n.contains("rainfed")));
    }

    #[test]
    fn test_dry_soil_without_weather_is_not_sized() {
        let catalog = CropCatalog::builtin();
        let maize = catalog.get("maize").unwrap();
        let advice = advise_irrigation(
            Some(-1.8),
            None,
            maize,
            GrowthStage::Flowering,
            &[],
            &[],
            &location(),
        );
        assert_eq!(advice.urgency, IrrigationUrgency::Immediate);
        assert!(!advice.water_need_known);
        assert_relative_eq!(advice.recommended_depth_mm, 0.0);
        assert!(advice.notes.iter().any(|n| n.contains("field capacity")));
        assert!(!advice.action_text().contains("0 mm"));

        let sized = advise_irrigation(
            Some(-1.8),
            None,
            maize,
            GrowthStage::Flowering,
            &[],
            &forecast(0.0),
            &location(),
        );
        assert!(sized.water_need_known);
        assert_eq!(sized.action_text(), "Apply 35 mm");
    }
}
