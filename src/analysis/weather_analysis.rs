//! Weather Analysis
//!
//! Thermal time, evapotranspiration, water balance and agro-meteorological
//! risk detection over daily weather records.
//!
//! ET0 uses the provider's value when present and falls back to the
//! Hargreaves-Samani equation with FAO-56 extraterrestrial radiation, which
//! needs only temperature extremes and latitude.

use std::f64::consts::PI;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::analysis::types::{GrowthStage, Severity};
use crate::crops::CropProfile;
use crate::data::{FieldLocation, WeatherDay};
use crate::error::{AnalysisError, AnalysisResult};

/// Solar constant (MJ m⁻² min⁻¹)
const GSC: f64 = 0.0820;
/// Below this a day counts as dry (mm)
const DRY_DAY_MM: f64 = 1.0;
const HEAVY_RAIN_MM: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherRiskKind {
    HeatStress,
    Frost,
    Drought,
    DrySpell,
    ExcessRain,
}

impl WeatherRiskKind {
    pub fn display_text(&self) -> &'static str {
        match self {
            WeatherRiskKind::HeatStress => "Heat stress",
            WeatherRiskKind::Frost => "Frost",
            WeatherRiskKind::Drought => "Drought",
            WeatherRiskKind::DrySpell => "Dry spell",
            WeatherRiskKind::ExcessRain => "Excess rain",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherRisk {
    pub kind: WeatherRiskKind,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSummary {
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub days: usize,
    pub mean_temp_c: f64,
    pub total_precipitation_mm: f64,
    pub total_et0_mm: f64,
    /// ET0 × Kc for the current stage
    pub crop_et_mm: f64,
    /// Precipitation minus crop ET (negative = deficit)
    pub water_balance_mm: f64,
    pub gdd: f64,
    pub heat_stress_days: usize,
    pub frost_days: usize,
    pub max_dry_spell_days: usize,
    pub heavy_rain_days: usize,
    pub risks: Vec<WeatherRisk>,
    pub overall_risk: Severity,
}

impl WeatherSummary {
    pub fn risk(&self, kind: WeatherRiskKind) -> Option<&WeatherRisk> {
        self.risks.iter().find(|r| r.kind == kind)
    }

    pub fn mean_et0_mm(&self) -> f64 {
        self.total_et0_mm / self.days.max(1) as f64
    }
}

/// Growing degree days for one day (capped mean-temperature method)
pub fn growing_degree_days(day: &WeatherDay, crop: &CropProfile) -> f64 {
    (day.mean_temp().min(crop.upper_temp_c) - crop.base_temp_c).max(0.0)
}

/// Extraterrestrial radiation (MJ m⁻² day⁻¹), FAO-56 eq. 21
pub fn extraterrestrial_radiation(date: NaiveDate, latitude_deg: f64) -> f64 {
    let j = date.ordinal() as f64;
    let phi = latitude_deg.to_radians();
    let dr = 1.0 + 0.033 * (2.0 * PI * j / 365.0).cos();
    let delta = 0.409 * (2.0 * PI * j / 365.0 - 1.39).sin();
    let ws = (-phi.tan() * delta.tan()).clamp(-1.0, 1.0).acos();

    let ra = (24.0 * 60.0 / PI)
        * GSC
        * dr
        * (ws * phi.sin() * delta.sin() + phi.cos() * delta.cos() * ws.sin());
    ra.max(0.0)
}

/// Hargreaves-Samani reference evapotranspiration (mm/day)
pub fn hargreaves_et0(day: &WeatherDay, latitude_deg: f64) -> f64 {
    let ra_mm = 0.408 * extraterrestrial_radiation(day.date, latitude_deg);
    let range = (day.t_max_c - day.t_min_c).max(0.0);
    (0.0023 * ra_mm * (day.mean_temp() + 17.8) * range.sqrt()).max(0.0)
}

/// Recorded ET0 if available, else Hargreaves
pub fn day_et0(day: &WeatherDay, latitude_deg: f64) -> f64 {
    day.et0_mm
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or_else(|| hargreaves_et0(day, latitude_deg))
}

/// Accumulated GDD from `since` (inclusive) onwards
pub fn gdd_since(days: &[WeatherDay], crop: &CropProfile, since: NaiveDate) -> f64 {
    days.iter()
        .filter(|d| d.date >= since)
        .map(|d| growing_degree_days(d, crop))
        .sum()
}

fn validate(days: &[WeatherDay]) -> AnalysisResult<()> {
    if days.is_empty() {
        return Err(AnalysisError::InvalidInput("no weather days supplied".to_string()));
    }
    if let Some(bad) = days.iter().find(|d| d.t_min_c > d.t_max_c) {
        return Err(AnalysisError::InvalidInput(format!(
            "t_min {:.1} above t_max {:.1} on {}",
            bad.t_min_c, bad.t_max_c, bad.date
        )));
    }
    if let Some(bad) = days.iter().find(|d| !d.t_min_c.is_finite() || !d.t_max_c.is_finite()) {
        return Err(AnalysisError::InvalidInput(format!("non-finite temperature on {}", bad.date)));
    }
    Ok(())
}

/// Summarize a run of daily weather for a crop at a development stage
pub fn analyze_weather(
    days: &[WeatherDay],
    crop: &CropProfile,
    location: &FieldLocation,
    stage: GrowthStage,
) -> AnalysisResult<WeatherSummary> {
    validate(days)?;

    let mut sorted: Vec<&WeatherDay> = days.iter().collect();
    sorted.sort_by_key(|d| d.date);

    let kc = crop.kc_for_stage(stage);
    let mut total_precip = 0.0;
    let mut total_et0 = 0.0;
    let mut temp_sum = 0.0;
    let mut gdd = 0.0;
    let mut heat_days = 0;
    let mut frost_days = 0;
    let mut heavy_days = 0;
    let mut dry_run = 0;
    let mut max_dry = 0;

    for day in &sorted {
        let precip = day.precipitation_mm.max(0.0);
        total_precip += precip;
        total_et0 += day_et0(day, location.latitude);
        temp_sum += day.mean_temp();
        gdd += growing_degree_days(day, crop);

        if day.t_max_c > crop.heat_stress_c {
            heat_days += 1;
        }
        if day.t_min_c < crop.frost_damage_c {
            frost_days += 1;
        }
        if precip >= HEAVY_RAIN_MM {
            heavy_days += 1;
        }
        if precip < DRY_DAY_MM {
            dry_run += 1;
            max_dry = max_dry.max(dry_run);
        } else {
            dry_run = 0;
        }
    }

    let crop_et = total_et0 * kc;
    let water_balance = total_precip - crop_et;

    let risks = assess_risks(heat_days, frost_days, water_balance, max_dry, heavy_days, stage, crop);
    let overall_risk = risks.iter().map(|r| r.severity).max().unwrap_or(Severity::None);

    Ok(WeatherSummary {
        first_date: sorted[0].date,
        last_date: sorted[sorted.len() - 1].date,
        days: sorted.len(),
        mean_temp_c: temp_sum / sorted.len() as f64,
        total_precipitation_mm: total_precip,
        total_et0_mm: total_et0,
        crop_et_mm: crop_et,
        water_balance_mm: water_balance,
        gdd,
        heat_stress_days: heat_days,
        frost_days,
        max_dry_spell_days: max_dry,
        heavy_rain_days: heavy_days,
        risks,
        overall_risk,
    })
}

fn assess_risks(
    heat_days: usize,
    frost_days: usize,
    water_balance: f64,
    max_dry: usize,
    heavy_days: usize,
    stage: GrowthStage,
    crop: &CropProfile,
) -> Vec<WeatherRisk> {
    let mut risks = Vec::new();

    let heat = match heat_days {
        0 => None,
        1..=2 => Some(Severity::Low),
        3..=5 => Some(Severity::Medium),
        _ => Some(Severity::High),
    };
    if let Some(mut severity) = heat {
        if stage == GrowthStage::Flowering {
            severity = severity.escalate();
        }
        risks.push(WeatherRisk {
            kind: WeatherRiskKind::HeatStress,
            severity,
            message: format!("{} day(s) above {:.0}°C", heat_days, crop.heat_stress_c),
        });
    }

    let frost = match frost_days {
        0 => None,
        1..=2 => Some(Severity::Medium),
        _ => Some(Severity::High),
    };
    if let Some(mut severity) = frost {
        if matches!(stage, GrowthStage::Emergence | GrowthStage::Flowering) {
            severity = severity.escalate();
        }
        risks.push(WeatherRisk {
            kind: WeatherRiskKind::Frost,
            severity,
            message: format!("{} day(s) below {:.0}°C", frost_days, crop.frost_damage_c),
        });
    }

    let drought = if water_balance < -150.0 {
        Some(Severity::Critical)
    } else if water_balance < -100.0 {
        Some(Severity::High)
    } else if water_balance < -50.0 {
        Some(Severity::Medium)
    } else {
        None
    };
    if let Some(severity) = drought {
        risks.push(WeatherRisk {
            kind: WeatherRiskKind::Drought,
            severity,
            message: format!("Water deficit of {:.0} mm over the period", -water_balance),
        });
    }

    let dry_spell = match max_dry {
        0..=9 => None,
        10..=14 => Some(Severity::Low),
        15..=20 => Some(Severity::Medium),
        _ => Some(Severity::High),
    };
    if let Some(severity) = dry_spell {
        risks.push(WeatherRisk {
            kind: WeatherRiskKind::DrySpell,
            severity,
            message: format!("{} consecutive days without significant rain", max_dry),
        });
    }

    let excess = match heavy_days {
        0 => None,
        1..=2 => Some(Severity::Low),
        _ => Some(Severity::Medium),
    };
    if let Some(severity) = excess {
        risks.push(WeatherRisk {
            kind: WeatherRiskKind::ExcessRain,
            severity,
            message: format!("{} day(s) with at least {:.0} mm of rain", heavy_days, HEAVY_RAIN_MM),
        });
    }

    risks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crops::CropCatalog;
    use approx::assert_relative_eq;
    use chrono::Duration;

    fn day(date: NaiveDate, t_min: f64, t_max: f64, precip: f64) -> WeatherDay {
        WeatherDay { date, t_min_c: t_min, t_max_c: t_max, precipitation_mm: precip, et0_mm: None }
    }

    fn po_valley() -> FieldLocation {
        FieldLocation { latitude: 45.0, longitude: 10.5, province: Some("MN".to_string()) }
    }

    #[test]
    fn test_gdd_capped() {
        let catalog = CropCatalog::builtin();
        let maize = catalog.get("maize").unwrap();
        let d = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();

        assert_relative_eq!(growing_degree_days(&day(d, 18.0, 30.0, 0.0), maize), 14.0);
        assert_relative_eq!(growing_degree_days(&day(d, 26.0, 40.0, 0.0), maize), 20.0);
        assert_relative_eq!(growing_degree_days(&day(d, 2.0, 12.0, 0.0), maize), 0.0);
    }

    #[test]
    fn test_radiation_and_et0_plausible() {
        // FAO-56 example 8: 3 Sept, 20°S → Ra ≈ 32.2 MJ/m²/day
        let ra = extraterrestrial_radiation(NaiveDate::from_ymd_opt(2015, 9, 3).unwrap(), -20.0);
        assert_relative_eq!(ra, 32.2, epsilon = 0.2);

        let summer = day(NaiveDate::from_ymd_opt(2024, 7, 15).unwrap(), 19.0, 33.0, 0.0);
        let et0 = hargreaves_et0(&summer, 45.0);
        assert!(et0 > 4.0 && et0 < 8.0, "et0 = {}", et0);
    }

    #[test]
    fn test_recorded_et0_preferred() {
        let mut d = day(NaiveDate::from_ymd_opt(2024, 7, 15).unwrap(), 19.0, 33.0, 0.0);
        d.et0_mm = Some(5.5);
        assert_eq!(day_et0(&d, 45.0), 5.5);
    }

    #[test]
    fn test_hot_dry_period() {
        let catalog = CropCatalog::builtin();
        let maize = catalog.get("maize").unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let days: Vec<WeatherDay> = (0..21)
            .map(|i| {
                let t_max = if i % 3 == 0 { 37.0 } else { 33.0 };
                day(start + Duration::days(i), 21.0, t_max, 0.0)
            })
            .collect();

        let summary = analyze_weather(&days, maize, &po_valley(), GrowthStage::Flowering).unwrap();

        assert_eq!(summary.days, 21);
        assert_eq!(summary.heat_stress_days, 7);
        assert_eq!(summary.max_dry_spell_days, 21);
        assert!(summary.water_balance_mm < -100.0);
        // 7 heat days → High, escalated at flowering
        assert_eq!(summary.risk(WeatherRiskKind::HeatStress).unwrap().severity, Severity::Critical);
        assert_eq!(summary.risk(WeatherRiskKind::DrySpell).unwrap().severity, Severity::High);
        assert!(summary.overall_risk >= Severity::High);
    }

    #[test]
    fn test_frost_and_heavy_rain() {
        let catalog = CropCatalog::builtin();
        let vine = catalog.get("grapevine").unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 4, 10).unwrap();
        let days = vec![
            day(start, -2.5, 9.0, 0.0),
            day(start + Duration::days(1), 3.0, 14.0, 42.0),
            day(start + Duration::days(2), 6.0, 15.0, 12.0),
        ];

        let summary = analyze_weather(&days, vine, &po_valley(), GrowthStage::Emergence).unwrap();
        assert_eq!(summary.frost_days, 1);
        assert_eq!(summary.risk(WeatherRiskKind::Frost).unwrap().severity, Severity::High);
        assert_eq!(summary.heavy_rain_days, 1);
        assert!(summary.risk(WeatherRiskKind::Drought).is_none());
    }

    #[test]
    fn test_invalid_weather() {
        let catalog = CropCatalog::builtin();
        let maize = catalog.get("maize").unwrap();
        assert!(analyze_weather(&[], maize, &po_valley(), GrowthStage::Vegetative).is_err());

        let bad = day(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(), 30.0, 20.0, 0.0);
        let err = analyze_weather(&[bad], maize, &po_valley(), GrowthStage::Vegetative).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }
}
