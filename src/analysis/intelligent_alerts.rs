//! Intelligent Alerts
//!
//! Turns the individual analyses into a short, ranked list of actionable
//! alerts. Each alert carries a deadline and an estimated economic risk so
//! that the most expensive problems surface first.

use chrono::{Duration, NaiveDate};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::analysis::eos_analysis::{Anomaly, AnomalyKind, TrendAnalysis};
use crate::analysis::growth_stage::GrowthAssessment;
use crate::analysis::irrigation::{IrrigationAdvice, IrrigationUrgency};
use crate::analysis::nitrogen_analysis::{FertilizationUrgency, NitrogenAssessment, NitrogenStatus};
use crate::analysis::types::{Confidence, Severity, TrendDirection};
use crate::analysis::vegetation_health::{StressKind, VegetationHealth};
use crate::analysis::weather_analysis::{WeatherRiskKind, WeatherSummary};
use crate::analysis::yield_prediction::{YieldClass, YieldPrediction};
use crate::crops::CropProfile;
use crate::data::{days_before, IndexKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    Water,
    Nutrition,
    Weather,
    Vegetation,
    Yield,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Stable identifier, one alert per id
    pub id: String,
    pub category: AlertCategory,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub action: String,
    pub deadline: NaiveDate,
    pub economic_risk_eur_ha: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSummary {
    pub alerts: Vec<Alert>,
    /// Alerts dropped by the output limit
    pub suppressed: usize,
    pub highest_severity: Severity,
    pub critical_count: usize,
    pub high_count: usize,
    pub total_economic_risk_eur_ha: f64,
    pub total_economic_risk_eur: f64,
}

/// Analysis outputs available for alerting; every source is optional
#[derive(Debug, Clone, Copy)]
pub struct AlertContext<'a> {
    pub reference_date: NaiveDate,
    pub health: Option<&'a VegetationHealth>,
    pub ndvi_trend: Option<&'a TrendAnalysis>,
    pub anomalies: &'a [Anomaly],
    pub anomaly_window_days: i64,
    pub weather: Option<&'a WeatherSummary>,
    pub forecast: Option<&'a WeatherSummary>,
    pub growth: Option<&'a GrowthAssessment>,
    pub nitrogen: Option<&'a NitrogenAssessment>,
    pub irrigation: Option<&'a IrrigationAdvice>,
    pub yield_prediction: Option<&'a YieldPrediction>,
}

impl<'a> AlertContext<'a> {
    pub fn new(reference_date: NaiveDate) -> Self {
        Self {
            reference_date,
            health: None,
            ndvi_trend: None,
            anomalies: &[],
            anomaly_window_days: 10,
            weather: None,
            forecast: None,
            growth: None,
            nitrogen: None,
            irrigation: None,
            yield_prediction: None,
        }
    }
}

/// Share of the crop value put at risk by a problem of this severity
fn loss_fraction(severity: Severity) -> f64 {
    match severity {
        Severity::None | Severity::Info => 0.0,
        Severity::Low => 0.02,
        Severity::Medium => 0.05,
        Severity::High => 0.10,
        Severity::Critical => 0.20,
    }
}

fn deadline_days(severity: Severity) -> i64 {
    match severity {
        Severity::Critical => 1,
        Severity::High => 3,
        Severity::Medium => 7,
        _ => 14,
    }
}

struct AlertBuilder<'a> {
    crop: &'a CropProfile,
    reference_date: NaiveDate,
    yield_basis_t_ha: f64,
    alerts: Vec<Alert>,
}

impl<'a> AlertBuilder<'a> {
    fn category_factor(&self, category: AlertCategory) -> f64 {
        match category {
            AlertCategory::Water => self.crop.water_sensitivity,
            AlertCategory::Nutrition => 0.8,
            AlertCategory::Weather | AlertCategory::Yield => 1.0,
            AlertCategory::Vegetation => 0.5,
        }
    }

    fn push(
        &mut self,
        id: impl Into<String>,
        category: AlertCategory,
        severity: Severity,
        title: impl Into<String>,
        message: impl Into<String>,
        action: impl Into<String>,
    ) {
        let risk = loss_fraction(severity) * self.category_factor(category) * self.yield_basis_t_ha * self.crop.price_eur_t;
        self.push_with_risk(id, category, severity, title, message, action, risk);
    }

    #[allow(clippy::too_many_arguments)]
    fn push_with_risk(
        &mut self,
        id: impl Into<String>,
        category: AlertCategory,
        severity: Severity,
        title: impl Into<String>,
        message: impl Into<String>,
        action: impl Into<String>,
        economic_risk_eur_ha: f64,
    ) {
        if severity <= Severity::Info {
            return;
        }
        self.alerts.push(Alert {
            id: id.into(),
            category,
            severity,
            title: title.into(),
            message: message.into(),
            action: action.into(),
            deadline: self
                .reference_date
                .checked_add_signed(Duration::days(deadline_days(severity)))
                .unwrap_or(NaiveDate::MAX),
            economic_risk_eur_ha: economic_risk_eur_ha.max(0.0),
        });
    }
}

// ============================================================================
// Alert sources
// ============================================================================

fn stress_alerts(builder: &mut AlertBuilder, health: &VegetationHealth) {
    for stress in &health.stresses {
        let (category, action) = match stress.kind {
            StressKind::WaterStress => (AlertCategory::Water, "Check soil moisture and schedule irrigation"),
            StressKind::Waterlogging => (AlertCategory::Water, "Check drainage and avoid field traffic"),
            StressKind::NutrientStress => (AlertCategory::Nutrition, "Verify nitrogen status and plan top-dressing"),
            StressKind::VigorLoss => (AlertCategory::Vegetation, "Scout the field for pests, disease or damage"),
        };
        let id = format!("stress_{}", serde_name(&stress.kind));
        builder.push(id, category, stress.severity, stress.kind.display_text(), stress.evidence.clone(), action);
    }
}

fn nitrogen_alert(builder: &mut AlertBuilder, nitrogen: &NitrogenAssessment) {
    let severity = match (nitrogen.status, nitrogen.urgency) {
        (_, FertilizationUrgency::Immediate) => Severity::High,
        (_, FertilizationUrgency::Soon) => Severity::Medium,
        (NitrogenStatus::Excess, _) => Severity::Low,
        _ => return,
    };
    let (title, action) = if nitrogen.status == NitrogenStatus::Excess {
        ("Excess nitrogen".to_string(), "Skip the next nitrogen application".to_string())
    } else {
        (
            format!("Nitrogen {}", nitrogen.status.display_text().to_lowercase()),
            format!("Apply {:.0} kg N/ha", nitrogen.recommended_dose_kg_ha),
        )
    };
    builder.push(
        "nitrogen_status",
        AlertCategory::Nutrition,
        severity,
        title,
        format!("Nitrogen nutrition index {:.2} (ReCI {:.2})", nitrogen.nni, nitrogen.reci),
        action,
    );
}

fn irrigation_alert(builder: &mut AlertBuilder, irrigation: &IrrigationAdvice) {
    let severity = match irrigation.urgency {
        IrrigationUrgency::Immediate => Severity::High,
        IrrigationUrgency::Soon => Severity::Medium,
        _ => return,
    };
    builder.push(
        "irrigation",
        AlertCategory::Water,
        severity,
        irrigation.urgency.display_text(),
        format!(
            "Weekly crop water need {:.0} mm, effective forecast rain {:.0} mm",
            irrigation.water_need_mm, irrigation.effective_rain_mm
        ),
        irrigation.action_text(),
    );
}

fn weather_alerts(builder: &mut AlertBuilder, weather: &WeatherSummary, prefix: &str) {
    for risk in &weather.risks {
        let action = match risk.kind {
            WeatherRiskKind::HeatStress => "Keep the crop well watered through the hot spell",
            WeatherRiskKind::Frost => "Inspect for frost damage once temperatures recover",
            WeatherRiskKind::Drought | WeatherRiskKind::DrySpell => "Prioritize irrigation on this field",
            WeatherRiskKind::ExcessRain => "Check drainage and watch for fungal disease",
        };
        let id = format!("{}_{}", prefix, serde_name(&risk.kind));
        let title = if prefix == "forecast" {
            format!("Forecast: {}", risk.kind.display_text().to_lowercase())
        } else {
            risk.kind.display_text().to_string()
        };
        builder.push(id, AlertCategory::Weather, risk.severity, title, risk.message.clone(), action);
    }
}

fn anomaly_alert(builder: &mut AlertBuilder, anomalies: &[Anomaly], window_days: i64) {
    let window_start = days_before(builder.reference_date, window_days);
    let latest_drop = anomalies
        .iter()
        .filter(|a| a.kind == IndexKind::Ndvi && a.anomaly == AnomalyKind::Drop)
        .filter(|a| a.date >= window_start && a.date <= builder.reference_date)
        .max_by_key(|a| a.date);

    if let Some(latest) = latest_drop {
        let severity = if latest.z_score < -4.0 { Severity::High } else { Severity::Medium };
        builder.push(
            "ndvi_drop",
            AlertCategory::Vegetation,
            severity,
            "Sudden NDVI drop",
            format!(
                "NDVI fell to {:.2} on {} (expected {:.2})",
                latest.value, latest.date, latest.expected
            ),
            "Scout the affected area for hail, lodging, pests or harvest",
        );
    }
}

fn decline_alert(builder: &mut AlertBuilder, trend: &TrendAnalysis, growth: Option<&GrowthAssessment>) {
    let active = growth.map(|g| g.stage.is_active_growth()).unwrap_or(false);
    if trend.direction == TrendDirection::Decreasing && trend.confidence == Confidence::High && active {
        builder.push(
            "ndvi_decline",
            AlertCategory::Vegetation,
            Severity::High,
            "Canopy declining during active growth",
            format!("NDVI changing by {:+.3} per week", trend.weekly_change),
            "Investigate water, nutrient and disease causes",
        );
    }
}

fn yield_alert(builder: &mut AlertBuilder, prediction: &YieldPrediction) {
    if prediction.class != YieldClass::BelowAverage {
        return;
    }
    let severity = if prediction.relative_to_reference < 0.75 { Severity::High } else { Severity::Medium };
    let shortfall = (builder.crop.reference_yield_t_ha - prediction.expected_t_ha).max(0.0);
    builder.push_with_risk(
        "yield_below_reference",
        AlertCategory::Yield,
        severity,
        "Yield below reference",
        format!(
            "Expected {:.1} t/ha against a reference of {:.1} t/ha",
            prediction.expected_t_ha, builder.crop.reference_yield_t_ha
        ),
        "Review the limiting factors listed in the yield prediction",
        shortfall * builder.crop.price_eur_t,
    );
}

fn compound_alerts(builder: &mut AlertBuilder, context: &AlertContext) {
    let heat = [context.weather, context.forecast]
        .into_iter()
        .flatten()
        .filter_map(|w| w.risk(WeatherRiskKind::HeatStress))
        .any(|r| r.severity >= Severity::Medium);
    let drought = context
        .weather
        .and_then(|w| w.risk(WeatherRiskKind::Drought))
        .map(|r| r.severity >= Severity::Medium)
        .unwrap_or(false);
    let water_stressed = context.health.map(|h| h.has_water_stress()).unwrap_or(false);

    if heat && (drought || water_stressed) {
        builder.push(
            "compound_heat_drought",
            AlertCategory::Weather,
            Severity::Critical,
            "Heat combined with drought",
            "High temperatures on a water-stressed crop compound yield losses",
            "Irrigate immediately and avoid any other crop operations",
        );
    }

    let n_short = context.nitrogen.map(|n| n.status.is_short()).unwrap_or(false);
    if n_short && water_stressed {
        builder.push(
            "compound_nitrogen_water",
            AlertCategory::Nutrition,
            Severity::Medium,
            "Nitrogen shortage under water stress",
            "Dry soil limits nitrogen uptake, fertilizer alone will not recover the crop",
            "Irrigate before fertilizing",
        );
    }
}

/// One alert per id; on a tie the first one raised wins
fn keep_most_severe(raised: Vec<Alert>) -> Vec<Alert> {
    let mut by_id: FxHashMap<String, Alert> = FxHashMap::default();
    for alert in raised {
        match by_id.get(&alert.id) {
            Some(existing) if existing.severity >= alert.severity => {}
            _ => {
                by_id.insert(alert.id.clone(), alert);
            }
        }
    }
    by_id.into_values().collect()
}

fn serde_name<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// Collect, rank and summarize alerts for a field
pub fn generate_alerts(context: &AlertContext, crop: &CropProfile, area_ha: f64, max_alerts: usize) -> AlertSummary {
    let yield_basis = context
        .yield_prediction
        .map(|y| y.expected_t_ha)
        .filter(|y| *y > 0.0)
        .unwrap_or(crop.reference_yield_t_ha);

    let mut builder = AlertBuilder {
        crop,
        reference_date: context.reference_date,
        yield_basis_t_ha: yield_basis,
        alerts: Vec::new(),
    };

    if let Some(health) = context.health {
        stress_alerts(&mut builder, health);
    }
    if let Some(nitrogen) = context.nitrogen {
        nitrogen_alert(&mut builder, nitrogen);
    }
    if let Some(irrigation) = context.irrigation {
        irrigation_alert(&mut builder, irrigation);
    }
    if let Some(weather) = context.weather {
        weather_alerts(&mut builder, weather, "weather");
    }
    if let Some(forecast) = context.forecast {
        weather_alerts(&mut builder, forecast, "forecast");
    }
    anomaly_alert(&mut builder, context.anomalies, context.anomaly_window_days);
    if let Some(trend) = context.ndvi_trend {
        decline_alert(&mut builder, trend, context.growth);
    }
    if let Some(prediction) = context.yield_prediction {
        yield_alert(&mut builder, prediction);
    }
    compound_alerts(&mut builder, context);

    let mut alerts = keep_most_severe(builder.alerts);
    alerts.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.economic_risk_eur_ha.total_cmp(&a.economic_risk_eur_ha))
            .then_with(|| a.id.cmp(&b.id))
    });

    let suppressed = alerts.len().saturating_sub(max_alerts);
    alerts.truncate(max_alerts);

    let total_ha: f64 = alerts.iter().map(|a| a.economic_risk_eur_ha).sum();
    AlertSummary {
        highest_severity: alerts.first().map(|a| a.severity).unwrap_or(Severity::None),
        critical_count: alerts.iter().filter(|a| a.severity == Severity::Critical).count(),
        high_count: alerts.iter().filter(|a| a.severity == Severity::High).count(),
        total_economic_risk_eur_ha: total_ha,
        total_economic_risk_eur: total_ha * area_ha.max(0.0),
        suppressed,
        alerts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::HealthStatus;
    use crate::analysis::vegetation_health::StressFactor;
    use crate::analysis::weather_analysis::WeatherRisk;
    use crate::crops::CropCatalog;
    use approx::assert_relative_eq;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 15).unwrap()
    }

    fn water_stressed_health() -> VegetationHealth {
        VegetationHealth {
            score: 45.0,
            status: HealthStatus::Moderate,
            indices: Vec::new(),
            stresses: vec![StressFactor {
                kind: StressKind::WaterStress,
                severity: Severity::High,
                evidence: "NDMI 0.05 (critical)".to_string(),
            }],
            summary: String::new(),
        }
    }

    fn hot_dry_weather() -> WeatherSummary {
        WeatherSummary {
            first_date: date() - Duration::days(20),
            last_date: date(),
            days: 21,
            mean_temp_c: 28.0,
            total_precipitation_mm: 0.0,
            total_et0_mm: 130.0,
            crop_et_mm: 156.0,
            water_balance_mm: -156.0,
            gdd: 380.0,
            heat_stress_days: 7,
            frost_days: 0,
            max_dry_spell_days: 21,
            heavy_rain_days: 0,
            risks: vec![
                WeatherRisk {
                    kind: WeatherRiskKind::HeatStress,
                    severity: Severity::High,
                    message: "7 days above 35°C".to_string(),
                },
                WeatherRisk {
                    kind: WeatherRiskKind::Drought,
                    severity: Severity::Critical,
                    message: "Water balance -156 mm".to_string(),
                },
            ],
            overall_risk: Severity::Critical,
        }
    }

    fn ndvi_drop(days_ago: i64, z: f64) -> Anomaly {
        Anomaly {
            kind: IndexKind::Ndvi,
            date: date() - Duration::days(days_ago),
            value: 0.45,
            expected: 0.72,
            z_score: z,
            anomaly: AnomalyKind::Drop,
        }
    }

    #[test]
    fn test_compound_heat_drought_is_critical_and_first() {
        let catalog = CropCatalog::builtin();
        let maize = catalog.get("maize").unwrap();
        let health = water_stressed_health();
        let weather = hot_dry_weather();

        let mut context = AlertContext::new(date());
        context.health = Some(&health);
        context.weather = Some(&weather);

        let summary = generate_alerts(&context, maize, 12.0, 8);
        let first = &summary.alerts[0];
        assert_eq!(summary.highest_severity, Severity::Critical);
        assert!(summary.alerts.iter().any(|a| a.id == "compound_heat_drought"));
        assert_eq!(first.severity, Severity::Critical);
        assert_eq!(first.deadline, date() + Duration::days(1));
        assert_eq!(summary.critical_count, 2);
        assert_relative_eq!(
            summary.total_economic_risk_eur,
            summary.total_economic_risk_eur_ha * 12.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_economic_risk_uses_category_factor() {
        let catalog = CropCatalog::builtin();
        let maize = catalog.get("maize").unwrap();
        let health = water_stressed_health();

        let mut context = AlertContext::new(date());
        context.health = Some(&health);

        let summary = generate_alerts(&context, maize, 1.0, 8);
        assert_eq!(summary.alerts.len(), 1);
        let alert = &summary.alerts[0];
        assert_eq!(alert.id, "stress_water_stress");
        // High (10%) × water sensitivity 0.8 × reference 10.5 t/ha × 220 €/t
        assert_relative_eq!(alert.economic_risk_eur_ha, 0.10 * 0.8 * 10.5 * 220.0, epsilon = 1e-9);
    }

    #[test]
    fn test_recent_drop_only() {
        let catalog = CropCatalog::builtin();
        let maize = catalog.get("maize").unwrap();

        let old = [ndvi_drop(25, -5.0)];
        let mut context = AlertContext::new(date());
        context.anomalies = &old;
        assert!(generate_alerts(&context, maize, 1.0, 8).alerts.is_empty());

        let recent = [ndvi_drop(25, -5.0), ndvi_drop(4, -3.0)];
        context.anomalies = &recent;
        let summary = generate_alerts(&context, maize, 1.0, 8);
        assert_eq!(summary.alerts.len(), 1);
        assert_eq!(summary.alerts[0].id, "ndvi_drop");
        assert_eq!(summary.alerts[0].severity, Severity::Medium);
    }

    #[test]
    fn test_truncation_counts_suppressed() {
        let catalog = CropCatalog::builtin();
        let maize = catalog.get("maize").unwrap();
        let health = water_stressed_health();
        let weather = hot_dry_weather();

        let mut context = AlertContext::new(date());
        context.health = Some(&health);
        context.weather = Some(&weather);

        let all = generate_alerts(&context, maize, 1.0, 10);
        let limited = generate_alerts(&context, maize, 1.0, 2);
        assert_eq!(limited.alerts.len(), 2);
        assert_eq!(limited.suppressed, all.alerts.len() - 2);
        assert!(limited.alerts[0].severity >= limited.alerts[1].severity);
    }

    #[test]
    fn test_forecast_heat_with_water_stress() {
        let catalog = CropCatalog::builtin();
        let maize = catalog.get("maize").unwrap();
        let health = water_stressed_health();
        let mut forecast = hot_dry_weather();
        forecast.risks.retain(|r| r.kind == WeatherRiskKind::HeatStress);

        let mut context = AlertContext::new(date());
        context.health = Some(&health);
        context.forecast = Some(&forecast);

        let summary = generate_alerts(&context, maize, 1.0, 8);
        assert!(summary.alerts.iter().any(|a| a.id == "forecast_heat_stress"));
        assert_eq!(summary.alerts[0].id, "compound_heat_drought");
    }

    #[test]
    fn test_no_inputs_no_alerts() {
        let catalog = CropCatalog::builtin();
        let olive = catalog.get("olive").unwrap();
        let summary = generate_alerts(&AlertContext::new(date()), olive, 5.0, 8);
        assert!(summary.alerts.is_empty());
        assert_eq!(summary.highest_severity, Severity::None);
        assert_relative_eq!(summary.total_economic_risk_eur, 0.0);
    }

    #[test]
    fn test_duplicate_ids_keep_most_severe() {
        let catalog = CropCatalog::builtin();
        let maize = catalog.get("maize").unwrap();
        let mut builder = AlertBuilder {
            crop: maize,
            reference_date: date(),
            yield_basis_t_ha: maize.reference_yield_t_ha,
            alerts: Vec::new(),
        };
        builder.push("heat_stress", AlertCategory::Weather, Severity::Medium, "Heat", "past", "water");
        builder.push("heat_stress", AlertCategory::Weather, Severity::High, "Heat", "forecast", "water");
        builder.push("heat_stress", AlertCategory::Weather, Severity::High, "Heat", "again", "water");
        builder.push("frost", AlertCategory::Weather, Severity::Low, "Frost", "cold", "cover");

        let mut kept = keep_most_severe(builder.alerts);
        kept.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].id, "frost");
        assert_eq!(kept[1].id, "heat_stress");
        assert_eq!(kept[1].severity, Severity::High);
        assert_eq!(kept[1].message, "forecast");
        assert_eq!(kept[1].deadline, date() + Duration::days(3));
    }

    #[test]
    fn test_irrigation_alert_without_weather() {
        let catalog = CropCatalog::builtin();
        let maize = catalog.get("maize").unwrap();
        let irrigation = IrrigationAdvice {
            urgency: IrrigationUrgency::Immediate,
            reference_et0_mm: 0.0,
            kc: 1.2,
            water_need_mm: 0.0,
            effective_rain_mm: 0.0,
            recommended_depth_mm: 0.0,
            water_need_known: false,
            notes: Vec::new(),
        };

        let mut context = AlertContext::new(date());
        context.irrigation = Some(&irrigation);

        let summary = generate_alerts(&context, maize, 1.0, 8);
        assert_eq!(summary.alerts.len(), 1);
        assert_eq!(summary.alerts[0].id, "irrigation");
        assert_eq!(summary.alerts[0].severity, Severity::High);
        assert!(!summary.alerts[0].action.contains("0 mm"));
        assert!(summary.alerts[0].action.contains("field capacity"));
    }
}
