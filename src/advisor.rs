//! Field Advisor - main coordinator for field analysis
//!
//! Runs every analysis for a field in dependency order (trends → health →
//! growth stage → weather → nitrogen and irrigation → yield → outlook →
//! alerts). Analyses whose inputs are missing are skipped and recorded as
//! report warnings; only an unknown crop or invalid field metadata fail
//! the whole run. Batches of fields are analyzed in parallel with Rayon.

use std::borrow::Cow;
use std::time::Instant;

use chrono::Utc;
use rayon::prelude::*;

use crate::analysis::*;
use crate::config::AdvisorConfig;
use crate::crops::{CropCatalog, CropProfile};
use crate::data::{clean_observations, days_before, FieldData, IndexKind, WeatherDay};
use crate::error::{AnalysisError, AnalysisResult};
use crate::report::FieldReport;

/// Main field advisor
pub struct FieldAdvisor {
    catalog: CropCatalog,
    config: AdvisorConfig,
}

impl FieldAdvisor {
    pub fn new(catalog: CropCatalog, config: AdvisorConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &CropCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    /// Analyze a single field
    pub fn analyze(&self, field: &FieldData) -> AnalysisResult<FieldReport> {
        let start = Instant::now();
        let crop = self.catalog.get(&field.crop)?;
        validate_field(field)?;

        let mut warnings = Vec::new();
        let (clipped, late) = observed_by_reference(field);
        let field: &FieldData = &clipped;
        if late > 0 {
            warnings.push(format!("{} index observation(s) after the reference date ignored", late));
        }
        let trend_config = &self.config.trend;

        // 1. Index trends and anomalies
        let mut trends = Vec::new();
        let mut anomalies = Vec::new();
        for kind in IndexKind::all() {
            let Some(series) = field.series(*kind) else {
                continue;
            };
            match analyze_trend(series, trend_config) {
                Ok(trend) => trends.push(trend),
                Err(e) => {
                    tracing::debug!("{}: {} trend skipped: {}", field.field_id, kind, e);
                    warnings.push(format!("{} trend not available: {}", kind, e));
                }
            }
            anomalies.extend(detect_anomalies(series, trend_config));
        }
        let trend_of = |kind: IndexKind| trends.iter().find(|t| t.kind == kind);
        let ndvi_trend = trend_of(IndexKind::Ndvi);

        // 2. Vegetation health
        let snapshot = VegetationSnapshot::from_field(field, trend_config);
        let health = match assess_health(&snapshot, crop, ndvi_trend) {
            Ok(health) => Some(health),
            Err(e) => {
                warnings.push(format!("Crop health not assessed: {}", e));
                None
            }
        };

        // 3. Growth stage
        let growth = assess_growth(
            crop,
            field.sowing_date,
            field.reference_date,
            &field.weather_history,
            ndvi_trend,
        );
        if growth.source == StageSource::Unknown {
            warnings.push("Growth stage unknown: no sowing date with weather and no NDVI trend".to_string());
        }

        // 4. Weather (recent window and forecast)
        let window_start = days_before(field.reference_date, self.config.weather_window_days);
        let recent: Vec<WeatherDay> = field
            .weather_history
            .iter()
            .filter(|d| d.date > window_start && d.date <= field.reference_date)
            .cloned()
            .collect();
        let weather = summarize_weather(&recent, crop, field, growth.stage, "Weather history", &mut warnings);
        let forecast = summarize_weather(
            &field.weather_forecast,
            crop,
            field,
            growth.stage,
            "Weather forecast",
            &mut warnings,
        );

        // 5. Nitrogen
        let water_stressed = health.as_ref().map(|h| h.has_water_stress()).unwrap_or(false);
        let nitrogen = match snapshot.reci {
            Some(reci) => match assess_nitrogen(
                reci,
                crop,
                growth.stage,
                field.nitrogen_applied_kg_ha,
                trend_of(IndexKind::Reci),
                water_stressed,
            ) {
                Ok(n) => Some(n),
                Err(e) => {
                    warnings.push(format!("Nitrogen not assessed: {}", e));
                    None
                }
            },
            None => {
                warnings.push("No ReCI data: nitrogen assessment skipped".to_string());
                None
            }
        };

        // 6. Irrigation
        let ndmi_status = health
            .as_ref()
            .and_then(|h| h.index(IndexKind::Ndmi))
            .map(|i| i.status);
        let irrigation = advise_irrigation(
            snapshot.smi,
            ndmi_status,
            crop,
            growth.stage,
            &recent,
            &field.weather_forecast,
            &field.location,
        );

        // 7. Yield
        let ndvi_observations = field
            .series(IndexKind::Ndvi)
            .map(|s| clean_observations(&s.observations, trend_config.max_cloud_cover_pct).len())
            .unwrap_or(0);
        let peak_ndvi = ndvi_trend.map(|t| t.peak_value).or(snapshot.ndvi);
        let yield_prediction = match peak_ndvi {
            Some(peak_ndvi) => match predict_yield(&YieldInputs {
                peak_ndvi,
                crop,
                stage: growth.stage,
                observation_count: ndvi_observations,
                health: health.as_ref(),
                weather: weather.as_ref(),
                nitrogen: nitrogen.as_ref(),
            }) {
                Ok(prediction) => Some(prediction),
                Err(e) => {
                    warnings.push(format!("Yield not predicted: {}", e));
                    None
                }
            },
            None => {
                warnings.push("No NDVI data: yield prediction skipped".to_string());
                None
            }
        };

        // 8. Productivity outlook
        let weather_risk = [weather.as_ref(), forecast.as_ref()]
            .into_iter()
            .flatten()
            .map(|w| w.overall_risk)
            .max()
            .unwrap_or(Severity::None);
        let productivity = match (field.series(IndexKind::Ndvi), health.as_ref()) {
            (Some(ndvi), Some(health)) => match predict_productivity(ndvi, crop, health, weather_risk, &self.config) {
                Ok(p) => Some(p),
                Err(e) => {
                    warnings.push(format!("Productivity outlook not available: {}", e));
                    None
                }
            },
            _ => None,
        };

        // 9. Alerts
        let context = AlertContext {
            reference_date: field.reference_date,
            health: health.as_ref(),
            ndvi_trend,
            anomalies: &anomalies,
            anomaly_window_days: self.config.anomaly_alert_window_days,
            weather: weather.as_ref(),
            forecast: forecast.as_ref(),
            growth: Some(&growth),
            nitrogen: nitrogen.as_ref(),
            irrigation: Some(&irrigation),
            yield_prediction: yield_prediction.as_ref(),
        };
        let alerts = generate_alerts(&context, crop, field.area_ha, self.config.max_alerts);

        tracing::info!(
            "Analyzed field {} ({}): {} alerts, highest {:?}, {} warnings in {:?}",
            field.field_id,
            crop.key,
            alerts.alerts.len(),
            alerts.highest_severity,
            warnings.len(),
            start.elapsed()
        );

        Ok(FieldReport {
            field_id: field.field_id.clone(),
            field_name: field.name.clone(),
            crop: crop.key.clone(),
            crop_name: crop.name.clone(),
            area_ha: field.area_ha,
            reference_date: field.reference_date,
            generated_at: Utc::now(),
            trends,
            anomalies,
            health,
            weather,
            forecast,
            growth,
            nitrogen,
            irrigation,
            yield_prediction,
            productivity,
            alerts,
            warnings,
        })
    }

    /// Analyze many fields in parallel
    ///
    /// Results are returned in input order; one failing field does not
    /// affect the others.
    pub fn analyze_batch(&self, fields: &[FieldData]) -> Vec<AnalysisResult<FieldReport>> {
        let start = Instant::now();
        let results: Vec<AnalysisResult<FieldReport>> = fields.par_iter().map(|f| self.analyze(f)).collect();

        let failed = results.iter().filter(|r| r.is_err()).count();
        tracing::info!(
            "Analyzed {} fields ({} failed) in {:?}",
            fields.len(),
            failed,
            start.elapsed()
        );
        results
    }
}

impl Default for FieldAdvisor {
    fn default() -> Self {
        Self::new(CropCatalog::builtin(), AdvisorConfig::default())
    }
}

/// Field without index observations dated after its reference date
fn observed_by_reference(field: &FieldData) -> (Cow<'_, FieldData>, usize) {
    let late = field
        .indices
        .iter()
        .flat_map(|s| s.observations.iter())
        .filter(|o| o.date > field.reference_date)
        .count();
    if late == 0 {
        return (Cow::Borrowed(field), 0);
    }

    let mut clipped = field.clone();
    for series in &mut clipped.indices {
        series.observations.retain(|o| o.date <= field.reference_date);
    }
    (Cow::Owned(clipped), late)
}

fn validate_field(field: &FieldData) -> AnalysisResult<()> {
    if field.field_id.trim().is_empty() {
        return Err(AnalysisError::InvalidInput("field_id is empty".to_string()));
    }
    if !field.area_ha.is_finite() || field.area_ha < 0.0 {
        return Err(AnalysisError::InvalidInput(format!(
            "field {} has invalid area {}",
            field.field_id, field.area_ha
        )));
    }
    let lat = field.location.latitude;
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(AnalysisError::InvalidInput(format!(
            "field {} has invalid latitude {}",
            field.field_id, lat
        )));
    }
    Ok(())
}

fn summarize_weather(
    days: &[WeatherDay],
    crop: &CropProfile,
    field: &FieldData,
    stage: GrowthStage,
    label: &str,
    warnings: &mut Vec<String>,
) -> Option<WeatherSummary> {
    if days.is_empty() {
        warnings.push(format!("{} not available", label));
        return None;
    }
    match analyze_weather(days, crop, &field.location, stage) {
        Ok(summary) => Some(summary),
        Err(e) => {
            tracing::warn!("{}: {} rejected: {}", field.field_id, label, e);
            warnings.push(format!("{} rejected: {}", label, e));
            None
        }
    }
}
