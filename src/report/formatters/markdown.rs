use crate::analysis::{GrowthAssessment, IrrigationUrgency, NitrogenAssessment, WeatherSummary, YieldPrediction};
use crate::report::FieldReport;

/// Markdown formatter for field reports
pub struct MarkdownFormatter;

impl MarkdownFormatter {
    /// Format report as markdown
    pub fn format(report: &FieldReport) -> String {
        let mut md = String::with_capacity(4096);

        md.push_str(&format!("# {} ({})\n\n", display_name(report), report.crop_name));
        md.push_str(&format!(
            "**Field:** {} | **Area:** {:.1} ha | **Reference date:** {}\n\n",
            report.field_id, report.area_ha, report.reference_date
        ));

        // Alerts
        md.push_str("## Alerts\n\n");
        if report.alerts.alerts.is_empty() {
            md.push_str("✅ No active alerts\n\n");
        } else {
            for alert in &report.alerts.alerts {
                md.push_str(&format!(
                    "{} **{}** ({})\n\n",
                    alert.severity.icon(),
                    alert.title,
                    alert.severity.display_text()
                ));
                md.push_str(&format!("{}  \n", alert.message));
                md.push_str(&format!("*Action:* {} by {}", alert.action, alert.deadline));
                if alert.economic_risk_eur_ha > 0.0 {
                    md.push_str(&format!("  \n*Risk:* €{:.0}/ha", alert.economic_risk_eur_ha));
                }
                md.push_str("\n\n");
            }
            if report.alerts.suppressed > 0 {
                md.push_str(&format!("*{} lower-priority alerts not shown*\n\n", report.alerts.suppressed));
            }
            md.push_str(&format!(
                "**Estimated economic risk:** €{:.0}/ha (€{:.0} for the field)\n\n",
                report.alerts.total_economic_risk_eur_ha, report.alerts.total_economic_risk_eur
            ));
        }

        if let Some(health) = &report.health {
            md.push_str(&format!(
                "## Crop Health: {:.0}/100 ({})\n\n",
                health.score,
                health.status.display_text()
            ));
            md.push_str(&format!("{}\n\n", health.summary));
            md.push_str("| Index | Value | Score | Status |\n");
            md.push_str("|-------|-------|-------|--------|\n");
            for index in &health.indices {
                md.push_str(&format!(
                    "| {} | {:.2} | {:.0} | {} |\n",
                    index.kind,
                    index.value,
                    index.score,
                    index.status.display_text()
                ));
            }
            md.push('\n');
            for stress in &health.stresses {
                md.push_str(&format!(
                    "- {} **{}**: {}\n",
                    stress.severity.icon(),
                    stress.kind.display_text(),
                    stress.evidence
                ));
            }
            if !health.stresses.is_empty() {
                md.push('\n');
            }
        }

        if !report.trends.is_empty() {
            md.push_str("## Index Trends\n\n");
            md.push_str("| Index | Direction | Weekly change | Confidence | Current |\n");
            md.push_str("|-------|-----------|---------------|------------|---------|\n");
            for trend in &report.trends {
                md.push_str(&format!(
                    "| {} | {} | {:+.3} | {:?} | {:.2} |\n",
                    trend.kind,
                    trend.direction.display_text(),
                    trend.weekly_change,
                    trend.confidence,
                    trend.current_value
                ));
            }
            md.push('\n');
        }

        Self::format_growth(&mut md, &report.growth);

        if let Some(weather) = &report.weather {
            md.push_str("## Weather (recent)\n\n");
            Self::format_weather(&mut md, weather);
        }
        if let Some(forecast) = &report.forecast {
            md.push_str("## Weather (forecast)\n\n");
            Self::format_weather(&mut md, forecast);
        }

        if let Some(nitrogen) = &report.nitrogen {
            Self::format_nitrogen(&mut md, nitrogen);
        }

        md.push_str("## Irrigation\n\n");
        let irrigation = &report.irrigation;
        md.push_str(&format!("**{}**", irrigation.urgency.display_text()));
        if irrigation.urgency >= IrrigationUrgency::Soon {
            md.push_str(&format!(": {}", irrigation.action_text().to_lowercase()));
        }
        md.push_str("\n\n");
        md.push_str(&format!(
            "Weekly crop water need {:.0} mm (ET0 {:.1} mm/day × Kc {:.2}), effective forecast rain {:.0} mm\n\n",
            irrigation.water_need_mm, irrigation.reference_et0_mm, irrigation.kc, irrigation.effective_rain_mm
        ));
        for note in &irrigation.notes {
            md.push_str(&format!("- {}\n", note));
        }
        if !irrigation.notes.is_empty() {
            md.push('\n');
        }

        if let Some(prediction) = &report.yield_prediction {
            Self::format_yield(&mut md, prediction);
        }

        if let Some(productivity) = &report.productivity {
            md.push_str("## Productivity Outlook\n\n");
            md.push_str(&format!(
                "**{}** (index {:.0}/100): NDVI {:.2} → {:.2} in {} days\n\n",
                productivity.outlook.display_text(),
                productivity.index,
                productivity.current_ndvi,
                productivity.projected_ndvi,
                productivity.horizon_days
            ));
        }

        if !report.warnings.is_empty() {
            md.push_str("## Data Notes\n\n");
            for warning in &report.warnings {
                md.push_str(&format!("- {}\n", warning));
            }
            md.push('\n');
        }

        md.push_str(&format!("---\n*Generated {}*\n", report.generated_at.format("%Y-%m-%d %H:%M UTC")));
        md
    }

    fn format_growth(md: &mut String, growth: &GrowthAssessment) {
        md.push_str(&format!("## Growth Stage: {}\n\n", growth.stage.display_text()));
        if let Some(gdd) = growth.gdd_since_sowing {
            md.push_str(&format!("- Thermal time since sowing: {:.0} GDD\n", gdd));
        }
        if let Some(progress) = growth.stage_progress {
            md.push_str(&format!("- Stage progress: {:.0}%\n", progress * 100.0));
        }
        if let (Some(next), Some(days)) = (growth.next_stage, growth.days_to_next_stage) {
            md.push_str(&format!("- {} expected in about {:.0} days\n", next.display_text(), days));
        }
        if let (Some(ratio), Some(vigor)) = (growth.vigor_ratio, growth.vigor) {
            md.push_str(&format!("- Canopy vigor: {:?} ({:.0}% of expected NDVI)\n", vigor, ratio * 100.0));
        }
        md.push_str(&format!("\n{}\n\n", growth.advice));
    }

    fn format_weather(md: &mut String, weather: &WeatherSummary) {
        md.push_str(&format!(
            "{} to {} ({} days): mean {:.1}°C, rain {:.0} mm, crop ET {:.0} mm, balance {:+.0} mm, {:.0} GDD\n\n",
            weather.first_date,
            weather.last_date,
            weather.days,
            weather.mean_temp_c,
            weather.total_precipitation_mm,
            weather.crop_et_mm,
            weather.water_balance_mm,
            weather.gdd
        ));
        for risk in &weather.risks {
            md.push_str(&format!("- {} **{}**: {}\n", risk.severity.icon(), risk.kind.display_text(), risk.message));
        }
        if !weather.risks.is_empty() {
            md.push('\n');
        }
    }

    fn format_nitrogen(md: &mut String, nitrogen: &NitrogenAssessment) {
        md.push_str(&format!("## Nitrogen: {}\n\n", nitrogen.status.display_text()));
        md.push_str(&format!(
            "NNI {:.2} (ReCI {:.2}); {:.0} kg N/ha applied, {:.0} kg N/ha left in the seasonal budget\n\n",
            nitrogen.nni, nitrogen.reci, nitrogen.applied_kg_ha, nitrogen.remaining_budget_kg_ha
        ));
        if nitrogen.recommended_dose_kg_ha > 0.0 {
            md.push_str(&format!(
                "**Recommended dose:** {:.0} kg N/ha ({:?})\n\n",
                nitrogen.recommended_dose_kg_ha, nitrogen.urgency
            ));
        }
        for note in &nitrogen.notes {
            md.push_str(&format!("- {}\n", note));
        }
        if !nitrogen.notes.is_empty() {
            md.push('\n');
        }
    }

    fn format_yield(md: &mut String, prediction: &YieldPrediction) {
        md.push_str("## Yield Prediction\n\n");
        md.push_str(&format!(
            "**{:.1} t/ha** (range {:.1}-{:.1}, {:?} confidence), {:.0}% of reference, gross value €{:.0}/ha\n\n",
            prediction.expected_t_ha,
            prediction.low_t_ha,
            prediction.high_t_ha,
            prediction.confidence,
            prediction.relative_to_reference * 100.0,
            prediction.gross_value_eur_ha
        ));
        if !prediction.losses.is_empty() {
            md.push_str("| Limiting factor | Loss |\n");
            md.push_str("|-----------------|------|\n");
            for loss in &prediction.losses {
                md.push_str(&format!("| {} | {:.1}% |\n", loss.factor.display_text(), loss.fraction * 100.0));
            }
            md.push('\n');
        }
    }
}

fn display_name(report: &FieldReport) -> &str {
    if report.field_name.is_empty() {
        &report.field_id
    } else {
        &report.field_name
    }
}
