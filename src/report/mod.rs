//! Field report: the combined output of one advisor run

pub mod formatters;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{
    AlertSummary, Anomaly, GrowthAssessment, IrrigationAdvice, NitrogenAssessment, ProductivityPrediction,
    TrendAnalysis, VegetationHealth, WeatherSummary, YieldPrediction,
};
use crate::data::IndexKind;

pub use formatters::{JsonFormatter, MarkdownFormatter};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldReport {
    pub field_id: String,
    pub field_name: String,
    pub crop: String,
    pub crop_name: String,
    pub area_ha: f64,
    pub reference_date: NaiveDate,
    pub generated_at: DateTime<Utc>,

    pub trends: Vec<TrendAnalysis>,
    pub anomalies: Vec<Anomaly>,
    pub health: Option<VegetationHealth>,
    /// Recent weather history
    pub weather: Option<WeatherSummary>,
    /// Upcoming forecast days
    pub forecast: Option<WeatherSummary>,
    pub growth: GrowthAssessment,
    pub nitrogen: Option<NitrogenAssessment>,
    pub irrigation: IrrigationAdvice,
    pub yield_prediction: Option<YieldPrediction>,
    pub productivity: Option<ProductivityPrediction>,
    pub alerts: AlertSummary,

    /// Analyses skipped for lack of data, with the reason
    pub warnings: Vec<String>,
}

impl FieldReport {
    pub fn trend(&self, kind: IndexKind) -> Option<&TrendAnalysis> {
        self.trends.iter().find(|t| t.kind == kind)
    }
}
