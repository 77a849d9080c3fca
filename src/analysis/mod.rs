pub mod types;
pub mod eos_analysis;
pub mod vegetation_health;
pub mod weather_analysis;
pub mod growth_stage;
pub mod nitrogen_analysis;
pub mod irrigation;
pub mod yield_prediction;
pub mod productivity_prediction;
pub mod intelligent_alerts;

pub use types::{Confidence, GrowthStage, HealthStatus, Severity, TrendDirection};

pub use eos_analysis::{
    analyze_trend, detect_anomalies, latest_value, project, project_trend, Anomaly, AnomalyKind, Projection,
    TrendAnalysis,
};
pub use vegetation_health::{assess_health, IndexStatus, StressFactor, StressKind, VegetationHealth, VegetationSnapshot};
pub use weather_analysis::{
    analyze_weather, day_et0, gdd_since, growing_degree_days, hargreaves_et0, WeatherRisk, WeatherRiskKind,
    WeatherSummary,
};
pub use growth_stage::{assess_growth, GrowthAssessment, StageSource, VigorClass};
pub use nitrogen_analysis::{assess_nitrogen, FertilizationUrgency, NitrogenAssessment, NitrogenStatus};
pub use irrigation::{advise_irrigation, IrrigationAdvice, IrrigationUrgency};
pub use yield_prediction::{predict_yield, LossFactor, YieldClass, YieldInputs, YieldLoss, YieldPrediction};
pub use productivity_prediction::{predict_productivity, Outlook, ProductivityPrediction};
pub use intelligent_alerts::{generate_alerts, Alert, AlertCategory, AlertContext, AlertSummary};
