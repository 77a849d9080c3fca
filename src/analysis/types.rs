use serde::{Deserialize, Serialize};

/// Severity level for stresses, risks and alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// One level more severe, saturating at Critical
    pub fn escalate(self) -> Self {
        match self {
            Severity::None => Severity::Info,
            Severity::Info => Severity::Low,
            Severity::Low => Severity::Medium,
            Severity::Medium => Severity::High,
            Severity::High | Severity::Critical => Severity::Critical,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Severity::None => "✅",
            Severity::Info => "ℹ️",
            Severity::Low => "🔹",
            Severity::Medium => "⚠️",
            Severity::High => "🚨",
            Severity::Critical => "⛔",
        }
    }

    pub fn display_text(&self) -> &'static str {
        match self {
            Severity::None => "None",
            Severity::Info => "Info",
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Health classification against crop thresholds (worst to best)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Critical,
    Poor,
    Moderate,
    Good,
    Excellent,
}

impl HealthStatus {
    /// Derive status from a 0-100 score
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 80.0 => HealthStatus::Excellent,
            s if s >= 60.0 => HealthStatus::Good,
            s if s >= 40.0 => HealthStatus::Moderate,
            s if s >= 20.0 => HealthStatus::Poor,
            _ => HealthStatus::Critical,
        }
    }

    pub fn display_text(&self) -> &'static str {
        match self {
            HealthStatus::Critical => "Critical",
            HealthStatus::Poor => "Poor",
            HealthStatus::Moderate => "Moderate",
            HealthStatus::Good => "Good",
            HealthStatus::Excellent => "Excellent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Stable,
    Decreasing,
}

impl TrendDirection {
    pub fn display_text(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "Increasing",
            TrendDirection::Stable => "Stable",
            TrendDirection::Decreasing => "Decreasing",
        }
    }
}

/// Crop development stage (ordered from sowing to harvest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthStage {
    Dormant,
    Emergence,
    Vegetative,
    RapidGrowth,
    Flowering,
    GrainFill,
    Maturity,
}

impl GrowthStage {
    /// Stages with a thermal-time start, in order
    pub fn thermal_stages() -> &'static [GrowthStage; 6] {
        &[
            GrowthStage::Emergence,
            GrowthStage::Vegetative,
            GrowthStage::RapidGrowth,
            GrowthStage::Flowering,
            GrowthStage::GrainFill,
            GrowthStage::Maturity,
        ]
    }

    pub fn display_text(&self) -> &'static str {
        match self {
            GrowthStage::Dormant => "Dormant / pre-sowing",
            GrowthStage::Emergence => "Emergence",
            GrowthStage::Vegetative => "Vegetative",
            GrowthStage::RapidGrowth => "Rapid growth",
            GrowthStage::Flowering => "Flowering",
            GrowthStage::GrainFill => "Grain / fruit fill",
            GrowthStage::Maturity => "Maturity",
        }
    }

    /// Actively building canopy and taking up nutrients
    pub fn is_active_growth(&self) -> bool {
        matches!(
            self,
            GrowthStage::Emergence | GrowthStage::Vegetative | GrowthStage::RapidGrowth
        )
    }
}
