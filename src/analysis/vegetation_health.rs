//! Vegetation Health Classification
//!
//! Scores the latest NDVI / NDMI / ReCI / SMI values against the crop's
//! threshold bands, combines them into a composite health score and
//! identifies stress types.

use serde::{Deserialize, Serialize};

use crate::analysis::eos_analysis::{latest_value, TrendAnalysis};
use crate::analysis::types::{Confidence, HealthStatus, Severity, TrendDirection};
use crate::config::TrendConfig;
use crate::crops::CropProfile;
use crate::data::{FieldData, IndexKind};
use crate::error::{AnalysisError, AnalysisResult};
use crate::utils::{band_score, classify};

/// Composite weights (renormalized over the indices available)
const WEIGHTS: [(IndexKind, f64); 4] = [
    (IndexKind::Ndvi, 0.40),
    (IndexKind::Ndmi, 0.25),
    (IndexKind::Reci, 0.25),
    (IndexKind::Smi, 0.10),
];

/// Latest value of each index
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VegetationSnapshot {
    pub ndvi: Option<f64>,
    pub ndmi: Option<f64>,
    pub reci: Option<f64>,
    pub smi: Option<f64>,
}

impl VegetationSnapshot {
    /// Build from the last usable scene of each series
    pub fn from_field(field: &FieldData, config: &TrendConfig) -> Self {
        let latest = |kind| field.series(kind).and_then(|s| latest_value(s, config)).map(|(_, v)| v);
        Self {
            ndvi: latest(IndexKind::Ndvi),
            ndmi: latest(IndexKind::Ndmi),
            reci: latest(IndexKind::Reci),
            smi: latest(IndexKind::Smi),
        }
    }

    pub fn get(&self, kind: IndexKind) -> Option<f64> {
        match kind {
            IndexKind::Ndvi => self.ndvi,
            IndexKind::Ndmi => self.ndmi,
            IndexKind::Reci => self.reci,
            IndexKind::Smi => self.smi,
        }
        .filter(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatus {
    pub kind: IndexKind,
    pub value: f64,
    pub score: f64,
    pub status: HealthStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressKind {
    WaterStress,
    NutrientStress,
    VigorLoss,
    Waterlogging,
}

impl StressKind {
    pub fn display_text(&self) -> &'static str {
        match self {
            StressKind::WaterStress => "Water stress",
            StressKind::NutrientStress => "Nutrient stress",
            StressKind::VigorLoss => "Loss of vigor",
            StressKind::Waterlogging => "Waterlogging",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressFactor {
    pub kind: StressKind,
    pub severity: Severity,
    pub evidence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VegetationHealth {
    /// Composite score 0-100 after trend adjustment
    pub score: f64,
    pub status: HealthStatus,
    pub indices: Vec<IndexStatus>,
    pub stresses: Vec<StressFactor>,
    pub summary: String,
}

impl VegetationHealth {
    pub fn index(&self, kind: IndexKind) -> Option<&IndexStatus> {
        self.indices.iter().find(|i| i.kind == kind)
    }

    pub fn stress(&self, kind: StressKind) -> Option<&StressFactor> {
        self.stresses.iter().find(|s| s.kind == kind)
    }

    pub fn has_water_stress(&self) -> bool {
        self.stress(StressKind::WaterStress).is_some()
    }
}

/// Assess crop health from the latest index values
///
/// Returns `NoIndexData` when no index value is available.
pub fn assess_health(
    snapshot: &VegetationSnapshot,
    crop: &CropProfile,
    ndvi_trend: Option<&TrendAnalysis>,
) -> AnalysisResult<VegetationHealth> {
    let mut indices = Vec::new();
    let mut weighted = 0.0;
    let mut weight_total = 0.0;

    for (kind, weight) in WEIGHTS {
        if let Some(value) = snapshot.get(kind) {
            let thresholds = crop.thresholds(kind);
            let score = band_score(value, thresholds);
            indices.push(IndexStatus {
                kind,
                value,
                score,
                status: classify(value, thresholds),
            });
            weighted += score * weight;
            weight_total += weight;
        }
    }

    if indices.is_empty() {
        return Err(AnalysisError::NoIndexData);
    }

    let mut score = weighted / weight_total;
    if let Some(trend) = ndvi_trend {
        score += match (trend.direction, trend.confidence) {
            (TrendDirection::Decreasing, Confidence::High) => -5.0,
            (TrendDirection::Decreasing, Confidence::Medium) => -3.0,
            (TrendDirection::Increasing, _) => 3.0,
            _ => 0.0,
        };
    }
    let score = score.clamp(0.0, 100.0);
    let status = HealthStatus::from_score(score);

    let stresses = detect_stresses(&indices, snapshot, ndvi_trend);
    let summary = summarize(crop, status, &stresses);

    Ok(VegetationHealth { score, status, indices, stresses, summary })
}

fn status_of(indices: &[IndexStatus], kind: IndexKind) -> Option<HealthStatus> {
    indices.iter().find(|i| i.kind == kind).map(|i| i.status)
}

fn detect_stresses(
    indices: &[IndexStatus],
    snapshot: &VegetationSnapshot,
    ndvi_trend: Option<&TrendAnalysis>,
) -> Vec<StressFactor> {
    let mut stresses = Vec::new();
    let ndvi = status_of(indices, IndexKind::Ndvi);
    let ndmi = status_of(indices, IndexKind::Ndmi);
    let reci = status_of(indices, IndexKind::Reci);
    let smi = snapshot.get(IndexKind::Smi);

    // Water stress: dry canopy or soil well below its baseline
    let canopy_dry = ndmi.map_or(false, |s| s <= HealthStatus::Poor);
    let soil_dry = smi.map_or(false, |v| v < -1.0);
    if canopy_dry || soil_dry {
        let severe = ndmi == Some(HealthStatus::Critical) || smi.map_or(false, |v| v < -2.0);
        let mut evidence = Vec::new();
        if let Some(s) = ndmi.filter(|_| canopy_dry) {
            evidence.push(format!("NDMI {}", s.display_text().to_lowercase()));
        }
        if let Some(v) = smi.filter(|_| soil_dry) {
            evidence.push(format!("soil moisture anomaly {:.1} SD", v));
        }
        stresses.push(StressFactor {
            kind: StressKind::WaterStress,
            severity: if severe { Severity::High } else { Severity::Medium },
            evidence: evidence.join(", "),
        });
    }

    // Chlorophyll low while the canopy itself is reasonably developed
    if let (Some(r), Some(n)) = (reci, ndvi) {
        if r <= HealthStatus::Poor && n >= HealthStatus::Moderate {
            stresses.push(StressFactor {
                kind: StressKind::NutrientStress,
                severity: if r == HealthStatus::Critical { Severity::High } else { Severity::Medium },
                evidence: format!(
                    "ReCI {} despite {} NDVI",
                    r.display_text().to_lowercase(),
                    n.display_text().to_lowercase()
                ),
            });
        }
    }

    if let (Some(trend), Some(n)) = (ndvi_trend, ndvi) {
        if trend.direction == TrendDirection::Decreasing && n <= HealthStatus::Moderate {
            stresses.push(StressFactor {
                kind: StressKind::VigorLoss,
                severity: if n <= HealthStatus::Poor { Severity::High } else { Severity::Medium },
                evidence: format!("NDVI falling {:.3}/week", trend.weekly_change.abs()),
            });
        }
    }

    if let Some(v) = smi.filter(|v| *v > 2.0) {
        stresses.push(StressFactor {
            kind: StressKind::Waterlogging,
            severity: if v > 3.0 { Severity::High } else { Severity::Medium },
            evidence: format!("soil moisture anomaly +{:.1} SD", v),
        });
    }

    stresses
}

fn summarize(crop: &CropProfile, status: HealthStatus, stresses: &[StressFactor]) -> String {
    if stresses.is_empty() {
        format!("{} canopy is {} with no stress detected", crop.name, status.display_text().to_lowercase())
    } else {
        let names: Vec<&str> = stresses.iter().map(|s| s.kind.display_text()).collect();
        format!(
            "{} canopy is {}; detected: {}",
            crop.name,
            status.display_text().to_lowercase(),
            names.join(", ")
        )
    }
}
