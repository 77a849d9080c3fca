//! Nitrogen Status and Fertilization
//!
//! The Red-edge Chlorophyll Index tracks canopy chlorophyll, which follows
//! leaf nitrogen closely. Dividing it by the crop's optimal ReCI gives a
//! nitrogen nutrition index (NNI) around 1.0 for an adequately fed crop.

use serde::{Deserialize, Serialize};

use crate::analysis::eos_analysis::TrendAnalysis;
use crate::analysis::types::{Confidence, GrowthStage, TrendDirection};
use crate::crops::CropProfile;
use crate::error::{AnalysisError, AnalysisResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NitrogenStatus {
    Deficient,
    Low,
    Optimal,
    Excess,
}

impl NitrogenStatus {
    pub fn from_nni(nni: f64) -> Self {
        if nni < 0.7 {
            NitrogenStatus::Deficient
        } else if nni < 0.9 {
            NitrogenStatus::Low
        } else if nni <= 1.15 {
            NitrogenStatus::Optimal
        } else {
            NitrogenStatus::Excess
        }
    }

    pub fn display_text(&self) -> &'static str {
        match self {
            NitrogenStatus::Deficient => "Deficient",
            NitrogenStatus::Low => "Low",
            NitrogenStatus::Optimal => "Optimal",
            NitrogenStatus::Excess => "Excess",
        }
    }

    pub fn is_short(&self) -> bool {
        matches!(self, NitrogenStatus::Deficient | NitrogenStatus::Low)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FertilizationUrgency {
    None,
    Monitor,
    Soon,
    Immediate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NitrogenAssessment {
    pub reci: f64,
    /// Nitrogen nutrition index (ReCI / optimal ReCI), 0-2
    pub nni: f64,
    pub status: NitrogenStatus,
    pub stage: GrowthStage,
    /// Share of the seasonal requirement taken up in this stage
    pub stage_share: f64,
    pub applied_kg_ha: f64,
    pub remaining_budget_kg_ha: f64,
    /// Recommended dose, rounded to 5 kg N/ha
    pub recommended_dose_kg_ha: f64,
    pub urgency: FertilizationUrgency,
    pub notes: Vec<String>,
}

/// Fraction of seasonal nitrogen uptake per stage
pub fn stage_share(stage: GrowthStage) -> f64 {
    match stage {
        GrowthStage::Emergence => 0.15,
        GrowthStage::Vegetative => 0.30,
        GrowthStage::RapidGrowth => 0.40,
        GrowthStage::Flowering => 0.15,
        _ => 0.0,
    }
}

fn round_to_5(kg: f64) -> f64 {
    (kg / 5.0).round() * 5.0
}

/// Assess nitrogen status and recommend a top-dressing dose
pub fn assess_nitrogen(
    reci: f64,
    crop: &CropProfile,
    stage: GrowthStage,
    applied_kg_ha: f64,
    reci_trend: Option<&TrendAnalysis>,
    water_stressed: bool,
) -> AnalysisResult<NitrogenAssessment> {
    if !reci.is_finite() {
        return Err(AnalysisError::InvalidInput(format!("ReCI value {} is not finite", reci)));
    }
    let optimal = crop.reci_optimal_mid();
    if optimal <= 0.0 {
        return Err(AnalysisError::InvalidInput(format!(
            "crop '{}' has no positive ReCI optimum",
            crop.key
        )));
    }

    let nni = (reci / optimal).clamp(0.0, 2.0);
    let status = NitrogenStatus::from_nni(nni);
    let share = stage_share(stage);
    let applied = applied_kg_ha.max(0.0);
    let remaining = (crop.n_requirement_kg_ha - applied).max(0.0);

    let deficit_factor = match status {
        NitrogenStatus::Deficient => 1.0,
        NitrogenStatus::Low => 0.6,
        _ => 0.0,
    };
    let dose = round_to_5(
        (crop.n_requirement_kg_ha * share * deficit_factor)
            .min(crop.max_single_n_dose_kg_ha)
            .min(remaining),
    );

    let declining = reci_trend
        .map(|t| t.direction == TrendDirection::Decreasing && t.confidence >= Confidence::Medium)
        .unwrap_or(false);

    let mut urgency = match status {
        NitrogenStatus::Deficient if share > 0.0 => FertilizationUrgency::Immediate,
        NitrogenStatus::Low if share > 0.0 => FertilizationUrgency::Soon,
        NitrogenStatus::Deficient | NitrogenStatus::Low => FertilizationUrgency::Monitor,
        NitrogenStatus::Optimal if declining => FertilizationUrgency::Monitor,
        _ => FertilizationUrgency::None,
    };

    let mut notes = Vec::new();
    if status.is_short() && share == 0.0 {
        notes.push(format!(
            "Chlorophyll is low but the crop is past its nitrogen uptake window ({})",
            stage.display_text()
        ));
    }
    if status.is_short() && share > 0.0 && dose <= 0.0 {
        urgency = urgency.min(FertilizationUrgency::Monitor);
        notes.push(format!(
            "Seasonal nitrogen budget of {:.0} kg/ha already applied; check for other causes of low chlorophyll",
            crop.n_requirement_kg_ha
        ));
    }
    if water_stressed && dose > 0.0 {
        notes.push("Water stress limits nitrogen uptake: apply after irrigation or rainfall".to_string());
    }
    if status == NitrogenStatus::Excess {
        notes.push("Chlorophyll above optimum: skip the next application to limit lodging and leaching".to_string());
    }
    if declining && status == NitrogenStatus::Optimal {
        notes.push("ReCI is declining: re-check within 7-10 days".to_string());
    }

    Ok(NitrogenAssessment {
        reci,
        nni,
        status,
        stage,
        stage_share: share,
        applied_kg_ha: applied,
        remaining_budget_kg_ha: remaining,
        recommended_dose_kg_ha: dose,
        urgency,
        notes,
    })
}
