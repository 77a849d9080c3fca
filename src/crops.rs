//! Crop Reference Profiles
//!
//! Crop-specific thresholds used to classify index values, thermal-time
//! stage boundaries, water and nitrogen demand, and the economic figures
//! behind yield and alert valuation.
//!
//! A built-in catalog covers the main Italian arable and tree crops. Values
//! can be replaced or extended from a JSON file (array of profiles).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::analysis::types::GrowthStage;
use crate::data::IndexKind;
use crate::error::{AnalysisError, AnalysisResult};

/// Lower bounds of the Poor / Moderate / Good / Excellent classes
///
/// A value below `critical` is Critical, below `poor` is Poor, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexThresholds {
    pub critical: f64,
    pub poor: f64,
    pub moderate: f64,
    pub good: f64,
}

impl IndexThresholds {
    pub const fn new(critical: f64, poor: f64, moderate: f64, good: f64) -> Self {
        Self { critical, poor, moderate, good }
    }
}

/// Standardized soil-moisture anomaly classes (crop independent)
pub const SMI_THRESHOLDS: IndexThresholds = IndexThresholds::new(-2.0, -1.0, -0.5, 0.5);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropProfile {
    pub key: String,
    pub name: String,
    pub name_it: String,

    // Temperature (°C)
    pub base_temp_c: f64,
    pub upper_temp_c: f64,
    pub heat_stress_c: f64,
    pub frost_damage_c: f64,

    // Index classification
    pub ndvi: IndexThresholds,
    pub ndmi: IndexThresholds,
    pub reci: IndexThresholds,
    #[serde(default = "default_smi_thresholds")]
    pub smi: IndexThresholds,
    /// ReCI band for adequate nitrogen status (low, high)
    pub reci_optimal: (f64, f64),
    /// NDVI of a healthy canopy at peak development
    pub ndvi_peak_reference: f64,

    // Yield and economics
    pub potential_yield_t_ha: f64,
    /// Typical Italian yield, used to rank predictions
    pub reference_yield_t_ha: f64,
    pub price_eur_t: f64,

    // Nitrogen
    pub n_requirement_kg_ha: f64,
    pub max_single_n_dose_kg_ha: f64,

    // Water
    pub kc_initial: f64,
    pub kc_mid: f64,
    pub kc_end: f64,
    pub seasonal_water_need_mm: f64,
    /// Fraction of relative water deficit that turns into yield loss (0-1)
    pub water_sensitivity: f64,
    pub irrigated: bool,
    pub max_irrigation_mm: f64,

    /// Cumulative GDD at the start of Emergence, Vegetative, RapidGrowth,
    /// Flowering, GrainFill and Maturity
    pub stage_gdd: [f64; 6],
}

fn default_smi_thresholds() -> IndexThresholds {
    SMI_THRESHOLDS
}

impl CropProfile {
    pub fn thresholds(&self, kind: IndexKind) -> &IndexThresholds {
        match kind {
            IndexKind::Ndvi => &self.ndvi,
            IndexKind::Ndmi => &self.ndmi,
            IndexKind::Reci => &self.reci,
            IndexKind::Smi => &self.smi,
        }
    }

    /// Crop coefficient for a development stage
    pub fn kc_for_stage(&self, stage: GrowthStage) -> f64 {
        match stage {
            GrowthStage::Dormant => 0.0,
            GrowthStage::Emergence => self.kc_initial,
            GrowthStage::Vegetative => (self.kc_initial + self.kc_mid) / 2.0,
            GrowthStage::RapidGrowth | GrowthStage::Flowering | GrowthStage::GrainFill => self.kc_mid,
            GrowthStage::Maturity => self.kc_end,
        }
    }

    /// GDD at which a stage starts (Dormant starts at 0)
    pub fn stage_start_gdd(&self, stage: GrowthStage) -> f64 {
        GrowthStage::thermal_stages()
            .iter()
            .position(|s| *s == stage)
            .map(|i| self.stage_gdd[i])
            .unwrap_or(0.0)
    }

    pub fn reci_optimal_mid(&self) -> f64 {
        (self.reci_optimal.0 + self.reci_optimal.1) / 2.0
    }
}

/// Crop profiles keyed by crop key
#[derive(Debug, Clone)]
pub struct CropCatalog {
    crops: FxHashMap<String, CropProfile>,
}

impl CropCatalog {
    /// Catalog of built-in Italian crop profiles
    pub fn builtin() -> Self {
        let mut crops = FxHashMap::default();
        for profile in builtin_profiles() {
            crops.insert(profile.key.clone(), profile);
        }
        Self { crops }
    }

    /// Built-in catalog with profiles from a JSON file layered on top
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read crop catalog: {:?}", path))?;

        let profiles: Vec<CropProfile> = serde_json::from_str(&contents)
            .with_context(|| "Failed to parse crop catalog JSON")?;

        let mut catalog = Self::builtin();
        for mut profile in profiles {
            // Lookups are case-insensitive, so keys are stored normalized
            profile.key = profile.key.trim().to_ascii_lowercase();
            if profile.key.is_empty() {
                anyhow::bail!("Crop '{}' has an empty key", profile.name);
            }
            if profile.stage_gdd.windows(2).any(|w| w[0] > w[1]) {
                anyhow::bail!("Crop '{}' has non-increasing stage_gdd", profile.key);
            }
            tracing::debug!("Crop catalog override: {}", profile.key);
            catalog.crops.insert(profile.key.clone(), profile);
        }

        Ok(catalog)
    }

    pub fn get(&self, key: &str) -> AnalysisResult<&CropProfile> {
        self.crops
            .get(&key.trim().to_ascii_lowercase())
            .ok_or_else(|| AnalysisError::UnknownCrop(key.to_string()))
    }

    /// Sorted crop keys
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.crops.keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        keys
    }

    pub fn profiles(&self) -> impl Iterator<Item = &CropProfile> {
        self.crops.values()
    }

    pub fn len(&self) -> usize {
        self.crops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crops.is_empty()
    }
}

impl Default for CropCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

// ============================================================================
// Built-in Profiles
// ============================================================================

fn builtin_profiles() -> Vec<CropProfile> {
    vec![
        CropProfile {
            key: "wheat_durum".to_string(),
            name: "Durum wheat".to_string(),
            name_it: "Frumento duro".to_string(),
            base_temp_c: 0.0,
            upper_temp_c: 26.0,
            heat_stress_c: 32.0,
            frost_damage_c: -5.0,
            ndvi: IndexThresholds::new(0.2, 0.3, 0.45, 0.65),
            ndmi: IndexThresholds::new(-0.1, 0.0, 0.1, 0.25),
            reci: IndexThresholds::new(0.7, 1.2, 2.0, 3.0),
            smi: SMI_THRESHOLDS,
            reci_optimal: (2.0, 3.5),
            ndvi_peak_reference: 0.8,
            potential_yield_t_ha: 7.5,
            reference_yield_t_ha: 3.3,
            price_eur_t: 330.0,
            n_requirement_kg_ha: 160.0,
            max_single_n_dose_kg_ha: 60.0,
            kc_initial: 0.4,
            kc_mid: 1.15,
            kc_end: 0.3,
            seasonal_water_need_mm: 450.0,
            water_sensitivity: 0.5,
            irrigated: false,
            max_irrigation_mm: 30.0,
            stage_gdd: [0.0, 150.0, 600.0, 1200.0, 1350.0, 2000.0],
        },
        CropProfile {
            key: "wheat_soft".to_string(),
            name: "Soft wheat".to_string(),
            name_it: "Frumento tenero".to_string(),
            base_temp_c: 0.0,
            upper_temp_c: 26.0,
            heat_stress_c: 32.0,
            frost_damage_c: -6.0,
            ndvi: IndexThresholds::new(0.2, 0.3, 0.45, 0.65),
            ndmi: IndexThresholds::new(-0.1, 0.0, 0.1, 0.25),
            reci: IndexThresholds::new(0.7, 1.2, 2.0, 3.0),
            smi: SMI_THRESHOLDS,
            reci_optimal: (2.0, 3.5),
            ndvi_peak_reference: 0.82,
            potential_yield_t_ha: 9.0,
            reference_yield_t_ha: 5.5,
            price_eur_t: 260.0,
            n_requirement_kg_ha: 180.0,
            max_single_n_dose_kg_ha: 70.0,
            kc_initial: 0.4,
            kc_mid: 1.15,
            kc_end: 0.3,
            seasonal_water_need_mm: 480.0,
            water_sensitivity: 0.5,
            irrigated: false,
            max_irrigation_mm: 30.0,
            stage_gdd: [0.0, 150.0, 600.0, 1150.0, 1300.0, 1950.0],
        },
        CropProfile {
            key: "maize".to_string(),
            name: "Maize".to_string(),
            name_it: "Mais".to_string(),
            base_temp_c: 10.0,
            upper_temp_c: 30.0,
            heat_stress_c: 35.0,
            frost_damage_c: 0.0,
            ndvi: IndexThresholds::new(0.2, 0.35, 0.5, 0.7),
            ndmi: IndexThresholds::new(-0.1, 0.0, 0.1, 0.25),
            reci: IndexThresholds::new(0.8, 1.5, 2.5, 3.5),
            smi: SMI_THRESHOLDS,
            reci_optimal: (2.5, 4.0),
            ndvi_peak_reference: 0.85,
            potential_yield_t_ha: 14.0,
            reference_yield_t_ha: 10.5,
            price_eur_t: 220.0,
            n_requirement_kg_ha: 250.0,
            max_single_n_dose_kg_ha: 100.0,
            kc_initial: 0.3,
            kc_mid: 1.2,
            kc_end: 0.6,
            seasonal_water_need_mm: 550.0,
            water_sensitivity: 0.8,
            irrigated: true,
            max_irrigation_mm: 35.0,
            stage_gdd: [0.0, 100.0, 400.0, 800.0, 1000.0, 1500.0],
        },
        CropProfile {
            key: "rice".to_string(),
            name: "Rice".to_string(),
            name_it: "Riso".to_string(),
            base_temp_c: 10.0,
            upper_temp_c: 35.0,
            heat_stress_c: 35.0,
            frost_damage_c: 4.0,
            ndvi: IndexThresholds::new(0.2, 0.35, 0.5, 0.7),
            ndmi: IndexThresholds::new(0.0, 0.1, 0.2, 0.3),
            reci: IndexThresholds::new(0.8, 1.4, 2.2, 3.2),
            smi: SMI_THRESHOLDS,
            reci_optimal: (2.2, 3.6),
            ndvi_peak_reference: 0.82,
            potential_yield_t_ha: 10.0,
            reference_yield_t_ha: 6.5,
            price_eur_t: 400.0,
            n_requirement_kg_ha: 160.0,
            max_single_n_dose_kg_ha: 60.0,
            kc_initial: 1.05,
            kc_mid: 1.2,
            kc_end: 0.9,
            seasonal_water_need_mm: 1200.0,
            water_sensitivity: 0.9,
            irrigated: true,
            max_irrigation_mm: 80.0,
            stage_gdd: [0.0, 150.0, 500.0, 1000.0, 1200.0, 1700.0],
        },
        CropProfile {
            key: "tomato".to_string(),
            name: "Processing tomato".to_string(),
            name_it: "Pomodoro da industria".to_string(),
            base_temp_c: 10.0,
            upper_temp_c: 30.0,
            heat_stress_c: 35.0,
            frost_damage_c: 2.0,
            ndvi: IndexThresholds::new(0.2, 0.3, 0.45, 0.65),
            ndmi: IndexThresholds::new(-0.1, 0.0, 0.1, 0.25),
            reci: IndexThresholds::new(0.7, 1.2, 2.0, 3.0),
            smi: SMI_THRESHOLDS,
            reci_optimal: (2.0, 3.4),
            ndvi_peak_reference: 0.78,
            potential_yield_t_ha: 120.0,
            reference_yield_t_ha: 80.0,
            price_eur_t: 100.0,
            n_requirement_kg_ha: 180.0,
            max_single_n_dose_kg_ha: 60.0,
            kc_initial: 0.6,
            kc_mid: 1.15,
            kc_end: 0.8,
            seasonal_water_need_mm: 600.0,
            water_sensitivity: 0.9,
            irrigated: true,
            max_irrigation_mm: 30.0,
            stage_gdd: [0.0, 100.0, 350.0, 600.0, 900.0, 1400.0],
        },
        CropProfile {
            key: "grapevine".to_string(),
            name: "Grapevine".to_string(),
            name_it: "Vite".to_string(),
            base_temp_c: 10.0,
            upper_temp_c: 35.0,
            heat_stress_c: 38.0,
            frost_damage_c: -1.0,
            ndvi: IndexThresholds::new(0.2, 0.3, 0.4, 0.55),
            ndmi: IndexThresholds::new(-0.15, -0.05, 0.05, 0.15),
            reci: IndexThresholds::new(0.6, 1.0, 1.6, 2.4),
            smi: SMI_THRESHOLDS,
            reci_optimal: (1.6, 2.8),
            ndvi_peak_reference: 0.65,
            potential_yield_t_ha: 15.0,
            reference_yield_t_ha: 10.0,
            price_eur_t: 500.0,
            n_requirement_kg_ha: 60.0,
            max_single_n_dose_kg_ha: 30.0,
            kc_initial: 0.3,
            kc_mid: 0.7,
            kc_end: 0.45,
            seasonal_water_need_mm: 450.0,
            water_sensitivity: 0.4,
            irrigated: false,
            max_irrigation_mm: 25.0,
            stage_gdd: [0.0, 150.0, 350.0, 450.0, 800.0, 1400.0],
        },
        CropProfile {
            key: "olive".to_string(),
            name: "Olive".to_string(),
            name_it: "Olivo".to_string(),
            base_temp_c: 10.0,
            upper_temp_c: 35.0,
            heat_stress_c: 40.0,
            frost_damage_c: -7.0,
            ndvi: IndexThresholds::new(0.2, 0.3, 0.4, 0.55),
            ndmi: IndexThresholds::new(-0.15, -0.05, 0.05, 0.15),
            reci: IndexThresholds::new(0.6, 1.0, 1.5, 2.2),
            smi: SMI_THRESHOLDS,
            reci_optimal: (1.5, 2.6),
            ndvi_peak_reference: 0.6,
            potential_yield_t_ha: 8.0,
            reference_yield_t_ha: 4.0,
            price_eur_t: 700.0,
            n_requirement_kg_ha: 80.0,
            max_single_n_dose_kg_ha: 40.0,
            kc_initial: 0.5,
            kc_mid: 0.65,
            kc_end: 0.65,
            seasonal_water_need_mm: 500.0,
            water_sensitivity: 0.3,
            irrigated: false,
            max_irrigation_mm: 30.0,
            stage_gdd: [0.0, 200.0, 500.0, 700.0, 1000.0, 1800.0],
        },
        CropProfile {
            key: "sunflower".to_string(),
            name: "Sunflower".to_string(),
            name_it: "Girasole".to_string(),
            base_temp_c: 6.0,
            upper_temp_c: 32.0,
            heat_stress_c: 35.0,
            frost_damage_c: -2.0,
            ndvi: IndexThresholds::new(0.2, 0.35, 0.5, 0.7),
            ndmi: IndexThresholds::new(-0.1, 0.0, 0.1, 0.25),
            reci: IndexThresholds::new(0.7, 1.2, 2.0, 3.0),
            smi: SMI_THRESHOLDS,
            reci_optimal: (2.0, 3.4),
            ndvi_peak_reference: 0.8,
            potential_yield_t_ha: 4.5,
            reference_yield_t_ha: 2.5,
            price_eur_t: 450.0,
            n_requirement_kg_ha: 100.0,
            max_single_n_dose_kg_ha: 50.0,
            kc_initial: 0.35,
            kc_mid: 1.1,
            kc_end: 0.35,
            seasonal_water_need_mm: 500.0,
            water_sensitivity: 0.5,
            irrigated: false,
            max_irrigation_mm: 30.0,
            stage_gdd: [0.0, 150.0, 500.0, 900.0, 1200.0, 1600.0],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog() {
        let catalog = CropCatalog::builtin();
        assert_eq!(catalog.len(), 8);
        assert!(catalog.get("maize").is_ok());
        assert!(catalog.get(" Maize ").is_ok());
        assert!(matches!(catalog.get("banana"), Err(AnalysisError::UnknownCrop(_))));
    }

    #[test]
    fn test_builtin_profiles_are_consistent() {
        for crop in CropCatalog::builtin().profiles() {
            for kind in IndexKind::all() {
                let t = crop.thresholds(*kind);
                assert!(t.critical < t.poor && t.poor < t.moderate && t.moderate < t.good, "{}", crop.key);
            }
            assert!(crop.stage_gdd.windows(2).all(|w| w[0] <= w[1]), "{}", crop.key);
            assert!(crop.reci_optimal.0 < crop.reci_optimal.1);
            assert!(crop.reference_yield_t_ha <= crop.potential_yield_t_ha);
        }
    }

    #[test]
    fn test_kc_for_stage() {
        let catalog = CropCatalog::builtin();
        let maize = catalog.get("maize").unwrap();
        assert_eq!(maize.kc_for_stage(GrowthStage::Dormant), 0.0);
        assert_eq!(maize.kc_for_stage(GrowthStage::Flowering), 1.2);
        approx::assert_relative_eq!(maize.kc_for_stage(GrowthStage::Vegetative), 0.75);
        assert_eq!(maize.stage_start_gdd(GrowthStage::Flowering), 800.0);
    }

    #[test]
    fn test_load_overrides_builtin() {
        let catalog = CropCatalog::builtin();
        let mut barley = catalog.get("wheat_soft").unwrap().clone();
        barley.key = "barley".to_string();
        barley.name = "Barley".to_string();
        let mut maize = catalog.get("maize").unwrap().clone();
        maize.price_eur_t = 250.0;

        let path = std::env::temp_dir().join(format!("field_advisor_crops_{}.json", std::process::id()));
        fs::write(&path, serde_json::to_string(&vec![barley, maize]).unwrap()).unwrap();

        let loaded = CropCatalog::load(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded.len(), 9);
        assert_eq!(loaded.get("maize").unwrap().price_eur_t, 250.0);
        assert_eq!(loaded.keys()[0], "barley");
    }

    #[test]
    fn test_load_normalizes_override_keys() {
        let catalog = CropCatalog::builtin();
        let mut local = catalog.get("maize").unwrap().clone();
        local.key = " Mais_Nord ".to_string();
        local.name = "Mais Nord".to_string();
        let mut maize = catalog.get("maize").unwrap().clone();
        maize.key = "MAIZE".to_string();
        maize.price_eur_t = 240.0;

        let path = std::env::temp_dir().join(format!("field_advisor_crops_case_{}.json", std::process::id()));
        fs::write(&path, serde_json::to_string(&vec![local, maize]).unwrap()).unwrap();

        let loaded = CropCatalog::load(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded.len(), 9);
        assert_eq!(loaded.get("Mais_Nord").unwrap().key, "mais_nord");
        assert_eq!(loaded.get("mais_nord").unwrap().name, "Mais Nord");
        assert_eq!(loaded.get("maize").unwrap().price_eur_t, 240.0);
        assert!(loaded.keys().contains(&"mais_nord"));
    }

    #[test]
    fn test_load_rejects_empty_key() {
        let mut blank = CropCatalog::builtin().get("olive").unwrap().clone();
        blank.key = "  ".to_string();

        let path = std::env::temp_dir().join(format!("field_advisor_crops_blank_{}.json", std::process::id()));
        fs::write(&path, serde_json::to_string(&vec![blank]).unwrap()).unwrap();

        let result = CropCatalog::load(&path);
        fs::remove_file(&path).ok();
        assert!(result.is_err());
    }
}
