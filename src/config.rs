//! Advisor configuration
//!
//! Tuning knobs for series cleaning, trend fitting, projection and alert
//! output. Defaults suit Sentinel-2 revisit cadence (a usable scene every
//! 5-10 days); a JSON file can override any subset of fields.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Longest projection horizon the engine will produce
pub const MAX_PROJECTION_DAYS: u32 = 30;

/// Longest look-back window (days) for weather and anomaly alerts
pub const MAX_WINDOW_DAYS: i64 = 366;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Scenes cloudier than this (%) are discarded
    pub max_cloud_cover_pct: f64,
    /// Centered moving-average window (points)
    pub smoothing_window: usize,
    /// Number of most recent points used for the trend fit
    pub fit_points: usize,
    /// Robust z-score above which a point is flagged as anomalous
    pub anomaly_z: f64,
    /// Per-day damping of the trend slope in projections (0-1]
    pub damping: f64,
    pub projection_step_days: u32,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            max_cloud_cover_pct: 60.0,
            smoothing_window: 3,
            fit_points: 6,
            anomaly_z: 2.5,
            damping: 0.97,
            projection_step_days: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub trend: TrendConfig,
    /// Productivity outlook horizon (days, at most 30)
    pub projection_horizon_days: u32,
    /// Days of weather history summarized for risks and water balance
    pub weather_window_days: i64,
    /// NDVI drops newer than this many days raise an alert
    pub anomaly_alert_window_days: i64,
    pub max_alerts: usize,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            trend: TrendConfig::default(),
            projection_horizon_days: 14,
            weather_window_days: 30,
            anomaly_alert_window_days: 10,
            max_alerts: 8,
        }
    }
}

impl TrendConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.max_cloud_cover_pct) {
            anyhow::bail!("trend.max_cloud_cover_pct must be 0-100, got {}", self.max_cloud_cover_pct);
        }
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            anyhow::bail!("trend.damping must be in (0, 1], got {}", self.damping);
        }
        if self.fit_points < 2 {
            anyhow::bail!("trend.fit_points must be at least 2");
        }
        if !(self.anomaly_z.is_finite() && self.anomaly_z > 0.0) {
            anyhow::bail!("trend.anomaly_z must be positive, got {}", self.anomaly_z);
        }
        if self.projection_step_days == 0 {
            anyhow::bail!("trend.projection_step_days must be positive");
        }
        Ok(())
    }
}

impl AdvisorConfig {
    /// Load configuration from a JSON file; missing fields keep defaults
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read advisor config: {:?}", path))?;

        let config: AdvisorConfig = serde_json::from_str(&contents)
            .with_context(|| "Failed to parse advisor config JSON")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.trend.validate()?;
        if self.projection_horizon_days == 0 || self.projection_horizon_days > MAX_PROJECTION_DAYS {
            anyhow::bail!(
                "projection_horizon_days must be 1-{}, got {}",
                MAX_PROJECTION_DAYS,
                self.projection_horizon_days
            );
        }
        if !(1..=MAX_WINDOW_DAYS).contains(&self.weather_window_days) {
            anyhow::bail!(
                "weather_window_days must be 1-{}, got {}",
                MAX_WINDOW_DAYS,
                self.weather_window_days
            );
        }
        if !(0..=MAX_WINDOW_DAYS).contains(&self.anomaly_alert_window_days) {
            anyhow::bail!(
                "anomaly_alert_window_days must be 0-{}, got {}",
                MAX_WINDOW_DAYS,
                self.anomaly_alert_window_days
            );
        }
        if self.max_alerts == 0 {
            anyhow::bail!("max_alerts must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: AdvisorConfig =
            serde_json::from_str(r#"{"max_alerts": 3, "trend": {"anomaly_z": 3.0}}"#).unwrap();
        assert_eq!(config.max_alerts, 3);
        assert_eq!(config.trend.anomaly_z, 3.0);
        assert_eq!(config.trend.smoothing_window, 3);
        assert_eq!(config.projection_horizon_days, 14);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_long_horizon() {
        let config = AdvisorConfig { projection_horizon_days: 45, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_windows() {
        let config: AdvisorConfig = serde_json::from_str(r#"{"weather_window_days": 1000000000}"#).unwrap();
        assert!(config.validate().is_err());

        let config = AdvisorConfig { anomaly_alert_window_days: -1, ..Default::default() };
        assert!(config.validate().is_err());
        let config = AdvisorConfig { anomaly_alert_window_days: MAX_WINDOW_DAYS + 1, ..Default::default() };
        assert!(config.validate().is_err());
        let config = AdvisorConfig { weather_window_days: MAX_WINDOW_DAYS, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_trend_config_validate() {
        assert!(TrendConfig::default().validate().is_ok());
        assert!(TrendConfig { damping: 0.0, ..Default::default() }.validate().is_err());
        assert!(TrendConfig { fit_points: 1, ..Default::default() }.validate().is_err());
        assert!(TrendConfig { max_cloud_cover_pct: 150.0, ..Default::default() }.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        assert!(AdvisorConfig { max_alerts: 0, ..Default::default() }.validate().is_err());
        assert!(AdvisorConfig { weather_window_days: 0, ..Default::default() }.validate().is_err());
    }
}
