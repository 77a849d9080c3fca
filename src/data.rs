//! Field Data Records and Loading
//!
//! Plain records handed to the analysis engine (index observations, daily
//! weather, field metadata) plus Polars loaders for exported index and
//! weather tables.
//!
//! Index tables are long-format: one row per (date, index) pair with the
//! columns `date`, `index`, `value` and an optional `cloud_cover` (%).
//! Weather tables hold one row per day: `date`, `t_min`, `t_max`,
//! `precipitation` and an optional `et0`.

use std::fmt;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Satellite-derived indices supplied by the EOS statistics service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndexKind {
    /// Normalized Difference Vegetation Index (vigor)
    Ndvi,
    /// Normalized Difference Moisture Index (canopy water)
    Ndmi,
    /// Red-edge Chlorophyll Index (chlorophyll / nitrogen proxy)
    Reci,
    /// Soil Moisture Index (standardized anomaly vs. baseline)
    Smi,
}

impl IndexKind {
    pub fn all() -> &'static [IndexKind] {
        &[IndexKind::Ndvi, IndexKind::Ndmi, IndexKind::Reci, IndexKind::Smi]
    }

    /// Parse an index name as it appears in exported tables
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ndvi" => Some(IndexKind::Ndvi),
            "ndmi" => Some(IndexKind::Ndmi),
            "reci" => Some(IndexKind::Reci),
            "smi" => Some(IndexKind::Smi),
            _ => None,
        }
    }

    /// Physically meaningful value range, used to clamp projections
    pub fn valid_range(&self) -> (f64, f64) {
        match self {
            IndexKind::Ndvi | IndexKind::Ndmi => (-1.0, 1.0),
            IndexKind::Reci => (0.0, 15.0),
            IndexKind::Smi => (-5.0, 5.0),
        }
    }

    /// Slope (units/day) below which a series counts as stable
    pub fn stable_slope_per_day(&self) -> f64 {
        match self {
            IndexKind::Ndvi | IndexKind::Ndmi => 0.002,
            IndexKind::Reci => 0.01,
            IndexKind::Smi => 0.015,
        }
    }

    /// Minimum residual scale; keeps z-scores finite on near-perfect series
    pub fn noise_floor(&self) -> f64 {
        match self {
            IndexKind::Ndvi | IndexKind::Ndmi => 0.02,
            IndexKind::Reci | IndexKind::Smi => 0.1,
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexKind::Ndvi => "NDVI",
            IndexKind::Ndmi => "NDMI",
            IndexKind::Reci => "ReCI",
            IndexKind::Smi => "SMI",
        };
        f.write_str(name)
    }
}

/// Single index value for one acquisition date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
    /// Scene cloud cover over the field (%), when reported
    #[serde(default)]
    pub cloud_cover_pct: Option<f64>,
}

impl Observation {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value, cloud_cover_pct: None }
    }
}

/// Time series of one index for one field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSeries {
    pub kind: IndexKind,
    pub observations: Vec<Observation>,
}

impl IndexSeries {
    pub fn new(kind: IndexKind, observations: Vec<Observation>) -> Self {
        Self { kind, observations }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Daily weather record (history or forecast)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherDay {
    pub date: NaiveDate,
    pub t_min_c: f64,
    pub t_max_c: f64,
    #[serde(default)]
    pub precipitation_mm: f64,
    /// Reference evapotranspiration when the provider reports it
    #[serde(default)]
    pub et0_mm: Option<f64>,
}

impl WeatherDay {
    pub fn mean_temp(&self) -> f64 {
        (self.t_min_c + self.t_max_c) / 2.0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub province: Option<String>,
}

/// Everything known about one field at a reference date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldData {
    pub field_id: String,
    #[serde(default)]
    pub name: String,
    /// Crop key in the crop catalog (e.g. "maize")
    pub crop: String,
    pub area_ha: f64,
    #[serde(default)]
    pub location: FieldLocation,
    #[serde(default)]
    pub sowing_date: Option<NaiveDate>,
    pub reference_date: NaiveDate,
    #[serde(default)]
    pub indices: Vec<IndexSeries>,
    #[serde(default)]
    pub weather_history: Vec<WeatherDay>,
    #[serde(default)]
    pub weather_forecast: Vec<WeatherDay>,
    /// Nitrogen already applied this season (kg N/ha)
    #[serde(default)]
    pub nitrogen_applied_kg_ha: f64,
}

impl FieldData {
    pub fn series(&self, kind: IndexKind) -> Option<&IndexSeries> {
        self.indices.iter().find(|s| s.kind == kind)
    }
}

/// Start of a look-back window ending at `date`
///
/// Saturates at the earliest representable date instead of overflowing.
pub fn days_before(date: NaiveDate, days: i64) -> NaiveDate {
    chrono::Duration::try_days(days.max(0))
        .and_then(|d| date.checked_sub_signed(d))
        .unwrap_or(NaiveDate::MIN)
}

/// Remove unusable observations and merge duplicates
///
/// Drops non-finite values and scenes cloudier than `max_cloud_pct`, sorts
/// by date and averages observations sharing a date.
pub fn clean_observations(observations: &[Observation], max_cloud_pct: f64) -> Vec<Observation> {
    let mut kept: Vec<&Observation> = observations
        .iter()
        .filter(|o| o.value.is_finite())
        .filter(|o| o.cloud_cover_pct.map_or(true, |c| c <= max_cloud_pct))
        .collect();
    kept.sort_by_key(|o| o.date);

    let mut cleaned: Vec<Observation> = Vec::with_capacity(kept.len());
    let mut same_date = 0usize;
    for obs in kept {
        match cleaned.last_mut() {
            Some(last) if last.date == obs.date => {
                // Running mean over observations on the same date
                same_date += 1;
                last.value += (obs.value - last.value) / (same_date + 1) as f64;
                last.cloud_cover_pct = match (last.cloud_cover_pct, obs.cloud_cover_pct) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
            }
            _ => {
                same_date = 0;
                cleaned.push(obs.clone());
            }
        }
    }
    cleaned
}

// ============================================================================
// Table Loading
// ============================================================================

fn read_table(path: &str) -> Result<DataFrame> {
    let is_parquet = path.to_ascii_lowercase().ends_with(".parquet");

    if is_parquet {
        LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to scan parquet: {}", path))?
            .collect()
            .with_context(|| format!("Failed to load parquet: {}", path))
    } else {
        CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.into()))
            .with_context(|| format!("Failed to create CSV reader: {}", path))?
            .finish()
            .with_context(|| format!("Failed to load CSV: {}", path))
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    // Accept plain dates and ISO timestamps ("2024-05-03T10:21:00Z")
    let date_part = raw.trim().get(..10).unwrap_or(raw.trim());
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}'", raw))
}

fn optional_f64_column(df: &DataFrame, name: &str) -> Result<Option<Column>> {
    match df.column(name) {
        Ok(col) => Ok(Some(col.cast(&DataType::Float64)?)),
        Err(_) => Ok(None),
    }
}

/// Load a long-format index table into one series per index
pub fn load_index_table(path: &str) -> Result<Vec<IndexSeries>> {
    let df = read_table(path)?;

    let dates = df.column("date")?.cast(&DataType::String)?;
    let names = df.column("index")?.cast(&DataType::String)?;
    let values = df.column("value")?.cast(&DataType::Float64)?;
    let clouds = optional_f64_column(&df, "cloud_cover")?;

    let dates = dates.str()?;
    let names = names.str()?;
    let values = values.f64()?;
    let clouds = match &clouds {
        Some(col) => Some(col.f64()?),
        None => None,
    };

    let mut grouped: FxHashMap<IndexKind, Vec<Observation>> = FxHashMap::default();
    let mut skipped = 0usize;

    for row in 0..df.height() {
        let (Some(date), Some(name), Some(value)) = (dates.get(row), names.get(row), values.get(row)) else {
            skipped += 1;
            continue;
        };
        let Some(kind) = IndexKind::parse(name) else {
            tracing::warn!("Skipping unknown index '{}' in {}", name, path);
            skipped += 1;
            continue;
        };
        let cloud_cover_pct = clouds.and_then(|c| c.get(row));
        grouped.entry(kind).or_default().push(Observation {
            date: parse_date(date)?,
            value,
            cloud_cover_pct,
        });
    }

    let mut series: Vec<IndexSeries> = grouped
        .into_iter()
        .map(|(kind, observations)| IndexSeries::new(kind, observations))
        .collect();
    series.sort_by_key(|s| s.kind);

    tracing::debug!(
        "Loaded {} index series from {} ({} rows skipped)",
        series.len(),
        path,
        skipped
    );

    Ok(series)
}

/// Load a daily weather table
pub fn load_weather_table(path: &str) -> Result<Vec<WeatherDay>> {
    let df = read_table(path)?;

    let dates = df.column("date")?.cast(&DataType::String)?;
    let t_min = df.column("t_min")?.cast(&DataType::Float64)?;
    let t_max = df.column("t_max")?.cast(&DataType::Float64)?;
    let precip = df.column("precipitation")?.cast(&DataType::Float64)?;
    let et0 = optional_f64_column(&df, "et0")?;

    let dates = dates.str()?;
    let t_min = t_min.f64()?;
    let t_max = t_max.f64()?;
    let precip = precip.f64()?;
    let et0 = match &et0 {
        Some(col) => Some(col.f64()?),
        None => None,
    };

    let mut days = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let (Some(date), Some(t_min_c), Some(t_max_c)) = (dates.get(row), t_min.get(row), t_max.get(row)) else {
            continue;
        };
        days.push(WeatherDay {
            date: parse_date(date)?,
            t_min_c,
            t_max_c,
            precipitation_mm: precip.get(row).unwrap_or(0.0),
            et0_mm: et0.and_then(|c| c.get(row)),
        });
    }
    days.sort_by_key(|d| d.date);

    tracing::debug!("Loaded {} weather days from {}", days.len(), path);
    Ok(days)
}
