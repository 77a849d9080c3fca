//! Field Advisor Rust Implementation
//!
//! Agronomic analysis of satellite index series and weather records for
//! Italian arable and tree crops.
//!
//! Structure:
//! - `data/`: Field records, observation cleaning and table loading with Polars
//! - `crops/`: Crop profiles (thresholds, phenology, water and nitrogen needs)
//! - `analysis/`: Trend, health, weather, growth, nitrogen, irrigation,
//!   yield, productivity and alert modules
//! - `advisor/`: Runs every analysis for a field and assembles the report
//! - `report/`: Field report and its JSON / Markdown formatters

pub mod error;
pub mod config;
pub mod data;
pub mod crops;
pub mod utils;
pub mod analysis;
pub mod advisor;
pub mod report;

#[cfg(feature = "api")]
pub mod api_server;

// Re-export commonly used types
pub use error::{AnalysisError, AnalysisResult};
pub use config::{AdvisorConfig, TrendConfig};
pub use data::{FieldData, FieldLocation, IndexKind, IndexSeries, Observation, WeatherDay};
pub use crops::{CropCatalog, CropProfile};
pub use advisor::FieldAdvisor;
pub use report::{FieldReport, JsonFormatter, MarkdownFormatter};
pub use analysis::*;

#[cfg(feature = "api")]
pub use api_server::{create_router, AppState};
