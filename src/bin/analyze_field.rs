//! Analyze a single field from the command line
//!
//! Reads a field description (JSON), optionally replaces its index series
//! and weather with exported tables, and prints the report.
//!
//! Usage:
//!   cargo run --features cli --bin analyze_field -- field.json [indices.csv] [weather.csv] [--json]
//!
//! Weather rows after the field's reference date are treated as forecast.
//! ADVISOR_CONFIG and CROP_CATALOG override the built-in configuration.

use anyhow::{Context, Result};
use field_advisor_rust::data::{load_index_table, load_weather_table};
use field_advisor_rust::{AdvisorConfig, CropCatalog, FieldAdvisor, FieldData, JsonFormatter, MarkdownFormatter};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "field_advisor_rust=info,warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let as_json = args.iter().any(|a| a == "--json");
    let positional: Vec<&String> = args.iter().filter(|a| !a.starts_with("--")).collect();

    let Some(field_path) = positional.first() else {
        eprintln!("Usage: analyze_field <field.json> [indices.csv] [weather.csv] [--json]");
        std::process::exit(2);
    };

    let contents = std::fs::read_to_string(field_path.as_str())
        .with_context(|| format!("Failed to read field file: {}", field_path))?;
    let mut field: FieldData =
        serde_json::from_str(&contents).with_context(|| format!("Failed to parse field JSON: {}", field_path))?;

    if let Some(indices_path) = positional.get(1) {
        field.indices = load_index_table(indices_path.as_str())?;
    }
    if let Some(weather_path) = positional.get(2) {
        let (history, forecast): (Vec<_>, Vec<_>) = load_weather_table(weather_path.as_str())?
            .into_iter()
            .partition(|d| d.date <= field.reference_date);
        field.weather_history = history;
        field.weather_forecast = forecast;
    }

    let config = match std::env::var("ADVISOR_CONFIG") {
        Ok(path) => AdvisorConfig::load(Path::new(&path))?,
        Err(_) => AdvisorConfig::default(),
    };
    let catalog = match std::env::var("CROP_CATALOG") {
        Ok(path) => CropCatalog::load(Path::new(&path))?,
        Err(_) => CropCatalog::builtin(),
    };

    let advisor = FieldAdvisor::new(catalog, config);
    let report = advisor
        .analyze(&field)
        .with_context(|| format!("Analysis failed for field {}", field.field_id))?;

    if as_json {
        println!("{}", JsonFormatter::format(&report)?);
    } else {
        println!("{}", MarkdownFormatter::format(&report));
    }

    Ok(())
}
