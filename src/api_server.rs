// Axum API Server Module
//
// Purpose: REST API over the field advisor (crop catalog, field analysis,
// single-series trend and projection). Analysis is CPU-bound and runs on
// the blocking pool; batch requests fan out with Rayon inside it.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;
use std::sync::Arc;
use std::time::Duration;

use crate::advisor::FieldAdvisor;
use crate::analysis::{analyze_trend, detect_anomalies, project_trend, Anomaly, Projection, TrendAnalysis};
use crate::config::{AdvisorConfig, TrendConfig};
use crate::crops::CropCatalog;
use crate::data::{FieldData, IndexSeries};
use crate::error::AnalysisError;
use crate::report::{JsonFormatter, MarkdownFormatter};

// ============================================================================
// Application State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub advisor: Arc<FieldAdvisor>,
    pub cache: Cache<String, serde_json::Value>,
}

impl AppState {
    /// Build state from optional config and crop catalog files
    pub fn new(config_path: Option<&str>, catalog_path: Option<&str>) -> anyhow::Result<Self> {
        let config = match config_path {
            Some(path) => {
                tracing::info!("Loading advisor config from {}", path);
                AdvisorConfig::load(FsPath::new(path))?
            }
            None => AdvisorConfig::default(),
        };

        let catalog = match catalog_path {
            Some(path) => {
                tracing::info!("Loading crop catalog from {}", path);
                CropCatalog::load(FsPath::new(path))?
            }
            None => CropCatalog::builtin(),
        };
        tracing::info!("Crop catalog: {} crops", catalog.len());

        Ok(Self::with_advisor(FieldAdvisor::new(catalog, config)))
    }

    pub fn with_advisor(advisor: FieldAdvisor) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000) // 10K entries
            .time_to_live(Duration::from_secs(300)) // 5 min TTL
            .build();

        Self {
            advisor: Arc::new(advisor),
            cache,
        }
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Crop catalog
        .route("/api/crops", get(list_crops))
        .route("/api/crops/:key", get(get_crop))

        // Field analysis
        .route("/api/fields/analyze", post(analyze_field))
        .route("/api/fields/analyze/batch", post(analyze_batch))

        // Single-series tools
        .route("/api/series/trend", post(series_trend))
        .route("/api/series/projection", post(series_projection))

        // Middleware (applied in reverse order)
        .layer(CompressionLayer::new()) // gzip + brotli compression
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http()) // Request logging
        .with_state(state)
}

// ============================================================================
// Endpoint Handlers
// ============================================================================

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "crops": state.advisor.catalog().len(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn list_crops(State(state): State<AppState>) -> Json<serde_json::Value> {
    let catalog = state.advisor.catalog();
    let crops: Vec<serde_json::Value> = catalog
        .keys()
        .into_iter()
        .filter_map(|key| catalog.get(key).ok())
        .map(|crop| {
            serde_json::json!({
                "key": crop.key,
                "name": crop.name,
                "name_it": crop.name_it,
                "irrigated": crop.irrigated,
            })
        })
        .collect();

    Json(serde_json::json!({
        "count": crops.len(),
        "crops": crops,
    }))
}

async fn get_crop(State(state): State<AppState>, Path(key): Path<String>) -> Result<Json<serde_json::Value>, AppError> {
    let crop = state.advisor.catalog().get(&key)?;
    let value = serde_json::to_value(crop).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(value))
}

/// Analyze one field
///
/// POST /api/fields/analyze?format=markdown
///
/// JSON reports are cached by request body for the cache TTL.
async fn analyze_field(
    State(state): State<AppState>,
    Query(params): Query<AnalyzeQuery>,
    Json(field): Json<FieldData>,
) -> Result<Response, AppError> {
    let markdown = params.format.as_deref() == Some("markdown");
    let cache_key = analyze_cache_key(&field)?;

    if !markdown {
        if let Some(cached) = state.cache.get(&cache_key).await {
            tracing::debug!("Cache hit: field {}", field.field_id);
            return Ok(Json(cached).into_response());
        }
    }

    tracing::info!("Analyzing field {} ({})", field.field_id, field.crop);

    // CPU-bound work: run in blocking thread pool
    let advisor = state.advisor.clone();
    let report = tokio::task::spawn_blocking(move || advisor.analyze(&field))
        .await
        .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))??;

    if markdown {
        let body = MarkdownFormatter::format(&report);
        return Ok(([(header::CONTENT_TYPE, "text/markdown; charset=utf-8")], body).into_response());
    }

    let json = JsonFormatter::format_compact(&report).map_err(|e| AppError::Internal(e.to_string()))?;
    let value: serde_json::Value = serde_json::from_str(&json).map_err(|e| AppError::Internal(e.to_string()))?;
    state.cache.insert(cache_key, value.clone()).await;

    Ok(Json(value).into_response())
}

/// Analyze several fields in one request
///
/// Each field gets either a report or an error; one bad field does not
/// fail the batch.
async fn analyze_batch(
    State(state): State<AppState>,
    Json(payload): Json<BatchAnalyzeRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let start = std::time::Instant::now();
    let count = payload.fields.len();
    tracing::info!("Batch analysis of {} fields", count);

    let advisor = state.advisor.clone();
    let entries = tokio::task::spawn_blocking(move || {
        let results = advisor.analyze_batch(&payload.fields);
        payload
            .fields
            .iter()
            .zip(results)
            .map(|(field, result)| match result {
                Ok(report) => serde_json::json!({
                    "field_id": field.field_id,
                    "report": report,
                }),
                Err(e) => serde_json::json!({
                    "field_id": field.field_id,
                    "error": e.to_string(),
                }),
            })
            .collect::<Vec<_>>()
    })
    .await
    .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))?;

    let failed = entries.iter().filter(|e| e.get("error").is_some()).count();

    Ok(Json(serde_json::json!({
        "count": count,
        "failed": failed,
        "results": entries,
        "elapsed_ms": start.elapsed().as_millis() as u64,
    })))
}

async fn series_trend(
    State(state): State<AppState>,
    Json(payload): Json<SeriesRequest>,
) -> Result<Json<TrendResponse>, AppError> {
    let config = request_trend_config(payload.config, &state)?;

    let response = tokio::task::spawn_blocking(move || -> Result<TrendResponse, AnalysisError> {
        let trend = analyze_trend(&payload.series, &config)?;
        let anomalies = detect_anomalies(&payload.series, &config);
        Ok(TrendResponse { trend, anomalies })
    })
    .await
    .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))??;

    Ok(Json(response))
}

async fn series_projection(
    State(state): State<AppState>,
    Json(payload): Json<ProjectionRequest>,
) -> Result<Json<ProjectionResponse>, AppError> {
    let config = request_trend_config(payload.config, &state)?;
    let horizon = payload
        .horizon_days
        .unwrap_or(state.advisor.config().projection_horizon_days);

    let response = tokio::task::spawn_blocking(move || -> Result<ProjectionResponse, AnalysisError> {
        let trend = analyze_trend(&payload.series, &config)?;
        let projections = project_trend(&trend, horizon, &config)?;
        Ok(ProjectionResponse { trend, projections })
    })
    .await
    .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))??;

    Ok(Json(response))
}

/// Request override or the advisor's own trend settings
fn request_trend_config(requested: Option<TrendConfig>, state: &AppState) -> Result<TrendConfig, AppError> {
    match requested {
        Some(config) => {
            config
                .validate()
                .map_err(|e| AppError::Analysis(AnalysisError::InvalidInput(e.to_string())))?;
            Ok(config)
        }
        None => Ok(state.advisor.config().trend.clone()),
    }
}

/// Cache key for a JSON analysis: the full serialized request body
fn analyze_cache_key(field: &FieldData) -> Result<String, AppError> {
    let body = serde_json::to_string(field).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(format!("analyze:{}", body))
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Deserialize, Debug)]
struct AnalyzeQuery {
    format: Option<String>,
}

#[derive(Deserialize)]
struct BatchAnalyzeRequest {
    fields: Vec<FieldData>,
}

#[derive(Deserialize)]
struct SeriesRequest {
    series: IndexSeries,
    config: Option<TrendConfig>,
}

#[derive(Deserialize)]
struct ProjectionRequest {
    series: IndexSeries,
    horizon_days: Option<u32>,
    config: Option<TrendConfig>,
}

#[derive(Serialize)]
struct TrendResponse {
    trend: TrendAnalysis,
    anomalies: Vec<Anomaly>,
}

#[derive(Serialize)]
struct ProjectionResponse {
    trend: TrendAnalysis,
    projections: Vec<Projection>,
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
enum AppError {
    Analysis(AnalysisError),
    Internal(String),
}

impl From<AnalysisError> for AppError {
    fn from(e: AnalysisError) -> Self {
        AppError::Analysis(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Analysis(e @ AnalysisError::UnknownCrop(_)) => (StatusCode::NOT_FOUND, e.to_string()),
            AppError::Analysis(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
