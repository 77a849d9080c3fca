// API Server Binary Entry Point
//
// Purpose: Start the Axum API server over the field advisor
// Usage: cargo run --features api --bin api_server

use field_advisor_rust::{create_router, AppState};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (structured logging)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    // Default log level: info for our crate, warn for others
                    "field_advisor_rust=info,tower_http=debug,warn".into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting API server...");

    // Configuration from environment variables
    // Without ADVISOR_CONFIG / CROP_CATALOG the built-in defaults are used
    let config_path = std::env::var("ADVISOR_CONFIG").ok();
    let catalog_path = std::env::var("CROP_CATALOG").ok();

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    tracing::info!("Configuration:");
    tracing::info!("  ADVISOR_CONFIG: {}", config_path.as_deref().unwrap_or("(defaults)"));
    tracing::info!("  CROP_CATALOG: {}", catalog_path.as_deref().unwrap_or("(built-in)"));
    tracing::info!("  PORT: {}", port);

    let state = AppState::new(config_path.as_deref(), catalog_path.as_deref())?;
    tracing::info!("Application state initialized successfully");

    // Create router with all endpoints and middleware
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
