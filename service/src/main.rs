mod config;
mod history;
mod models;
mod routes;
mod storage;

use axum::{Router, extract::DefaultBodyLimit};
use clap::Parser;
use config::ServiceConfig;
use routes::AppState;
use storage::SessionStorage;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "peak_service=debug,peak_parser=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::parse();
    tracing::debug!("Configuration: {:?}", config);

    let storage = SessionStorage::new(&config.data_dir)?;
    tracing::info!("Storing sessions in {}", config.data_dir.display());

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(routes::create_routes(AppState::new(storage)))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    tracing::info!("Starting Peak Online service on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
