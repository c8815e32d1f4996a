//! TeaPot Backend Server
//!
//! HTTP service around a pre-trained tea-region classifier.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TEAPOT BACKEND                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌─────────────────┐  ┌──────────────────┐  │
//! │  │  API      │  │  Guardrail      │  │  Classifier      │  │
//! │  │  Gateway  │─▶│  Pipeline       │─▶│  Oracle          │  │
//! │  │  (Axum)   │  │  (range/conf)   │  │  (ONNX Runtime)  │  │
//! │  └─────┬─────┘  └────────┬────────┘  └──────────────────┘  │
//! │        │                 ▼                                  │
//! │        │          ┌─────────────┐                          │
//! │        └─────────▶│   SQLite    │  (append-only log)       │
//! │                   └─────────────┘                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod db;
mod error;
mod handlers;
mod logic;
mod models;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use logic::dataset::TrainingSet;
use logic::envelope::RangeStats;
use logic::guardrail::GuardrailPipeline;
use logic::oracle::{ClassifierOracle, OnnxOracle};
use logic::service::PredictionService;

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "teapot_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    tracing::info!("TeaPot prediction server starting...");

    // Range statistics are load-bearing for every request: a missing or
    // degenerate training set refuses startup.
    let training = TrainingSet::load(&config.training_data_path).with_context(|| {
        format!(
            "failed to load training data from {}",
            config.training_data_path
        )
    })?;
    tracing::info!(
        "Training data: {} samples, {} regions",
        training.len(),
        training.regions().len()
    );

    let stats = RangeStats::from_training(&training);

    // A missing model does NOT refuse startup: prediction endpoints fail
    // fast with a fixed response until the model file is fixed.
    let oracle: Option<Arc<dyn ClassifierOracle>> =
        match OnnxOracle::load(&config.model_path, training.regions().len()) {
            Ok(oracle) => {
                tracing::info!("Classifier model loaded from {}", config.model_path);
                Some(Arc::new(oracle))
            }
            Err(e) => {
                tracing::error!("Classifier model unavailable: {}", e);
                None
            }
        };

    // Initialize database pool
    let pool = db::create_pool(&config.database_url)
        .await
        .context("failed to open prediction database")?;

    tracing::info!("Running database migrations...");
    db::run_migrations(&pool)
        .await
        .context("failed to apply database schema")?;

    let pipeline = GuardrailPipeline::new(
        training.regions().to_vec(),
        stats,
        config.tolerance,
        config.confidence_threshold,
    );
    let service = Arc::new(PredictionService::new(
        pipeline,
        oracle,
        pool.clone(),
        config.max_batch_rows,
    ));

    // Build application state
    let state = AppState {
        service,
        pool,
        config,
    };

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));

    // Build router
    let app = create_router(state);
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
    pub pool: sqlx::SqlitePool,
    pub config: config::Config,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))

        // Prediction
        .route("/predict", post(handlers::predict::predict))
        .route("/predict-batch", post(handlers::predict::predict_batch))

        // Dashboard
        .route("/api/v1/dashboard/predictions", get(handlers::dashboard::recent_predictions))
        .route("/api/v1/dashboard/batches", get(handlers::dashboard::recent_batches))
        .route("/api/v1/dashboard/regions", get(handlers::dashboard::region_stats))

        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
