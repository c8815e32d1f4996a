//! Configuration module

use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Server port
    pub port: u16,

    /// Path to the exported classifier model (ONNX)
    pub model_path: String,

    /// Path to the labeled training dataset (CSV)
    pub training_data_path: String,

    /// Margin added to every envelope bound before range checks
    pub tolerance: f64,

    /// Minimum accepted top-class probability
    pub confidence_threshold: f64,

    /// Maximum number of rows accepted in one batch upload
    pub max_batch_rows: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://tea_predictions.db".to_string()),

            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),

            model_path: env::var("MODEL_PATH")
                .unwrap_or_else(|_| "models/extra_trees.onnx".to_string()),

            training_data_path: env::var("TRAINING_DATA_PATH")
                .unwrap_or_else(|_| "data/tea_aroma_balanced.csv".to_string()),

            tolerance: env::var("TOLERANCE")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(5.0),

            confidence_threshold: env::var("CONFIDENCE_THRESHOLD")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(0.55),

            max_batch_rows: env::var("MAX_BATCH_ROWS")
                .ok()
                .and_then(|n| n.parse().ok())
                .unwrap_or(500),
        }
    }
}
