//! agriyield - District-level crop yield prediction
//!
//! This crate trains a random forest yield model from historical
//! district/season panels:
//! - Schema normalization, unit repair and agronomic outlier filtering
//! - Sensor backfill and derived feature engineering
//! - Categorical encoding and numeric scaling behind one fitted pipeline
//! - Temporal (year holdout) and spatial (district holdout) validation
//! - Serialized model bundle with training and importance reports
//!
//! # Modules
//!
//! ## Pipeline stages
//! - [`data`] - Dataset discovery and CSV loading
//! - [`preprocessing`] - Normalization, filtering, engineering, encoding
//! - [`training`] - Estimators, metrics, validation, the trainer
//! - [`artifacts`] - Model bundle and report persistence
//!
//! ## Orchestration
//! - [`pipeline`] - End-to-end training runs
//! - [`config`] - Run configuration and agronomic domain tables
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Pipeline stages
pub mod data;
pub mod preprocessing;
pub mod training;
pub mod artifacts;

// Orchestration
pub mod config;
pub mod pipeline;
pub mod cli;

pub use error::{AgriYieldError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{AgriYieldError, Result};

    // Configuration
    pub use crate::config::{DomainTables, PipelineConfig};

    // Preprocessing
    pub use crate::preprocessing::{
        CategoryEncoder, FeatureEngineer, FeaturePipeline, FeatureSelector, NumericScaler,
        OutlierFilter, SchemaNormalizer,
    };

    // Training
    pub use crate::training::{
        ModelTrainer, RandomForestRegressor, Regressor, TrainingReport, ValidationOrchestrator,
    };

    // Artifacts
    pub use crate::artifacts::{ArtifactStore, ModelBundle};

    // Orchestration
    pub use crate::pipeline::{PipelineRun, TrainingPipeline};
}
