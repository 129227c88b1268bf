#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rust_2018_idioms,
    missing_docs
)]

//! Spam/ham model service: owns one classifier artifact, loads it at most
//! once, and answers classification, metrics and health queries.

/// Telemetry builder/handle for the service.
#[path = "../telemetry.rs"]
pub mod telemetry;

/// Load and service errors.
#[path = "../error.rs"]
pub mod error;

/// Classifier contract and artifact loaders.
#[path = "../artifact.rs"]
pub mod artifact;

/// Linear term-weight artifact format.
#[path = "../linear.rs"]
pub mod linear;

/// Offline evaluation metrics document.
#[path = "../metrics.rs"]
pub mod metrics;

/// Process-lifetime request counters.
#[path = "../counters.rs"]
pub mod counters;

/// Prediction records and the confidence transform.
#[path = "../prediction.rs"]
pub mod prediction;

/// Health, metrics and status reports.
#[path = "../report.rs"]
pub mod report;

/// TOML configuration with environment overrides.
#[path = "../config.rs"]
pub mod config;

/// Model service entry point.
#[path = "../main.rs"]
pub mod runtime;

pub use artifact::{ArtifactLoader, ClassifierArtifact, FsArtifactLoader, Label, LoadedModel};
pub use config::{ModelSettings, ServerSettings, ServingConfig, TelemetrySettings};
pub use counters::{CounterTotals, ServiceCounters};
pub use error::{ArtifactLoadError, ServiceError};
pub use linear::LinearTextArtifact;
pub use metrics::MetricsSnapshot;
pub use prediction::{confidence_from_score, BatchPrediction, PredictionResult, CONFIDENCE_SCALE};
pub use report::{HealthReport, MetricsReport, ServiceStatus, StatusReport, SystemMetrics};
pub use runtime::{ModelService, ModelServiceBuilder};
pub use telemetry::{ServingTelemetry, ServingTelemetryBuilder};
