use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::metrics::MetricsSnapshot;

/// Lifecycle state of the model service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Nothing loaded yet.
    Unloaded,
    /// A load is in progress.
    Loading,
    /// Artifact resident; classification available.
    Ready,
    /// Last load failed; classification refused until a reload succeeds.
    Failed,
}

impl ServiceStatus {
    /// Lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    /// Health label: `healthy` only when ready.
    #[must_use]
    pub const fn health_label(self) -> &'static str {
        match self {
            Self::Ready => "healthy",
            Self::Failed => "degraded",
            Self::Loading => "loading",
            Self::Unloaded => "starting",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health probe answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// `healthy` iff the model is ready.
    pub status: &'static str,
    /// Whether an artifact is resident.
    pub model_loaded: bool,
    /// Loaded model name, or the configured name before load.
    pub model_name: String,
    /// Service version.
    pub version: String,
}

impl HealthReport {
    /// Convenience for `status == "healthy"`.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == ServiceStatus::Ready.health_label()
    }
}

/// Runtime counters exposed with the metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemMetrics {
    /// Seconds since service start, two decimals.
    pub uptime_seconds: f64,
    /// Messages submitted for classification.
    pub total_requests: u64,
    /// Predictions produced.
    pub total_predictions: u64,
    /// Predictions labelled spam.
    pub spam_detected: u64,
    /// Predictions labelled ham.
    pub ham_detected: u64,
    /// Calls refused while not ready.
    pub rejected_requests: u64,
    /// Whether an artifact is resident.
    pub model_loaded: bool,
}

/// Metrics endpoint answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    /// Offline metrics; absent until ready or when the producer wrote none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_metrics: Option<MetricsSnapshot>,
    /// Live counters.
    pub system_metrics: SystemMetrics,
}

/// Detailed lifecycle view for operators.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Current state.
    pub status: ServiceStatus,
    /// Loads attempted since start.
    pub load_attempts: u64,
    /// Most recent load failure, if the service is failed.
    pub last_error: Option<String>,
    /// Why the resident model's metrics document was rejected, if it was.
    pub metrics_error: Option<String>,
    /// When the resident artifact finished loading.
    pub loaded_at: Option<DateTime<Utc>>,
    /// When the service (and its counters) started.
    pub started_at: DateTime<Utc>,
    /// Where artifacts are read from.
    pub source: String,
}
