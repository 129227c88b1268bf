//! Typed request/response records for the HTTP surface.

use serde::{Deserialize, Serialize};
use spamguard_serving::{
    BatchPrediction, HealthReport, MetricsReport, MetricsSnapshot, PredictionResult, StatusReport,
};

use crate::error::ApiError;

/// Bounds enforced before a request reaches the model service.
#[derive(Debug, Clone, Copy)]
pub struct RequestLimits {
    /// Largest accepted batch.
    pub max_batch: usize,
    /// Largest accepted message, in bytes.
    pub max_message_bytes: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_batch: 100,
            max_message_bytes: 10_000,
        }
    }
}

impl RequestLimits {
    fn check_message(&self, field: &str, message: &str) -> Result<(), ApiError> {
        if message.trim().is_empty() {
            return Err(ApiError::Unprocessable(format!("{field} must not be empty")));
        }
        if message.len() > self.max_message_bytes {
            return Err(ApiError::Unprocessable(format!(
                "{field} is {} bytes, limit is {}",
                message.len(),
                self.max_message_bytes
            )));
        }
        Ok(())
    }
}

/// `POST /predict` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    /// Message to classify.
    pub message: String,
}

impl PredictRequest {
    /// Rejects empty or oversized messages.
    pub fn validate(&self, limits: &RequestLimits) -> Result<(), ApiError> {
        limits.check_message("message", &self.message)
    }
}

/// `POST /predict/batch` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictBatchRequest {
    /// Messages to classify, in order.
    pub messages: Vec<String>,
}

impl PredictBatchRequest {
    /// Requires `1..=max_batch` messages, each valid on its own.
    pub fn validate(&self, limits: &RequestLimits) -> Result<(), ApiError> {
        if self.messages.is_empty() {
            return Err(ApiError::Unprocessable("messages must not be empty".into()));
        }
        if self.messages.len() > limits.max_batch {
            return Err(ApiError::Unprocessable(format!(
                "{} messages exceed the batch limit of {}",
                self.messages.len(),
                limits.max_batch
            )));
        }
        for (i, message) in self.messages.iter().enumerate() {
            limits.check_message(&format!("messages[{i}]"), message)?;
        }
        Ok(())
    }
}

/// Classification of one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    /// `spam` or `ham`.
    pub prediction: String,
    /// `prediction == "spam"`.
    pub is_spam: bool,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Input message.
    pub message: String,
}

impl From<PredictionResult> for PredictResponse {
    fn from(result: PredictionResult) -> Self {
        Self {
            prediction: result.label.as_str().to_string(),
            is_spam: result.is_spam,
            confidence: result.confidence,
            message: result.message,
        }
    }
}

/// `POST /predict/batch` answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictBatchResponse {
    /// Results in request order.
    pub predictions: Vec<PredictResponse>,
    /// Number of messages.
    pub total: usize,
    /// Messages predicted spam.
    pub spam_count: usize,
    /// Messages predicted ham.
    pub ham_count: usize,
}

impl From<BatchPrediction> for PredictBatchResponse {
    fn from(batch: BatchPrediction) -> Self {
        Self {
            predictions: batch.predictions.into_iter().map(Into::into).collect(),
            total: batch.total,
            spam_count: batch.spam_count,
            ham_count: batch.ham_count,
        }
    }
}

/// `GET /health` answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` iff the model is ready.
    pub status: String,
    /// Whether an artifact is resident.
    pub model_loaded: bool,
    /// Model name.
    pub model_name: String,
    /// Service version.
    pub version: String,
}

impl From<HealthReport> for HealthResponse {
    fn from(report: HealthReport) -> Self {
        Self {
            status: report.status.to_string(),
            model_loaded: report.model_loaded,
            model_name: report.model_name,
            version: report.version,
        }
    }
}

/// Offline metrics section of `GET /metrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetricsBody {
    /// Model name.
    pub model: String,
    /// Accuracy.
    pub accuracy: f64,
    /// Precision.
    pub precision: f64,
    /// Recall.
    pub recall: f64,
    /// F1.
    pub f1: f64,
    /// ROC-AUC, when available.
    pub roc_auc: Option<f64>,
}

impl From<MetricsSnapshot> for ModelMetricsBody {
    fn from(snapshot: MetricsSnapshot) -> Self {
        Self {
            model: snapshot.model,
            accuracy: snapshot.accuracy,
            precision: snapshot.precision,
            recall: snapshot.recall,
            f1: snapshot.f1,
            roc_auc: snapshot.roc_auc,
        }
    }
}

/// Live counters section of `GET /metrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetricsBody {
    /// Seconds since start.
    pub uptime_seconds: f64,
    /// Messages submitted for classification.
    pub total_requests: u64,
    /// Predictions produced.
    pub total_predictions: u64,
    /// Spam predictions.
    pub spam_detected: u64,
    /// Ham predictions.
    pub ham_detected: u64,
    /// Calls refused while no model was ready.
    pub rejected_requests: u64,
    /// Whether an artifact is resident.
    pub model_loaded: bool,
}

/// `GET /metrics` answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResponse {
    /// Offline metrics, absent until a model with metrics is loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_metrics: Option<ModelMetricsBody>,
    /// Live counters.
    pub system_metrics: SystemMetricsBody,
}

impl From<MetricsReport> for MetricsResponse {
    fn from(report: MetricsReport) -> Self {
        let system = report.system_metrics;
        Self {
            model_metrics: report.model_metrics.map(Into::into),
            system_metrics: SystemMetricsBody {
                uptime_seconds: system.uptime_seconds,
                total_requests: system.total_requests,
                total_predictions: system.total_predictions,
                spam_detected: system.spam_detected,
                ham_detected: system.ham_detected,
                rejected_requests: system.rejected_requests,
                model_loaded: system.model_loaded,
            },
        }
    }
}

/// `GET /admin/status` answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Lifecycle state (`unloaded`, `loading`, `ready`, `failed`).
    pub status: String,
    /// Loads attempted since start.
    pub load_attempts: u64,
    /// Most recent load failure.
    pub last_error: Option<String>,
    /// Why the metrics document was rejected, if it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_error: Option<String>,
    /// RFC3339 completion time of the resident load.
    pub loaded_at: Option<String>,
    /// RFC3339 service start time.
    pub started_at: String,
    /// Artifact source.
    pub source: String,
}

impl From<StatusReport> for StatusResponse {
    fn from(report: StatusReport) -> Self {
        Self {
            status: report.status.as_str().to_string(),
            load_attempts: report.load_attempts,
            last_error: report.last_error,
            metrics_error: report.metrics_error,
            loaded_at: report.loaded_at.map(|at| at.to_rfc3339()),
            started_at: report.started_at.to_rfc3339(),
            source: report.source,
        }
    }
}

/// `GET /` answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
    /// Service name.
    pub name: String,
    /// Service version.
    pub version: String,
    /// Always `running`.
    pub status: String,
    /// Health endpoint path.
    pub health: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_request_rejects_blank_and_oversized() {
        let limits = RequestLimits {
            max_batch: 2,
            max_message_bytes: 8,
        };
        assert!(PredictRequest { message: "   ".into() }.validate(&limits).is_err());
        assert!(PredictRequest { message: "123456789".into() }.validate(&limits).is_err());
        assert!(PredictRequest { message: "hello".into() }.validate(&limits).is_ok());
    }

    #[test]
    fn batch_request_bounds() {
        let limits = RequestLimits {
            max_batch: 2,
            max_message_bytes: 100,
        };
        let empty = PredictBatchRequest { messages: vec![] };
        assert!(empty.validate(&limits).is_err());
        let too_many = PredictBatchRequest {
            messages: vec!["a".into(), "b".into(), "c".into()],
        };
        assert!(too_many.validate(&limits).is_err());
        let blank_item = PredictBatchRequest {
            messages: vec!["ok".into(), String::new()],
        };
        let err = blank_item.validate(&limits).unwrap_err();
        assert!(err.to_string().contains("messages[1]"));
    }

    #[test]
    fn metrics_response_omits_absent_model_metrics() {
        let body = MetricsResponse {
            model_metrics: None,
            system_metrics: SystemMetricsBody {
                uptime_seconds: 1.5,
                total_requests: 0,
                total_predictions: 0,
                spam_detected: 0,
                ham_detected: 0,
                rejected_requests: 0,
                model_loaded: false,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("model_metrics").is_none());
        assert_eq!(json["system_metrics"]["model_loaded"], false);
    }
}
