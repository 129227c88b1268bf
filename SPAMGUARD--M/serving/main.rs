use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{json, Value};
use shared_logging::LogLevel;
use tokio::{sync::Mutex as LoadGate, task, time};

use crate::{
    artifact::{ArtifactLoader, LoadedModel},
    config::ModelSettings,
    counters::ServiceCounters,
    error::{ArtifactLoadError, ServiceError},
    prediction::{BatchPrediction, PredictionResult},
    report::{HealthReport, MetricsReport, ServiceStatus, StatusReport, SystemMetrics},
    telemetry::ServingTelemetry,
};

const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

enum ServiceState {
    Unloaded,
    Loading,
    Ready(Arc<LoadedModel>),
    Failed { reason: String, at: DateTime<Utc> },
}

impl ServiceState {
    const fn status(&self) -> ServiceStatus {
        match self {
            Self::Unloaded => ServiceStatus::Unloaded,
            Self::Loading => ServiceStatus::Loading,
            Self::Ready(_) => ServiceStatus::Ready,
            Self::Failed { .. } => ServiceStatus::Failed,
        }
    }
}

/// Load-side state shared with the tasks that perform loads.
///
/// A load runs in its own task holding an owned gate guard, so a caller that
/// stops waiting never releases the gate before the load has settled.
struct LoadCore {
    loader: Arc<dyn ArtifactLoader>,
    load_timeout: Duration,
    state: RwLock<ServiceState>,
    gate: Arc<LoadGate<()>>,
    load_attempts: AtomicU64,
    telemetry: Option<ServingTelemetry>,
}

impl LoadCore {
    fn status(&self) -> ServiceStatus {
        self.state.read().status()
    }

    async fn load(&self, reload: bool) -> Result<Arc<LoadedModel>, ArtifactLoadError> {
        let previous = match &*self.state.read() {
            ServiceState::Ready(model) => Some(Arc::clone(model)),
            _ => None,
        };
        if previous.is_none() {
            *self.state.write() = ServiceState::Loading;
        }
        let attempt = self.load_attempts.fetch_add(1, Ordering::Relaxed) + 1;
        self.log(
            LogLevel::Info,
            "serving.model.loading",
            json!({ "source": self.loader.describe(), "attempt": attempt, "reload": reload }),
        );

        let started = Instant::now();
        let loader = Arc::clone(&self.loader);
        let pending = task::spawn_blocking(move || loader.load());
        let outcome = match time::timeout(self.load_timeout, pending).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(ArtifactLoadError::Aborted(join.to_string())),
            Err(_) => Err(ArtifactLoadError::Timeout(self.load_timeout)),
        };
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(model) => {
                let model = Arc::new(model);
                *self.state.write() = ServiceState::Ready(Arc::clone(&model));
                if let Some(error) = &model.metrics_error {
                    self.log(
                        LogLevel::Error,
                        "serving.metrics.invalid",
                        json!({ "model": model.model_name(), "error": error }),
                    );
                } else if model.metrics.is_none() {
                    self.log(
                        LogLevel::Warn,
                        "serving.metrics.missing",
                        json!({ "model": model.model_name() }),
                    );
                }
                let payload = json!({
                    "model": model.model_name(),
                    "elapsed_ms": elapsed_ms,
                    "attempt": attempt,
                });
                self.log(LogLevel::Info, "serving.model.loaded", payload.clone());
                self.event(
                    if reload { "serving.model.reloaded" } else { "serving.model.loaded" },
                    payload,
                );
                Ok(model)
            }
            Err(err) => {
                let reason = err.to_string();
                let kept_previous = previous.is_some();
                if !kept_previous {
                    *self.state.write() = ServiceState::Failed {
                        reason: reason.clone(),
                        at: Utc::now(),
                    };
                }
                let payload = json!({
                    "error": reason,
                    "elapsed_ms": elapsed_ms,
                    "attempt": attempt,
                    "kept_previous": kept_previous,
                });
                self.log(LogLevel::Error, "serving.model.load_failed", payload.clone());
                self.event("serving.model.load_failed", payload);
                Err(err)
            }
        }
    }

    fn log(&self, level: LogLevel, message: &str, metadata: Value) {
        if let Some(tel) = &self.telemetry {
            let _ = tel.log(level, message, metadata);
        }
    }

    fn event(&self, event_type: &str, payload: Value) {
        if let Some(tel) = &self.telemetry {
            let _ = tel.event(event_type, payload);
        }
    }
}

/// Owns one classifier artifact and answers classification queries.
///
/// State moves `Unloaded → Loading → Ready | Failed`. Loads are serialised by
/// an async gate: concurrent first callers wait for the single load instead of
/// issuing their own, and dropping a waiting caller does not abandon the load.
/// Classification never touches disk and fails fast with
/// [`ServiceError::ServiceUnavailable`] unless the service is ready.
pub struct ModelService {
    core: Arc<LoadCore>,
    default_name: String,
    version: String,
    counters: Arc<ServiceCounters>,
}

impl ModelService {
    /// Returns a builder around `loader`.
    #[must_use]
    pub fn builder(loader: Arc<dyn ArtifactLoader>) -> ModelServiceBuilder {
        ModelServiceBuilder::new(loader)
    }

    /// Service for the filesystem artifact described by `settings`.
    #[must_use]
    pub fn from_settings(settings: &ModelSettings, telemetry: Option<ServingTelemetry>) -> Self {
        let builder = Self::builder(Arc::new(settings.loader()))
            .default_name(settings.name.clone())
            .load_timeout(settings.load_timeout());
        match telemetry {
            Some(tel) => builder.telemetry(tel),
            None => builder,
        }
        .build()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> ServiceStatus {
        self.core.status()
    }

    /// Shared counters.
    #[must_use]
    pub fn counters(&self) -> &Arc<ServiceCounters> {
        &self.counters
    }

    /// Loads the artifact if nothing has been attempted yet.
    ///
    /// Ready and failed services return immediately; a failed load is not
    /// retried here, only through [`ModelService::reload`].
    pub async fn ensure_loaded(&self) -> ServiceStatus {
        let status = self.status();
        if matches!(status, ServiceStatus::Ready | ServiceStatus::Failed) {
            return status;
        }
        let core = Arc::clone(&self.core);
        let load = tokio::spawn(async move {
            let _guard = Arc::clone(&core.gate).lock_owned().await;
            // Loading seen under the gate means the previous load task panicked
            if matches!(core.status(), ServiceStatus::Unloaded | ServiceStatus::Loading) {
                let _ = core.load(false).await;
            }
            core.status()
        });
        load.await.unwrap_or_else(|_| self.status())
    }

    /// Forces a fresh load.
    ///
    /// On failure a previously ready artifact keeps serving; otherwise the
    /// service ends up failed.
    pub async fn reload(&self) -> Result<ServiceStatus, ServiceError> {
        let core = Arc::clone(&self.core);
        let load = tokio::spawn(async move {
            let _guard = Arc::clone(&core.gate).lock_owned().await;
            core.load(true).await.map(|_| core.status())
        });
        match load.await {
            Ok(outcome) => Ok(outcome?),
            Err(join) => Err(ArtifactLoadError::Aborted(join.to_string()).into()),
        }
    }

    fn ready_model(&self) -> Result<Arc<LoadedModel>, ServiceError> {
        let state = self.core.state.read();
        let unavailable = |reason: String| -> Result<Arc<LoadedModel>, ServiceError> {
            self.counters.record_rejected();
            Err(ServiceError::ServiceUnavailable {
                state: state.status().as_str(),
                reason,
            })
        };
        match &*state {
            ServiceState::Ready(model) => Ok(Arc::clone(model)),
            ServiceState::Failed { reason, at } => {
                unavailable(format!("model failed to load at {}: {reason}", at.to_rfc3339()))
            }
            ServiceState::Loading => unavailable("model is still loading".into()),
            ServiceState::Unloaded => unavailable("model has not been loaded".into()),
        }
    }

    /// Classifies one message.
    pub fn classify(&self, message: &str) -> Result<PredictionResult, ServiceError> {
        let model = self.ready_model()?;
        let label = model.artifact.predict(message);
        let score = model.artifact.decision_score(message);
        self.counters.record(label);
        Ok(PredictionResult::new(message, label, score))
    }

    /// Classifies a JSON value, rejecting anything that is not a string.
    pub fn classify_value(&self, message: &Value) -> Result<PredictionResult, ServiceError> {
        let text = message.as_str().ok_or_else(|| {
            ServiceError::InvalidInput(format!(
                "message must be a string, got {}",
                json_kind(message)
            ))
        })?;
        self.classify(text)
    }

    /// Classifies messages in order against one artifact snapshot.
    ///
    /// Either every message is classified or none is; counters move once for
    /// the whole batch.
    pub fn classify_batch<S: AsRef<str>>(
        &self,
        messages: &[S],
    ) -> Result<BatchPrediction, ServiceError> {
        let model = self.ready_model()?;
        let results: Vec<PredictionResult> = messages
            .iter()
            .map(|message| {
                let message = message.as_ref();
                let label = model.artifact.predict(message);
                PredictionResult::new(message, label, model.artifact.decision_score(message))
            })
            .collect();
        let batch = BatchPrediction::from_results(results);
        self.counters
            .record_batch(batch.total as u64, batch.spam_count as u64);
        Ok(batch)
    }

    fn resident_model(&self) -> Option<Arc<LoadedModel>> {
        match &*self.core.state.read() {
            ServiceState::Ready(model) => Some(Arc::clone(model)),
            _ => None,
        }
    }

    /// Model metrics (when ready) plus live counters. Never fails.
    #[must_use]
    pub fn metrics_snapshot(&self) -> MetricsReport {
        let model = self.resident_model();
        let totals = self.counters.snapshot();
        let uptime = (self.counters.uptime().as_secs_f64() * 100.0).round() / 100.0;
        MetricsReport {
            model_metrics: model.as_ref().and_then(|m| m.metrics.clone()),
            system_metrics: SystemMetrics {
                uptime_seconds: uptime,
                total_requests: totals.requests,
                total_predictions: totals.predictions,
                spam_detected: totals.spam,
                ham_detected: totals.ham,
                rejected_requests: totals.rejected,
                model_loaded: model.is_some(),
            },
        }
    }

    /// Health probe answer. Side-effect free; never fails.
    #[must_use]
    pub fn health_snapshot(&self) -> HealthReport {
        let state = self.core.state.read();
        let status = state.status();
        let model_name = match &*state {
            ServiceState::Ready(model) => model.model_name().to_string(),
            _ => self.default_name.clone(),
        };
        HealthReport {
            status: status.health_label(),
            model_loaded: status == ServiceStatus::Ready,
            model_name,
            version: self.version.clone(),
        }
    }

    /// Detailed lifecycle view.
    #[must_use]
    pub fn status_report(&self) -> StatusReport {
        let state = self.core.state.read();
        let (last_error, loaded_at, metrics_error) = match &*state {
            ServiceState::Failed { reason, .. } => (Some(reason.clone()), None, None),
            ServiceState::Ready(model) => {
                (None, Some(model.loaded_at), model.metrics_error.clone())
            }
            _ => (None, None, None),
        };
        StatusReport {
            status: state.status(),
            load_attempts: self.core.load_attempts.load(Ordering::Relaxed),
            last_error,
            metrics_error,
            loaded_at,
            started_at: self.counters.started_at(),
            source: self.core.loader.describe(),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Builder for [`ModelService`].
pub struct ModelServiceBuilder {
    loader: Arc<dyn ArtifactLoader>,
    default_name: String,
    version: String,
    load_timeout: Duration,
    telemetry: Option<ServingTelemetry>,
}

impl ModelServiceBuilder {
    fn new(loader: Arc<dyn ArtifactLoader>) -> Self {
        Self {
            loader,
            default_name: "unknown".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            telemetry: None,
        }
    }

    /// Name reported before an artifact is resident.
    #[must_use]
    pub fn default_name(mut self, name: impl Into<String>) -> Self {
        self.default_name = name.into();
        self
    }

    /// Version reported by health checks.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Upper bound for one load.
    #[must_use]
    pub const fn load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Sets telemetry.
    #[must_use]
    pub fn telemetry(mut self, telemetry: ServingTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Builds an unloaded service.
    #[must_use]
    pub fn build(self) -> ModelService {
        ModelService {
            core: Arc::new(LoadCore {
                loader: self.loader,
                load_timeout: self.load_timeout,
                state: RwLock::new(ServiceState::Unloaded),
                gate: Arc::new(LoadGate::new(())),
                load_attempts: AtomicU64::new(0),
                telemetry: self.telemetry,
            }),
            default_name: self.default_name,
            version: self.version,
            counters: Arc::new(ServiceCounters::new()),
        }
    }
}
