//! Router and handlers. Handlers validate, call the model service, and
//! convert its reports into response records.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use spamguard_serving::ModelService;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    error::ApiError,
    schemas::{
        HealthResponse, MetricsResponse, PredictBatchRequest, PredictBatchResponse,
        PredictRequest, PredictResponse, RequestLimits, RootResponse, StatusResponse,
    },
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// The model service.
    pub service: Arc<ModelService>,
    /// Request bounds.
    pub limits: RequestLimits,
}

impl AppState {
    /// Wraps a service with the given limits.
    #[must_use]
    pub fn new(service: Arc<ModelService>, limits: RequestLimits) -> Self {
        Self { service, limits }
    }
}

/// Builds the full router with CORS and request tracing.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/predict/batch", post(predict_batch))
        .route("/metrics", get(metrics))
        .route("/admin/status", get(status))
        .route("/admin/reload", post(reload))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        name: "Spamguard API".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        status: "running".into(),
        health: "/health".into(),
    })
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(state.service.health_snapshot().into())
}

async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(request) = payload?;
    request.validate(&state.limits)?;
    state.service.ensure_loaded().await;
    let result = state.service.classify(&request.message)?;
    Ok(Json(result.into()))
}

async fn predict_batch(
    State(state): State<AppState>,
    payload: Result<Json<PredictBatchRequest>, JsonRejection>,
) -> Result<Json<PredictBatchResponse>, ApiError> {
    let Json(request) = payload?;
    request.validate(&state.limits)?;
    state.service.ensure_loaded().await;
    let batch = state.service.classify_batch(&request.messages)?;
    Ok(Json(batch.into()))
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(state.service.metrics_snapshot().into())
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(state.service.status_report().into())
}

async fn reload(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    state.service.reload().await?;
    tracing::info!("model reloaded on request");
    Ok(Json(state.service.health_snapshot().into()))
}
