#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rust_2018_idioms,
    missing_docs
)]

//! HTTP front end and command line for the spamguard model service.

/// Error body and status mapping.
#[path = "../error.rs"]
pub mod error;

/// Request and response records.
#[path = "../schemas.rs"]
pub mod schemas;

/// Router and handlers.
#[path = "../routes.rs"]
pub mod routes;

/// `spamguard` subcommands.
#[path = "../cli.rs"]
pub mod cli;

pub use cli::{execute, Cli, Commands, ServeArgs};
pub use error::{ApiError, ErrorResponse};
pub use routes::{router, AppState};
pub use schemas::{
    HealthResponse, MetricsResponse, PredictBatchRequest, PredictBatchResponse, PredictRequest,
    PredictResponse, RequestLimits, StatusResponse,
};
