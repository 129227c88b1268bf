use std::{
    env,
    io::{self, BufRead},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use shared_event_bus::{EventPublisher, FileEventPublisher};
use spamguard_serving::{
    ClassifierArtifact, LinearTextArtifact, MetricsSnapshot, ModelService, ModelSettings,
    ServiceStatus, ServingConfig, ServingTelemetry, TelemetrySettings,
};
use tokio::net::TcpListener;

use crate::{
    routes::{router, AppState},
    schemas::{PredictBatchResponse, RequestLimits},
};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "spamguard.toml";

/// `spamguard` command line.
#[derive(Parser, Debug)]
#[command(name = "spamguard", version, about = "Spam/ham prediction service")]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Runs the HTTP service.
    Serve(ServeArgs),
    /// Classifies messages from arguments (or stdin lines) and prints JSON.
    Classify {
        /// Exported artifact.
        #[arg(long, default_value = "models/linear_svc.json")]
        artifact: PathBuf,
        /// Metrics document shown alongside the artifact.
        #[arg(long)]
        metrics: Option<PathBuf>,
        /// Messages; read from stdin when empty.
        messages: Vec<String>,
    },
    /// Prints a summary of an artifact.
    Inspect {
        /// Exported artifact.
        #[arg(long, default_value = "models/linear_svc.json")]
        artifact: PathBuf,
        /// Metrics document to include.
        #[arg(long)]
        metrics: Option<PathBuf>,
    },
}

/// Flags for `spamguard serve`.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// TOML config file.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Overrides `server.host`.
    #[arg(long)]
    pub host: Option<String>,
    /// Overrides `server.port`.
    #[arg(long)]
    pub port: Option<u16>,
    /// Defers the model load to the first prediction.
    #[arg(long)]
    pub lazy: bool,
}

impl ServeArgs {
    /// File, then `SPAMGUARD_*` environment, then flags.
    pub fn resolve(&self) -> Result<ServingConfig> {
        self.resolve_with(|key| env::var(key).ok())
    }

    fn resolve_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<ServingConfig> {
        let path = self.config.clone().or_else(|| {
            let local = PathBuf::from(DEFAULT_CONFIG_FILE);
            local.is_file().then_some(local)
        });
        let config = match path {
            Some(path) => ServingConfig::load(&path)?,
            None => ServingConfig::default(),
        };
        let mut config = config.apply_overrides(lookup)?;
        if let Some(host) = &self.host {
            config.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.lazy {
            config.model.lazy_load = true;
        }
        Ok(config)
    }
}

/// Runs a parsed command line.
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve(args) => serve(args.resolve()?).await,
        Commands::Classify {
            artifact,
            metrics,
            messages,
        } => {
            let messages = if messages.is_empty() {
                read_lines(io::stdin().lock())?
            } else {
                messages
            };
            let batch = classify_messages(&artifact, metrics.as_deref(), &messages).await?;
            println!("{}", serde_json::to_string_pretty(&batch)?);
            Ok(())
        }
        Commands::Inspect { artifact, metrics } => {
            let summary = inspect(&artifact, metrics.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}

/// Opens the configured log and event sinks.
pub fn build_telemetry(settings: &TelemetrySettings) -> Result<ServingTelemetry> {
    let mut builder = ServingTelemetry::builder("serving").min_level(settings.min_level);
    if let Some(path) = &settings.log_path {
        builder = builder.log_path(path);
    }
    if let Some(path) = &settings.event_log_path {
        let publisher: Arc<dyn EventPublisher> = Arc::new(
            FileEventPublisher::new(path)
                .with_context(|| format!("opening event log {}", path.display()))?,
        );
        builder = builder.event_publisher(publisher);
    }
    builder.build()
}

/// Binds the listener and serves until ctrl-c.
pub async fn serve(config: ServingConfig) -> Result<()> {
    let telemetry = build_telemetry(&config.telemetry)?;
    let service = Arc::new(ModelService::from_settings(&config.model, Some(telemetry)));
    if config.model.lazy_load {
        tracing::info!("model load deferred to first prediction");
    } else if service.ensure_loaded().await != ServiceStatus::Ready {
        let report = service.status_report();
        tracing::warn!(
            error = report.last_error.as_deref().unwrap_or("unknown"),
            "starting without a model; predictions answer 503 until reload"
        );
    }

    let limits = RequestLimits {
        max_batch: config.server.max_batch,
        max_message_bytes: config.server.max_message_bytes,
    };
    let app = router(AppState::new(service, limits));
    let addr = config.server.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "spamguard listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;
    tracing::info!("spamguard stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "ctrl-c handler failed");
    }
}

/// Loads `artifact` once and classifies `messages`.
pub async fn classify_messages(
    artifact: &Path,
    metrics: Option<&Path>,
    messages: &[String],
) -> Result<PredictBatchResponse> {
    let settings = ModelSettings {
        artifact_path: artifact.to_path_buf(),
        metrics_path: metrics.map(Path::to_path_buf),
        ..ModelSettings::default()
    };
    let service =
        ModelService::from_settings(&settings, Some(ServingTelemetry::tracing_only("serving")));
    if service.ensure_loaded().await != ServiceStatus::Ready {
        let reason = service.status_report().last_error.unwrap_or_default();
        bail!("model unavailable: {reason}");
    }
    Ok(service.classify_batch(messages)?.into())
}

/// Artifact summary with optional metrics.
pub fn inspect(artifact: &Path, metrics: Option<&Path>) -> Result<Value> {
    let model = LinearTextArtifact::load(artifact)?;
    let metrics = match metrics {
        Some(path) => MetricsSnapshot::load_optional(path)?,
        None => None,
    };
    let (min, max) = model.ngram_range();
    Ok(json!({
        "name": model.name(),
        "path": artifact.display().to_string(),
        "intercept": model.intercept(),
        "ngram_range": [min, max],
        "terms": model.term_count(),
        "metrics": metrics,
    }))
}

fn read_lines(input: impl BufRead) -> Result<Vec<String>> {
    let mut messages = Vec::new();
    for line in input.lines() {
        let line = line.context("reading stdin")?;
        if !line.trim().is_empty() {
            messages.push(line);
        }
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn write_artifact(dir: &Path) -> PathBuf {
        let path = dir.join("model.json");
        std::fs::write(
            &path,
            json!({
                "format_version": 1,
                "name": "linear_svc",
                "intercept": -0.2,
                "ngram_range": [1, 1],
                "weights": { "prize": 2.0, "claim": 1.0, "lunch": -1.5 }
            })
            .to_string(),
        )
        .unwrap();
        path
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["spamguard", "serve", "--port", "9000", "--lazy"]).unwrap();
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.port, Some(9000));
                assert!(args.lazy);
                assert!(args.config.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
        let cli = Cli::try_parse_from(["spamguard", "classify", "hello", "world"]).unwrap();
        assert!(matches!(cli.command, Commands::Classify { ref messages, .. } if messages.len() == 2));
        assert!(Cli::try_parse_from(["spamguard", "serve", "--port", "nope"]).is_err());
    }

    #[test]
    fn flags_override_environment_and_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("spamguard.toml");
        std::fs::write(
            &path,
            "[model]\nartifact_path = \"m.json\"\n[server]\nhost = \"127.0.0.1\"\nport = 7000\n",
        )
        .unwrap();
        let env = HashMap::from([("SPAMGUARD_PORT", "7100"), ("SPAMGUARD_HOST", "10.0.0.1")]);
        let args = ServeArgs {
            config: Some(path),
            port: Some(7200),
            ..ServeArgs::default()
        };
        let config = args
            .resolve_with(|key| env.get(key).map(|v| (*v).to_string()))
            .unwrap();
        assert_eq!(config.server.port, 7200);
        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.model.artifact_path, dir.path().join("m.json"));
        assert!(!config.model.lazy_load);
    }

    #[tokio::test]
    async fn classify_messages_uses_artifact() {
        let dir = tempdir().unwrap();
        let artifact = write_artifact(dir.path());
        let messages = vec!["Claim your prize".to_string(), "lunch at noon?".to_string()];
        let batch = classify_messages(&artifact, None, &messages).await.unwrap();
        assert_eq!((batch.total, batch.spam_count, batch.ham_count), (2, 1, 1));
        assert_eq!(batch.predictions[0].prediction, "spam");
        assert_eq!(batch.predictions[1].prediction, "ham");
    }

    #[tokio::test]
    async fn classify_messages_reports_missing_artifact() {
        let dir = tempdir().unwrap();
        let err = classify_messages(&dir.path().join("none.json"), None, &["hi".into()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("model unavailable"));
    }

    #[test]
    fn inspect_summarises_artifact() {
        let dir = tempdir().unwrap();
        let artifact = write_artifact(dir.path());
        let summary = inspect(&artifact, Some(&dir.path().join("absent.json"))).unwrap();
        assert_eq!(summary["name"], "linear_svc");
        assert_eq!(summary["terms"], 3);
        assert_eq!(summary["ngram_range"], json!([1, 1]));
        assert!(summary["metrics"].is_null());
    }

    #[test]
    fn stdin_lines_skip_blanks() {
        let lines = read_lines("first\n\n  \nsecond\n".as_bytes()).unwrap();
        assert_eq!(lines, ["first", "second"]);
    }
}
