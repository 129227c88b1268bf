use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer};
use shared_logging::LogLevel;

use crate::artifact::FsArtifactLoader;

/// Environment variables that override file settings.
pub const ENV_ARTIFACT_PATH: &str = "SPAMGUARD_ARTIFACT_PATH";
/// Metrics document override.
pub const ENV_METRICS_PATH: &str = "SPAMGUARD_METRICS_PATH";
/// Bind host override.
pub const ENV_HOST: &str = "SPAMGUARD_HOST";
/// Bind port override.
pub const ENV_PORT: &str = "SPAMGUARD_PORT";
/// JSON log file override.
pub const ENV_LOG_PATH: &str = "SPAMGUARD_LOG_PATH";

/// Complete service configuration (`spamguard.toml`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServingConfig {
    /// Artifact and load settings.
    #[serde(default)]
    pub model: ModelSettings,
    /// HTTP front end settings.
    #[serde(default)]
    pub server: ServerSettings,
    /// Log and event sinks.
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

/// Where the artifact lives and how it is loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSettings {
    /// Exported classifier artifact.
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,
    /// Metrics document written by training; optional on disk. An empty
    /// string turns metrics loading off.
    #[serde(default = "default_metrics_path", deserialize_with = "optional_path")]
    pub metrics_path: Option<PathBuf>,
    /// Name reported before any artifact is loaded.
    #[serde(default = "default_model_name")]
    pub name: String,
    /// Upper bound on a single load.
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,
    /// Defer the load to the first prediction instead of startup.
    #[serde(default)]
    pub lazy_load: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            artifact_path: default_artifact_path(),
            metrics_path: default_metrics_path(),
            name: default_model_name(),
            load_timeout_ms: default_load_timeout_ms(),
            lazy_load: false,
        }
    }
}

impl ModelSettings {
    /// Load timeout as a duration.
    #[must_use]
    pub const fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    /// Filesystem loader for these paths.
    #[must_use]
    pub fn loader(&self) -> FsArtifactLoader {
        let loader = FsArtifactLoader::new(&self.artifact_path);
        match &self.metrics_path {
            Some(path) => loader.with_metrics(path),
            None => loader,
        }
    }
}

/// HTTP bind address and request limits.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Bind host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest accepted batch.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
    /// Largest accepted message, in bytes.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_batch: default_max_batch(),
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

impl ServerSettings {
    /// `host:port`.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Optional JSON log and event files.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    /// JSON-lines log file.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    /// JSON-lines lifecycle event file.
    #[serde(default)]
    pub event_log_path: Option<PathBuf>,
    /// Threshold for the JSON log file.
    #[serde(default = "default_min_level")]
    pub min_level: LogLevel,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_path: None,
            event_log_path: None,
            min_level: default_min_level(),
        }
    }
}

impl ServingConfig {
    /// Loads a TOML file, resolving relative paths against its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading serving config {}", path.display()))?;
        let mut config: Self =
            toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        let base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        config.resolve_relative(&base);
        config.validate()?;
        Ok(config)
    }

    /// Applies `SPAMGUARD_*` overrides from the process environment.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Applies overrides from an arbitrary lookup (the environment in production).
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(path) = lookup(ENV_ARTIFACT_PATH) {
            self.model.artifact_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(ENV_METRICS_PATH) {
            self.model.metrics_path = path_or_none(&path);
        }
        if let Some(host) = lookup(ENV_HOST) {
            self.server.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.server.port = port
                .parse()
                .with_context(|| format!("{ENV_PORT}={port} is not a port number"))?;
        }
        if let Some(path) = lookup(ENV_LOG_PATH) {
            self.telemetry.log_path = Some(PathBuf::from(path));
        }
        self.validate()?;
        Ok(self)
    }

    fn resolve_relative(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.model.artifact_path);
        if let Some(p) = self.model.metrics_path.as_mut() {
            resolve(p);
        }
        if let Some(p) = self.telemetry.log_path.as_mut() {
            resolve(p);
        }
        if let Some(p) = self.telemetry.event_log_path.as_mut() {
            resolve(p);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.model.load_timeout_ms == 0 {
            bail!("model.load_timeout_ms must be positive");
        }
        if self.server.max_batch == 0 {
            bail!("server.max_batch must be positive");
        }
        if self.server.max_message_bytes == 0 {
            bail!("server.max_message_bytes must be positive");
        }
        Ok(())
    }
}

fn path_or_none(raw: &str) -> Option<PathBuf> {
    let raw = raw.trim();
    (!raw.is_empty()).then(|| PathBuf::from(raw))
}

fn optional_path<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(path_or_none(&raw))
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("models/linear_svc.json")
}

#[allow(clippy::unnecessary_wraps)]
fn default_metrics_path() -> Option<PathBuf> {
    Some(PathBuf::from("models/linear_svc_metrics.json"))
}

fn default_model_name() -> String {
    "linear_svc".into()
}

const fn default_load_timeout_ms() -> u64 {
    30_000
}

fn default_host() -> String {
    "0.0.0.0".into()
}

const fn default_port() -> u16 {
    8000
}

const fn default_max_batch() -> usize {
    100
}

const fn default_max_message_bytes() -> usize {
    10_000
}

const fn default_min_level() -> LogLevel {
    LogLevel::Info
}
