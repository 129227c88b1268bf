use std::{fmt, path::PathBuf, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::ArtifactLoadError, linear::LinearTextArtifact, metrics::MetricsSnapshot};

/// Discrete class emitted by a classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    /// Unsolicited message.
    Spam,
    /// Legitimate message.
    Ham,
}

impl Label {
    /// Wire name (`spam` / `ham`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spam => "spam",
            Self::Ham => "ham",
        }
    }

    /// `true` for [`Label::Spam`].
    #[must_use]
    pub const fn is_spam(self) -> bool {
        matches!(self, Self::Spam)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pre-trained text classification pipeline, immutable once loaded.
///
/// `decision_score` is a signed margin from the separating boundary, positive
/// toward spam. It is not a calibrated probability.
pub trait ClassifierArtifact: Send + Sync + fmt::Debug {
    /// Declared artifact name (e.g. `linear_svc`).
    fn name(&self) -> &str;

    /// Discrete label for `text`.
    fn predict(&self, text: &str) -> Label;

    /// Raw margin for `text`.
    fn decision_score(&self, text: &str) -> f64;
}

/// Artifact and metrics held in memory while the service is ready.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    /// Classifier used on the hot path.
    pub artifact: Arc<dyn ClassifierArtifact>,
    /// Offline evaluation metrics, when the producer wrote them.
    pub metrics: Option<MetricsSnapshot>,
    /// Why a present metrics document was rejected. The artifact still serves.
    pub metrics_error: Option<String>,
    /// Completion time of the load.
    pub loaded_at: DateTime<Utc>,
}

impl LoadedModel {
    /// Bundles an artifact with optional metrics, stamped now.
    #[must_use]
    pub fn new(artifact: Arc<dyn ClassifierArtifact>, metrics: Option<MetricsSnapshot>) -> Self {
        Self {
            artifact,
            metrics,
            metrics_error: None,
            loaded_at: Utc::now(),
        }
    }

    /// Model name, preferring the metrics document over the artifact.
    #[must_use]
    pub fn model_name(&self) -> &str {
        self.metrics
            .as_ref()
            .map_or_else(|| self.artifact.name(), |metrics| metrics.model.as_str())
    }
}

/// Source of a [`LoadedModel`]. Called from a blocking context.
pub trait ArtifactLoader: Send + Sync {
    /// Reads and validates the artifact, plus metrics when configured.
    ///
    /// Only artifact problems are errors; a bad metrics document is recorded
    /// in [`LoadedModel::metrics_error`].
    fn load(&self) -> Result<LoadedModel, ArtifactLoadError>;

    /// Human-readable description of where artifacts come from.
    fn describe(&self) -> String;
}

/// Loads a [`LinearTextArtifact`] and its metrics document from the filesystem.
#[derive(Debug, Clone)]
pub struct FsArtifactLoader {
    artifact_path: PathBuf,
    metrics_path: Option<PathBuf>,
}

impl FsArtifactLoader {
    /// Loader for `artifact_path` without metrics.
    #[must_use]
    pub fn new(artifact_path: impl Into<PathBuf>) -> Self {
        Self {
            artifact_path: artifact_path.into(),
            metrics_path: None,
        }
    }

    /// Also reads the metrics document at `path`.
    #[must_use]
    pub fn with_metrics(mut self, path: impl Into<PathBuf>) -> Self {
        self.metrics_path = Some(path.into());
        self
    }
}

impl ArtifactLoader for FsArtifactLoader {
    fn load(&self) -> Result<LoadedModel, ArtifactLoadError> {
        let artifact = LinearTextArtifact::load(&self.artifact_path)?;
        let mut model = LoadedModel::new(Arc::new(artifact), None);
        if let Some(path) = &self.metrics_path {
            match MetricsSnapshot::load_optional(path) {
                Ok(metrics) => model.metrics = metrics,
                Err(err) => model.metrics_error = Some(err.to_string()),
            }
        }
        Ok(model)
    }

    fn describe(&self) -> String {
        match &self.metrics_path {
            Some(metrics) => format!(
                "{} (metrics {})",
                self.artifact_path.display(),
                metrics.display()
            ),
            None => self.artifact_path.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::{fs, path::Path};
    use tempfile::tempdir;

    fn write_artifact(dir: &Path) -> PathBuf {
        let path = dir.join("linear_svc.json");
        let doc = json!({
            "format_version": 1,
            "name": "linear_svc",
            "intercept": -0.2,
            "weights": { "free": 1.5, "win": 1.2 }
        });
        fs::write(&path, doc.to_string()).unwrap();
        path
    }

    #[test]
    fn label_wire_names() {
        assert_eq!(serde_json::to_value(Label::Spam).unwrap(), json!("spam"));
        assert_eq!(Label::Ham.to_string(), "ham");
        assert!(Label::Spam.is_spam());
        assert!(!Label::Ham.is_spam());
    }

    #[test]
    fn loader_reads_artifact_and_metrics() {
        let dir = tempdir().unwrap();
        let artifact = write_artifact(dir.path());
        let metrics = dir.path().join("linear_svc_metrics.json");
        fs::write(
            &metrics,
            json!({
                "model": "linear_svc_v2",
                "accuracy": 0.99,
                "precision": 0.98,
                "recall": 0.97,
                "f1": 0.975,
                "roc_auc": 0.999
            })
            .to_string(),
        )
        .unwrap();

        let loaded = FsArtifactLoader::new(&artifact)
            .with_metrics(&metrics)
            .load()
            .unwrap();
        assert_eq!(loaded.artifact.name(), "linear_svc");
        assert_eq!(loaded.model_name(), "linear_svc_v2");
        assert_eq!(loaded.artifact.predict("WIN FREE stuff"), Label::Spam);
    }

    #[test]
    fn missing_metrics_file_is_tolerated() {
        let dir = tempdir().unwrap();
        let artifact = write_artifact(dir.path());
        let loaded = FsArtifactLoader::new(&artifact)
            .with_metrics(dir.path().join("absent.json"))
            .load()
            .unwrap();
        assert!(loaded.metrics.is_none());
        assert_eq!(loaded.model_name(), "linear_svc");
    }

    #[test]
    fn rejected_metrics_document_does_not_fail_the_load() {
        let dir = tempdir().unwrap();
        let artifact = write_artifact(dir.path());
        let metrics = dir.path().join("linear_svc_metrics.json");
        fs::write(&metrics, "{ truncated").unwrap();
        let loaded = FsArtifactLoader::new(&artifact)
            .with_metrics(&metrics)
            .load()
            .unwrap();
        assert!(loaded.metrics.is_none());
        assert!(loaded.metrics_error.unwrap().contains("linear_svc_metrics.json"));
        assert_eq!(loaded.artifact.predict("WIN FREE stuff"), Label::Spam);
    }

    #[test]
    fn missing_artifact_fails() {
        let dir = tempdir().unwrap();
        let err = FsArtifactLoader::new(dir.path().join("nope.json"))
            .load()
            .unwrap_err();
        assert!(matches!(err, ArtifactLoadError::NotFound { .. }));
    }
}
