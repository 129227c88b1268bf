use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::ArtifactLoadError;

/// Offline evaluation metrics written next to the artifact by the training job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Declared model name.
    pub model: String,
    /// Test-set accuracy.
    pub accuracy: f64,
    /// Precision for the spam class.
    pub precision: f64,
    /// Recall for the spam class.
    pub recall: f64,
    /// F1 for the spam class.
    pub f1: f64,
    /// Area under the ROC curve; null when the model exposed no scores.
    #[serde(default)]
    pub roc_auc: Option<f64>,
    /// Row-major confusion matrix `[[tn, fp], [fn, tp]]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confusion_matrix: Option<Vec<Vec<u64>>>,
}

impl MetricsSnapshot {
    /// Reads the document at `path`. A missing file yields `Ok(None)`.
    pub fn load_optional(path: impl AsRef<Path>) -> Result<Option<Self>, ArtifactLoadError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(raw) => {
                let snapshot: Self =
                    serde_json::from_str(&raw).map_err(|source| ArtifactLoadError::Parse {
                        path: path.to_path_buf(),
                        source,
                    })?;
                snapshot.validate(path)?;
                Ok(Some(snapshot))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(ArtifactLoadError::from_io(path, err)),
        }
    }

    fn validate(&self, path: &Path) -> Result<(), ArtifactLoadError> {
        let scores = [
            ("accuracy", Some(self.accuracy)),
            ("precision", Some(self.precision)),
            ("recall", Some(self.recall)),
            ("f1", Some(self.f1)),
            ("roc_auc", self.roc_auc),
        ];
        for (field, value) in scores {
            if let Some(value) = value {
                if !(0.0..=1.0).contains(&value) {
                    return Err(ArtifactLoadError::invalid(
                        path,
                        format!("{field} = {value} is outside [0, 1]"),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn reads_training_output_with_null_auc() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("multinomial_nb_metrics.json");
        fs::write(
            &path,
            json!({
                "model": "multinomial_nb",
                "accuracy": 0.98,
                "precision": 0.97,
                "recall": 0.9,
                "f1": 0.93,
                "roc_auc": null,
                "confusion_matrix": [[960, 5], [14, 136]]
            })
            .to_string(),
        )
        .unwrap();
        let snapshot = MetricsSnapshot::load_optional(&path).unwrap().unwrap();
        assert_eq!(snapshot.model, "multinomial_nb");
        assert!(snapshot.roc_auc.is_none());
        assert_eq!(snapshot.confusion_matrix.unwrap()[1][1], 136);
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempdir().unwrap();
        assert!(MetricsSnapshot::load_optional(dir.path().join("absent.json"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn out_of_range_score_is_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(
            &path,
            json!({"model": "m", "accuracy": 1.5, "precision": 1.0, "recall": 1.0, "f1": 1.0})
                .to_string(),
        )
        .unwrap();
        assert!(matches!(
            MetricsSnapshot::load_optional(&path),
            Err(ArtifactLoadError::Invalid { .. })
        ));
    }
}
