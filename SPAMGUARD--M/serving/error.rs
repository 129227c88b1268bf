use std::{path::PathBuf, time::Duration};

use thiserror::Error;

/// Failures while reading an artifact or metrics document from disk.
#[derive(Debug, Error)]
pub enum ArtifactLoadError {
    /// File does not exist.
    #[error("artifact not found at {path}; train a model and export it there first")]
    NotFound {
        /// Missing path.
        path: PathBuf,
    },
    /// File exists but could not be read.
    #[error("reading {path}: {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// File is not valid JSON for the expected document.
    #[error("parsing {path}: {source}")]
    Parse {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// Document parsed but violates a structural constraint.
    #[error("invalid artifact {path}: {reason}")]
    Invalid {
        /// Offending path.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },
    /// Load did not finish within the configured bound.
    #[error("artifact load exceeded {0:?}")]
    Timeout(Duration),
    /// Blocking load task panicked or was cancelled.
    #[error("artifact load task aborted: {0}")]
    Aborted(String),
}

impl ArtifactLoadError {
    pub(crate) fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    pub(crate) fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced to callers of the model service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Classification requested while the model is not ready.
    #[error("model service unavailable ({state}): {reason}")]
    ServiceUnavailable {
        /// State label at the time of the call.
        state: &'static str,
        /// Explanation, including the load failure if there was one.
        reason: String,
    },
    /// Caller-supplied input failed a shape check.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Explicit load or reload failed.
    #[error("artifact load failed: {0}")]
    ArtifactLoad(#[from] ArtifactLoadError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_maps_to_not_found() {
        let err = ArtifactLoadError::from_io(
            "models/linear_svc.json",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(matches!(err, ArtifactLoadError::NotFound { .. }));
        assert!(err.to_string().contains("models/linear_svc.json"));
    }

    #[test]
    fn unavailable_is_distinct_from_invalid_input() {
        let unavailable = ServiceError::ServiceUnavailable {
            state: "failed",
            reason: "boom".into(),
        };
        assert!(unavailable.to_string().contains("(failed)"));
        let invalid = ServiceError::InvalidInput("not a string".into());
        assert!(!matches!(invalid, ServiceError::ServiceUnavailable { .. }));
    }
}
