//! Serving-side scorer for linear weights exported by the training job.
//!
//! Features are the distinct n-grams of the message (binary, l2-normalised);
//! the margin is `intercept + Σ w(term) / sqrt(#terms)`.

use std::{collections::HashMap, collections::HashSet, fs, path::Path, sync::OnceLock};

use regex::Regex;
use serde::Deserialize;

use crate::{
    artifact::{ClassifierArtifact, Label},
    error::ArtifactLoadError,
};

const SUPPORTED_FORMAT: u32 = 1;
const MAX_NGRAM: usize = 3;

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?u)\b\w\w+\b").expect("static token pattern"))
}

#[derive(Debug, Deserialize)]
struct LinearArtifactDocument {
    format_version: u32,
    name: String,
    intercept: f64,
    #[serde(default = "default_ngram_range")]
    ngram_range: (usize, usize),
    #[serde(default = "default_lowercase")]
    lowercase: bool,
    weights: HashMap<String, f64>,
}

const fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

const fn default_lowercase() -> bool {
    true
}

/// Linear text classifier over a term-weight table.
#[derive(Debug, Clone)]
pub struct LinearTextArtifact {
    name: String,
    intercept: f64,
    ngram_range: (usize, usize),
    lowercase: bool,
    weights: HashMap<String, f64>,
}

impl LinearTextArtifact {
    /// Builds an artifact directly; used by tooling and tests.
    ///
    /// Returns `None` when the n-gram range is empty, starts at zero, or any
    /// coefficient is not finite.
    #[must_use]
    pub fn from_parts(
        name: impl Into<String>,
        intercept: f64,
        ngram_range: (usize, usize),
        weights: HashMap<String, f64>,
    ) -> Option<Self> {
        let artifact = Self {
            name: name.into(),
            intercept,
            ngram_range,
            lowercase: true,
            weights,
        };
        artifact.validate().ok().map(|()| artifact)
    }

    /// Reads and validates an exported artifact document.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactLoadError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|err| ArtifactLoadError::from_io(path, err))?;
        let doc: LinearArtifactDocument =
            serde_json::from_str(&raw).map_err(|source| ArtifactLoadError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if doc.format_version != SUPPORTED_FORMAT {
            return Err(ArtifactLoadError::invalid(
                path,
                format!(
                    "unsupported format_version {} (expected {SUPPORTED_FORMAT})",
                    doc.format_version
                ),
            ));
        }
        let artifact = Self {
            name: doc.name,
            intercept: doc.intercept,
            ngram_range: doc.ngram_range,
            lowercase: doc.lowercase,
            weights: doc.weights,
        };
        artifact
            .validate()
            .map_err(|reason| ArtifactLoadError::invalid(path, reason))?;
        Ok(artifact)
    }

    fn validate(&self) -> Result<(), String> {
        let (min, max) = self.ngram_range;
        if min == 0 || min > max || max > MAX_NGRAM {
            return Err(format!(
                "ngram_range ({min}, {max}) must satisfy 1 <= min <= max <= {MAX_NGRAM}"
            ));
        }
        if self.name.trim().is_empty() {
            return Err("name must not be empty".into());
        }
        if !self.intercept.is_finite() {
            return Err("intercept is not finite".into());
        }
        if let Some((term, _)) = self.weights.iter().find(|(_, w)| !w.is_finite()) {
            return Err(format!("weight for `{term}` is not finite"));
        }
        Ok(())
    }

    /// Number of terms with a coefficient.
    #[must_use]
    pub fn term_count(&self) -> usize {
        self.weights.len()
    }

    /// Inclusive n-gram bounds.
    #[must_use]
    pub const fn ngram_range(&self) -> (usize, usize) {
        self.ngram_range
    }

    /// Bias term.
    #[must_use]
    pub const fn intercept(&self) -> f64 {
        self.intercept
    }

    fn terms(&self, text: &str) -> HashSet<String> {
        let normalised;
        let text = if self.lowercase {
            normalised = text.to_lowercase();
            normalised.as_str()
        } else {
            text
        };
        let tokens: Vec<&str> = token_pattern().find_iter(text).map(|m| m.as_str()).collect();
        let (min, max) = self.ngram_range;
        let mut terms = HashSet::new();
        for n in min..=max {
            for window in tokens.windows(n) {
                terms.insert(window.join(" "));
            }
        }
        terms
    }
}

impl ClassifierArtifact for LinearTextArtifact {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, text: &str) -> Label {
        if self.decision_score(text) > 0.0 {
            Label::Spam
        } else {
            Label::Ham
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn decision_score(&self, text: &str) -> f64 {
        let terms = self.terms(text);
        if terms.is_empty() {
            return self.intercept;
        }
        let total: f64 = terms
            .iter()
            .filter_map(|term| self.weights.get(term))
            .sum();
        self.intercept + total / (terms.len() as f64).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn artifact() -> LinearTextArtifact {
        let weights = HashMap::from([
            ("win".to_string(), 1.4),
            ("free".to_string(), 1.6),
            ("free money".to_string(), 0.9),
            ("meeting".to_string(), -1.2),
            ("report".to_string(), -0.8),
        ]);
        LinearTextArtifact::from_parts("linear_svc", -0.3, (1, 2), weights).unwrap()
    }

    #[test]
    fn spammy_text_scores_positive() {
        let model = artifact();
        assert_eq!(model.predict("WIN FREE MONEY NOW!!!"), Label::Spam);
        assert!(model.decision_score("WIN FREE MONEY NOW!!!") > 0.0);
    }

    #[test]
    fn ordinary_text_scores_negative() {
        let model = artifact();
        assert_eq!(model.predict("Meeting at 3pm tomorrow"), Label::Ham);
        assert_eq!(model.predict("Can you send me the report?"), Label::Ham);
    }

    #[test]
    fn empty_text_falls_back_to_intercept() {
        let model = artifact();
        assert!((model.decision_score("") - -0.3).abs() < 1e-12);
        assert!((model.decision_score("!! ?") - -0.3).abs() < 1e-12);
        assert_eq!(model.predict(""), Label::Ham);
    }

    #[test]
    fn repeated_tokens_count_once() {
        let model = artifact();
        assert!(
            (model.decision_score("free") - model.decision_score("free free free")).abs() < 1e-12
        );
    }

    #[test]
    fn rejects_bad_ngram_range() {
        assert!(LinearTextArtifact::from_parts("m", 0.0, (2, 1), HashMap::new()).is_none());
        assert!(LinearTextArtifact::from_parts("m", 0.0, (0, 1), HashMap::new()).is_none());
    }

    #[test]
    fn load_rejects_unknown_format_and_non_finite_weights() {
        let dir = tempdir().unwrap();
        let future = dir.path().join("future.json");
        fs::write(
            &future,
            json!({"format_version": 9, "name": "m", "intercept": 0.0, "weights": {}}).to_string(),
        )
        .unwrap();
        assert!(matches!(
            LinearTextArtifact::load(&future),
            Err(ArtifactLoadError::Invalid { .. })
        ));

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{ not json").unwrap();
        assert!(matches!(
            LinearTextArtifact::load(&corrupt),
            Err(ArtifactLoadError::Parse { .. })
        ));
    }

    #[test]
    fn load_honours_document_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cased.json");
        fs::write(
            &path,
            json!({
                "format_version": 1,
                "name": "cased",
                "intercept": 0.0,
                "lowercase": false,
                "ngram_range": [1, 1],
                "weights": {"FREE": 2.0}
            })
            .to_string(),
        )
        .unwrap();
        let model = LinearTextArtifact::load(&path).unwrap();
        assert_eq!(model.term_count(), 1);
        assert_eq!(model.predict("FREE"), Label::Spam);
        assert_eq!(model.predict("free"), Label::Ham);
    }
}
