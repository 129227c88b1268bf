use serde::Serialize;

use crate::artifact::Label;

/// Margin that maps to full confidence above the 0.5 floor.
pub const CONFIDENCE_SCALE: f64 = 4.0;

/// Saturating map from a raw margin to `[0, 1]`: `0.5 + |score| / K`, capped.
///
/// NaN margins carry no information and map to 0.5; infinite ones saturate.
#[must_use]
pub fn confidence_from_score(score: f64) -> f64 {
    if score.is_nan() {
        return 0.5;
    }
    (0.5 + score.abs() / CONFIDENCE_SCALE).clamp(0.0, 1.0)
}

/// Classification of one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    /// Predicted class.
    #[serde(rename = "prediction")]
    pub label: Label,
    /// `label == spam`.
    pub is_spam: bool,
    /// Saturated margin in `[0, 1]`.
    pub confidence: f64,
    /// Input message, echoed back.
    pub message: String,
}

impl PredictionResult {
    /// Builds a result, deriving `is_spam` and `confidence`.
    #[must_use]
    pub fn new(message: impl Into<String>, label: Label, score: f64) -> Self {
        Self {
            label,
            is_spam: label.is_spam(),
            confidence: confidence_from_score(score),
            message: message.into(),
        }
    }
}

/// Ordered results of a batch plus per-class totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchPrediction {
    /// Results in input order.
    pub predictions: Vec<PredictionResult>,
    /// Number of messages classified.
    pub total: usize,
    /// Messages labelled spam.
    pub spam_count: usize,
    /// Messages labelled ham.
    pub ham_count: usize,
}

impl BatchPrediction {
    /// Tallies `predictions`, keeping their order.
    #[must_use]
    pub fn from_results(predictions: Vec<PredictionResult>) -> Self {
        let spam_count = predictions.iter().filter(|p| p.is_spam).count();
        let total = predictions.len();
        Self {
            predictions,
            total,
            spam_count,
            ham_count: total - spam_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_bounded_for_any_margin() {
        for score in [
            0.0,
            -0.0,
            0.6,
            -0.6,
            1.9,
            -250.0,
            f64::MAX,
            f64::MIN,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NAN,
        ] {
            let c = confidence_from_score(score);
            assert!((0.0..=1.0).contains(&c), "score {score} gave {c}");
        }
    }

    #[test]
    fn confidence_is_symmetric_and_monotonic_in_magnitude() {
        assert!((confidence_from_score(0.6) - 0.65).abs() < 1e-9);
        assert!((confidence_from_score(-0.6) - 0.65).abs() < 1e-9);
        assert!(confidence_from_score(0.2) < confidence_from_score(0.4));
        assert!((confidence_from_score(0.0) - 0.5).abs() < f64::EPSILON);
        assert!((confidence_from_score(3.0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn result_keeps_label_and_flag_in_sync() {
        let spam = PredictionResult::new("WIN", Label::Spam, 1.0);
        assert!(spam.is_spam);
        let ham = PredictionResult::new("hi", Label::Ham, -1.0);
        assert!(!ham.is_spam);
        let json = serde_json::to_value(&spam).unwrap();
        assert_eq!(json["prediction"], "spam");
        assert_eq!(json["is_spam"], true);
    }

    #[test]
    fn empty_batch_tallies_to_zero() {
        let batch = BatchPrediction::from_results(Vec::new());
        assert_eq!(batch.total, 0);
        assert_eq!(batch.spam_count, 0);
        assert_eq!(batch.ham_count, 0);
    }
}
