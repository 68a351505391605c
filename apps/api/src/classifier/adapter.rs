//! Confidence-threshold and fallback policy around a `TextClassifier`.
//!
//! The adapter never fails: transport errors, missing credentials and
//! unrecognised response shapes all become the fallback classification, and a
//! score below the threshold routes to `instant` so nothing is silently
//! suppressed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::classifier::{ClassifierError, TextClassifier};
use crate::models::notification::Zone;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.55;
pub const FALLBACK_MODEL_ID: &str = "fallback";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub zone: Zone,
    pub confidence: f64,
    pub model_id: String,
    pub fallback_used: bool,
}

impl Classification {
    /// Result used whenever the classifier could not be consulted.
    pub fn fallback() -> Self {
        Self {
            zone: Zone::Instant,
            confidence: 0.0,
            model_id: FALLBACK_MODEL_ID.to_string(),
            fallback_used: true,
        }
    }
}

#[derive(Clone)]
pub struct ClassifierAdapter {
    backend: Arc<dyn TextClassifier>,
    threshold: f64,
}

impl ClassifierAdapter {
    pub fn new(backend: Arc<dyn TextClassifier>, threshold: f64) -> Self {
        Self {
            backend,
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub async fn classify(&self, text: &str) -> Classification {
        let labels = Zone::ALL.map(|z| z.as_str());
        let scored = match self.backend.classify_raw(text, &labels).await {
            Ok(body) => top_label(&body),
            Err(e) => Err(e),
        };

        let (zone, confidence) = match scored {
            Ok(top) => top,
            Err(e) => {
                warn!("Classifier unavailable, using fallback: {e}");
                return Classification::fallback();
            }
        };

        let model_id = self.backend.model_id().to_string();
        if confidence < self.threshold {
            debug!(
                "Confidence {confidence:.2} for '{zone}' below threshold {:.2}, routing to instant",
                self.threshold
            );
            return Classification {
                zone: Zone::Instant,
                confidence,
                model_id,
                fallback_used: true,
            };
        }

        Classification {
            zone,
            confidence,
            model_id,
            fallback_used: false,
        }
    }
}

/// Extracts the top-scoring zone from either supported response shape:
/// a list of `{label, score}` pairs, or parallel `{labels, scores}` arrays
/// sorted best first.
fn top_label(body: &Value) -> Result<(Zone, f64), ClassifierError> {
    let (label, score) = match body {
        Value::Array(pairs) => pairs
            .iter()
            .map(|pair| {
                let label = pair.get("label").and_then(Value::as_str);
                let score = pair.get("score").and_then(Value::as_f64);
                label.zip(score).ok_or_else(|| {
                    ClassifierError::MalformedResponse("pair without label/score".to_string())
                })
            })
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or_else(|| ClassifierError::MalformedResponse("empty label list".to_string()))?,
        Value::Object(_) => {
            let label = body
                .get("labels")
                .and_then(Value::as_array)
                .and_then(|l| l.first())
                .and_then(Value::as_str);
            let score = body
                .get("scores")
                .and_then(Value::as_array)
                .and_then(|s| s.first())
                .and_then(Value::as_f64);
            label.zip(score).ok_or_else(|| {
                ClassifierError::MalformedResponse("missing labels/scores arrays".to_string())
            })?
        }
        other => {
            return Err(ClassifierError::MalformedResponse(format!(
                "unexpected response type: {other}"
            )))
        }
    };

    let zone = Zone::from_label(label)
        .ok_or_else(|| ClassifierError::MalformedResponse(format!("unknown label '{label}'")))?;
    if !score.is_finite() {
        return Err(ClassifierError::MalformedResponse(
            "non-finite score".to_string(),
        ));
    }
    Ok((zone, score.clamp(0.0, 1.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubClassifier;
    use serde_json::json;

    fn adapter(stub: StubClassifier) -> ClassifierAdapter {
        ClassifierAdapter::new(Arc::new(stub), DEFAULT_CONFIDENCE_THRESHOLD)
    }

    #[tokio::test]
    async fn test_confident_label_is_kept() {
        let a = adapter(StubClassifier::pairs(&[("batch", 0.91), ("instant", 0.05)]));
        let c = a.classify("Newsletter: weekly club digest").await;
        assert_eq!(c.zone, Zone::Batch);
        assert_eq!(c.confidence, 0.91);
        assert!(!c.fallback_used);
        assert_eq!(c.model_id, "stub-model");
    }

    #[tokio::test]
    async fn test_low_confidence_forces_instant() {
        let a = adapter(StubClassifier::pairs(&[("scheduled", 0.40), ("batch", 0.35)]));
        let c = a.classify("URGENT: exam moved to tomorrow").await;
        assert_eq!(c.zone, Zone::Instant);
        assert_eq!(c.confidence, 0.40);
        assert!(c.fallback_used);
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive() {
        let a = adapter(StubClassifier::pairs(&[("scheduled", 0.55)]));
        let c = a.classify("Office hours on Thursday").await;
        assert_eq!(c.zone, Zone::Scheduled);
        assert!(!c.fallback_used);
    }

    #[tokio::test]
    async fn test_parallel_array_shape_uses_first_entry() {
        let a = adapter(StubClassifier::body(json!({
            "sequence": "Assignment 3 due Friday",
            "labels": ["Scheduled", "instant", "batch"],
            "scores": [0.8, 0.15, 0.05]
        })));
        let c = a.classify("Assignment 3 due Friday").await;
        assert_eq!(c.zone, Zone::Scheduled);
        assert_eq!(c.confidence, 0.8);
    }

    #[tokio::test]
    async fn test_pair_list_picks_max_regardless_of_order() {
        let stub = StubClassifier::pairs(&[("batch", 0.1), ("INSTANT", 0.7), ("scheduled", 0.2)]);
        let a = adapter(stub);
        let c = a.classify("Server is down").await;
        assert_eq!(c.zone, Zone::Instant);
        assert_eq!(c.confidence, 0.7);
        assert!(!c.fallback_used);
    }

    #[tokio::test]
    async fn test_transport_failure_returns_fallback() {
        let a = adapter(StubClassifier::failing());
        assert_eq!(a.classify("anything").await, Classification::fallback());
    }

    #[tokio::test]
    async fn test_unknown_shape_returns_fallback() {
        for body in [
            json!("instant"),
            json!([]),
            json!({"label": "instant"}),
            json!([{"label": "later", "score": 0.9}]),
            json!({"labels": [], "scores": []}),
        ] {
            let a = adapter(StubClassifier::body(body));
            assert_eq!(a.classify("text").await, Classification::fallback());
        }
    }

    #[test]
    fn test_fallback_shape() {
        let f = Classification::fallback();
        assert_eq!(f.zone, Zone::Instant);
        assert_eq!(f.confidence, 0.0);
        assert_eq!(f.model_id, "fallback");
        assert!(f.fallback_used);
    }
}
