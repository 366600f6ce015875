//! Remote classification client
//!
//! Posts the base64-encoded upload to a hosted workflow endpoint and reduces
//! its loosely structured JSON answer to a `RawPrediction`.

use crate::config::RemoteConfig;
use crate::error::RemoteError;
use crate::normalize::{sort_descending, RawPrediction, ScoredLabel};
use crate::preprocess::SourceImage;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, warn};

type Result<T> = std::result::Result<T, RemoteError>;

/// Longest slice of an error body kept in `RemoteError::Status`
const MAX_ERROR_BODY: usize = 512;

pub struct RemoteClassifier {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl RemoteClassifier {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Classify an image file
    pub async fn classify(&self, image_path: &Path) -> Result<RawPrediction> {
        // Credential check precedes any I/O
        if !self.is_configured() {
            return Err(RemoteError::NotConfigured);
        }
        let bytes = tokio::fs::read(image_path).await?;
        self.classify_bytes(&bytes).await
    }

    /// Classify an image that was already read for this request
    pub async fn classify_image(&self, image: &SourceImage) -> Result<RawPrediction> {
        self.classify_bytes(image.bytes()).await
    }

    async fn classify_bytes(&self, bytes: &[u8]) -> Result<RawPrediction> {
        let api_key = self.api_key.as_deref().ok_or(RemoteError::NotConfigured)?;

        let start = Instant::now();
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        let body = json!({
            "api_key": api_key,
            "inputs": {
                "image": {
                    "type": "base64",
                    "value": encoded,
                }
            }
        });

        let response = self.client.post(&self.endpoint).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body: String = text.chars().take(MAX_ERROR_BODY).collect();
            warn!(status = status.as_u16(), body = %body, "Remote classifier rejected request");
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| RemoteError::Malformed(e.to_string()))?;

        let prediction = parse_payload(&payload)?;
        debug!(
            label = ?prediction.label,
            score = prediction.score,
            latency_ms = start.elapsed().as_millis() as u64,
            "Remote classification completed"
        );
        Ok(prediction)
    }
}

/// One prediction object; each field has two accepted spellings
#[derive(Debug, Default, Deserialize)]
struct WirePrediction {
    #[serde(default)]
    class: Option<String>,
    #[serde(default)]
    predicted_class: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    score: Option<f64>,
}

impl WirePrediction {
    fn label(&self) -> String {
        self.class
            .clone()
            .or_else(|| self.predicted_class.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn score(&self) -> f32 {
        let raw = self.confidence.or(self.score).unwrap_or(0.0);
        if raw.is_finite() {
            (raw as f32).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

fn has_class_field(object: &serde_json::Map<String, Value>) -> bool {
    object.contains_key("class") || object.contains_key("predicted_class")
}

/// Reduce a response body to a `RawPrediction`.
///
/// Predictions may sit at the top level (list or single object) or under
/// `outputs` / `predictions`. An empty set is a valid "nothing found" answer.
pub(crate) fn parse_payload(payload: &Value) -> Result<RawPrediction> {
    let predictions = collect_predictions(payload)?;

    if predictions.is_empty() {
        return Ok(RawPrediction::empty(Some("healthy".to_string())));
    }

    let mut candidates: Vec<ScoredLabel> = predictions
        .iter()
        .map(|p| ScoredLabel {
            label: p.label(),
            score: p.score(),
        })
        .collect();

    // The service lists its chosen prediction first
    let primary = candidates[0].clone();
    sort_descending(&mut candidates);

    Ok(RawPrediction {
        detected: true,
        label: Some(primary.label),
        score: primary.score,
        candidates,
    })
}

fn collect_predictions(payload: &Value) -> Result<Vec<WirePrediction>> {
    match payload {
        Value::Array(items) => items.iter().map(expand_item).collect::<Result<Vec<_>>>().map(flatten),
        Value::Object(object) => {
            let nested = ["outputs", "predictions"]
                .iter()
                .filter_map(|key| object.get(*key))
                .find(|v| !v.is_null());
            match nested {
                Some(Value::Array(items)) => {
                    items.iter().map(expand_item).collect::<Result<Vec<_>>>().map(flatten)
                }
                Some(single @ Value::Object(_)) => expand_item(single),
                Some(other) => Err(RemoteError::Malformed(format!(
                    "Unexpected predictions value: {}",
                    other
                ))),
                None if has_class_field(object) => Ok(vec![decode_prediction(payload)?]),
                None => Ok(Vec::new()),
            }
        }
        other => Err(RemoteError::Malformed(format!(
            "Expected a JSON object or array, got: {}",
            other
        ))),
    }
}

/// Decode one list element. Workflow output blocks without a class field
/// are unwrapped one level through their `predictions` key.
fn expand_item(item: &Value) -> Result<Vec<WirePrediction>> {
    let object = item
        .as_object()
        .ok_or_else(|| RemoteError::Malformed(format!("Prediction is not an object: {}", item)))?;

    if !has_class_field(object) {
        match object.get("predictions") {
            Some(Value::Array(inner)) => {
                return inner.iter().map(decode_prediction).collect();
            }
            Some(inner @ Value::Object(_)) => return Ok(vec![decode_prediction(inner)?]),
            _ => {}
        }
    }
    Ok(vec![decode_prediction(item)?])
}

fn decode_prediction(item: &Value) -> Result<WirePrediction> {
    WirePrediction::deserialize(item).map_err(|e| RemoteError::Malformed(e.to_string()))
}

fn flatten(groups: Vec<Vec<WirePrediction>>) -> Vec<WirePrediction> {
    groups.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_with_class_and_confidence() {
        let payload = json!([{"class": "Early Blight", "confidence": 0.91}]);
        let raw = parse_payload(&payload).unwrap();
        assert!(raw.detected);
        assert_eq!(raw.label.as_deref(), Some("Early Blight"));
        assert!((raw.score - 0.91).abs() < 1e-6);
    }

    #[test]
    fn test_parse_single_object_alternate_fields() {
        let payload = json!({"predicted_class": "late blight", "score": 0.42});
        let raw = parse_payload(&payload).unwrap();
        assert_eq!(raw.label.as_deref(), Some("late blight"));
        assert!((raw.score - 0.42).abs() < 1e-6);
    }

    #[test]
    fn test_parse_outputs_and_predictions_envelopes() {
        let payload = json!({"outputs": [
            {"class": "leaf_curl", "confidence": 0.2},
            {"class": "powdery_mildew", "confidence": 0.8}
        ]});
        let raw = parse_payload(&payload).unwrap();
        assert_eq!(raw.label.as_deref(), Some("leaf_curl"));
        assert!((raw.score - 0.2).abs() < 1e-6);
        assert_eq!(raw.candidates.len(), 2);
        assert_eq!(raw.candidates[0].label, "powdery_mildew");
        assert_eq!(raw.candidates[1].label, "leaf_curl");

        let payload = json!({"predictions": {"class": "bacterial_spot", "confidence": 0.66}});
        let raw = parse_payload(&payload).unwrap();
        assert_eq!(raw.label.as_deref(), Some("bacterial_spot"));
    }

    #[test]
    fn test_first_listed_prediction_is_primary() {
        let payload = json!([
            {"class": "Late Blight", "confidence": 0.35},
            {"class": "Early Blight", "confidence": 0.9},
            {"class": "healthy", "confidence": 0.6}
        ]);
        let raw = parse_payload(&payload).unwrap();
        assert_eq!(raw.label.as_deref(), Some("Late Blight"));
        assert!((raw.score - 0.35).abs() < 1e-6);
        let order: Vec<_> = raw.candidates.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(order, vec!["Early Blight", "healthy", "Late Blight"]);

        let record = crate::normalize::into_record(
            raw,
            crate::normalize::InferenceSource::Online,
            crate::disease::Language::En,
        );
        assert_eq!(record.disease_class, crate::disease::DiseaseClass::LateBlight);
        assert!((record.confidence_percent - 35.0).abs() < 1e-3);
        assert_eq!(record.top_predictions[0].class, crate::disease::DiseaseClass::EarlyBlight);
    }

    #[test]
    fn test_parse_workflow_output_blocks() {
        let payload = json!({"outputs": [
            {"predictions": [{"class": "early_blight", "confidence": 0.7}]}
        ]});
        let raw = parse_payload(&payload).unwrap();
        assert_eq!(raw.label.as_deref(), Some("early_blight"));
    }

    #[test]
    fn test_parse_empty_is_not_detected_healthy() {
        for payload in [json!([]), json!({"outputs": []}), json!({"time": 0.2})] {
            let raw = parse_payload(&payload).unwrap();
            assert!(!raw.detected);
            assert_eq!(raw.label.as_deref(), Some("healthy"));
            assert_eq!(raw.score, 0.0);
        }
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            parse_payload(&json!("oops")),
            Err(RemoteError::Malformed(_))
        ));
        assert!(matches!(
            parse_payload(&json!([1, 2])),
            Err(RemoteError::Malformed(_))
        ));
        assert!(matches!(
            parse_payload(&json!({"predictions": 3})),
            Err(RemoteError::Malformed(_))
        ));
        assert!(matches!(
            parse_payload(&json!([{"class": 5}])),
            Err(RemoteError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_fields_default() {
        let raw = parse_payload(&json!([{"confidence": 0.5}])).unwrap();
        assert_eq!(raw.label.as_deref(), Some("unknown"));
        let raw = parse_payload(&json!([{"class": "healthy"}])).unwrap();
        assert!(raw.detected);
        assert_eq!(raw.score, 0.0);
    }

    #[tokio::test]
    async fn test_not_configured_fails_before_io() {
        let classifier = RemoteClassifier::new(&RemoteConfig::default()).unwrap();
        assert!(!classifier.is_configured());
        // The path does not exist; NotConfigured proves no read was attempted
        let err = classifier
            .classify(Path::new("/no/such/upload.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotConfigured));
    }
}
