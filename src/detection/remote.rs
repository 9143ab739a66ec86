//! Detector and classifier backed by an HTTP inference service.
//!
//! The service exposes, per model:
//! - `GET  {endpoint}/models/{model}` -> `{"names": [...]}` or `{"names": {"0": "person", ...}}`
//! - `POST {endpoint}/models/{model}/detect?conf=..&imgsz=..` (image bytes) -> `{"detections": [...]}`
//! - `POST {endpoint}/models/{model}/classify?labels=a,b` (PNG bytes) -> `{"probabilities": [...]}`
//! - `GET  {endpoint}/health`

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::{
    BoundingBox, Capability, DetectionError, DetectorLoader, InferenceParams, LabelVocabulary,
    ObjectDetector, RawDetection, ZeroShotClassifier,
};
use crate::config::DetectionConfig;

fn http_client(timeout: Duration) -> Result<reqwest::Client, DetectionError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

fn base_url(endpoint: &str) -> String {
    endpoint.trim_end_matches('/').to_string()
}

/// Build the detector loader. No endpoint means detection is unavailable.
pub fn detector_loader(config: &DetectionConfig) -> Capability<Arc<dyn DetectorLoader>> {
    let Some(endpoint) = config.endpoint.as_deref() else {
        return Capability::unavailable("no inference endpoint configured");
    };
    match http_client(Duration::from_secs(config.timeout_secs)) {
        Ok(client) => Capability::Available(Arc::new(HttpDetectorLoader {
            client,
            endpoint: base_url(endpoint),
        })),
        Err(e) => Capability::unavailable(format!("could not build HTTP client: {}", e)),
    }
}

/// Check the zero-shot classifier once; the result holds for the process lifetime.
pub async fn connect_classifier(config: &DetectionConfig) -> Capability<Arc<dyn ZeroShotClassifier>> {
    let fallback = &config.fallback;
    let Some(endpoint) = fallback.endpoint.as_deref() else {
        return Capability::unavailable("no classifier endpoint configured");
    };
    let client = match http_client(Duration::from_secs(config.timeout_secs)) {
        Ok(client) => client,
        Err(e) => return Capability::unavailable(format!("could not build HTTP client: {}", e)),
    };
    let endpoint = base_url(endpoint);

    let health = client
        .get(format!("{}/health", endpoint))
        .send()
        .await
        .and_then(|r| r.error_for_status());
    match health {
        Ok(_) => Capability::Available(Arc::new(HttpZeroShotClassifier {
            client,
            endpoint,
            model: fallback.model.clone(),
        })),
        Err(e) => Capability::unavailable(format!("classifier service unreachable: {}", e)),
    }
}

pub struct HttpDetectorLoader {
    client: reqwest::Client,
    endpoint: String,
}

#[async_trait]
impl DetectorLoader for HttpDetectorLoader {
    async fn load(&self, model: &str) -> Result<Arc<dyn ObjectDetector>, DetectionError> {
        let body: Value = self
            .client
            .get(format!("{}/models/{}", self.endpoint, model))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| DetectionError::Load {
                model: model.to_string(),
                reason: e.to_string(),
            })?
            .json()
            .await?;

        let labels = parse_vocabulary(&body).ok_or_else(|| DetectionError::Load {
            model: model.to_string(),
            reason: "response has no label names".into(),
        })?;

        Ok(Arc::new(HttpDetector {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            model: model.to_string(),
            labels,
        }))
    }
}

pub struct HttpDetector {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    labels: LabelVocabulary,
}

#[async_trait]
impl ObjectDetector for HttpDetector {
    fn model(&self) -> &str {
        &self.model
    }

    fn labels(&self) -> &LabelVocabulary {
        &self.labels
    }

    async fn detect(
        &self,
        image: &Path,
        params: &InferenceParams,
    ) -> Result<Vec<RawDetection>, DetectionError> {
        let bytes = tokio::fs::read(image)
            .await
            .map_err(|e| DetectionError::Inference(format!("cannot read {}: {}", image.display(), e)))?;
        let mime = mime_guess::from_path(image).first_or_octet_stream();

        let body: Value = self
            .client
            .post(format!("{}/models/{}/detect", self.endpoint, self.model))
            .query(&[
                ("conf", params.confidence.to_string()),
                ("imgsz", params.image_size.to_string()),
            ])
            .header(reqwest::header::CONTENT_TYPE, mime.as_ref())
            .body(bytes)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(parse_detections(&body, &self.labels))
    }
}

pub struct HttpZeroShotClassifier {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

#[async_trait]
impl ZeroShotClassifier for HttpZeroShotClassifier {
    async fn classify(
        &self,
        crop_png: Vec<u8>,
        candidates: &[String],
    ) -> Result<Vec<f32>, DetectionError> {
        let body: Value = self
            .client
            .post(format!("{}/models/{}/classify", self.endpoint, self.model))
            .query(&[("labels", candidates.join(","))])
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(crop_png)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let probs: Vec<f32> = body
            .get("probabilities")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_f64)
                    .map(|v| v as f32)
                    .collect()
            })
            .unwrap_or_default();

        if probs.len() != candidates.len() {
            return Err(DetectionError::Inference(format!(
                "expected {} probabilities, got {}",
                candidates.len(),
                probs.len()
            )));
        }
        Ok(probs)
    }
}

/// Label names come either as a list or as an index -> name map.
pub fn parse_vocabulary(body: &Value) -> Option<LabelVocabulary> {
    match body.get("names")? {
        Value::Array(names) => Some(LabelVocabulary::new(
            names.iter().filter_map(Value::as_str).map(str::to_string),
        )),
        Value::Object(map) => {
            // Class ids are dense; anything past the entry count is bogus.
            let mut indexed: Vec<(usize, String)> = map
                .iter()
                .filter_map(|(k, v)| Some((k.parse().ok()?, v.as_str()?.to_string())))
                .filter(|(i, _)| *i < map.len())
                .collect();
            indexed.sort_by_key(|(i, _)| *i);
            let len = indexed.last().map(|(i, _)| i + 1).unwrap_or(0);
            let mut names = vec![String::new(); len];
            for (i, name) in indexed {
                names[i] = name;
            }
            Some(LabelVocabulary::new(names))
        }
        _ => None,
    }
}

/// Entries without a resolvable label are dropped; a missing or malformed
/// box only clears `bbox`.
pub fn parse_detections(body: &Value, labels: &LabelVocabulary) -> Vec<RawDetection> {
    let Some(entries) = body.get("detections").and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let label = match entry.get("label").and_then(Value::as_str) {
                Some(label) => label.to_string(),
                None => {
                    let class_id = entry.get("class").and_then(Value::as_u64)? as usize;
                    labels
                        .name_for(class_id)
                        .map(str::to_string)
                        .unwrap_or_else(|| class_id.to_string())
                }
            };
            let confidence = entry
                .get("confidence")
                .or_else(|| entry.get("conf"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0) as f32;

            Some(RawDetection {
                label,
                confidence,
                bbox: parse_box(entry),
            })
        })
        .collect()
}

fn parse_box(entry: &Value) -> Option<BoundingBox> {
    box_from_xyxy(entry).or_else(|| box_from_corners(entry))
}

fn box_from_xyxy(entry: &Value) -> Option<BoundingBox> {
    let coords: Vec<f32> = entry
        .get("xyxy")?
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect::<Option<_>>()?;
    match coords.as_slice() {
        [x1, y1, x2, y2, ..] => Some(BoundingBox {
            x1: *x1,
            y1: *y1,
            x2: *x2,
            y2: *y2,
        }),
        _ => None,
    }
}

fn box_from_corners(entry: &Value) -> Option<BoundingBox> {
    let b = entry.get("box")?;
    let coord = |key: &str| b.get(key).and_then(Value::as_f64).map(|v| v as f32);
    Some(BoundingBox {
        x1: coord("x1")?,
        y1: coord("y1")?,
        x2: coord("x2")?,
        y2: coord("y2")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vocabulary_ignores_out_of_range_class_ids() {
        let vocab = parse_vocabulary(&json!({
            "names": { "0": "apple", "18446744073709551615": "x", "4000000000": "y" }
        }))
        .unwrap();
        assert_eq!(vocab.name_for(0), Some("apple"));
        assert!(vocab.len() <= 3);
        assert!(!vocab.contains("x"));
        assert!(!vocab.contains("y"));
    }

    #[test]
    fn vocabulary_from_list() {
        let vocab = parse_vocabulary(&json!({ "names": ["person", "bicycle", "apple"] })).unwrap();
        assert_eq!(vocab.name_for(2), Some("apple"));
    }

    #[test]
    fn vocabulary_from_index_map() {
        let vocab =
            parse_vocabulary(&json!({ "names": { "1": "bicycle", "0": "person", "47": "apple" } }))
                .unwrap();
        assert_eq!(vocab.len(), 48);
        assert_eq!(vocab.name_for(0), Some("person"));
        assert_eq!(vocab.name_for(47), Some("apple"));
        assert!(parse_vocabulary(&json!({ "classes": [] })).is_none());
    }

    #[test]
    fn detections_resolve_class_ids_and_both_box_shapes() {
        let labels = LabelVocabulary::new(["person", "apple"]);
        let body = json!({
            "detections": [
                { "class": 1, "confidence": 0.91, "xyxy": [1.0, 2.0, 30.0, 40.0] },
                { "label": "banana", "conf": 0.4, "box": { "x1": 5, "y1": 6, "x2": 7, "y2": 8 } },
                { "label": "cup", "confidence": 0.3 }
            ]
        });

        let parsed = parse_detections(&body, &labels);
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].label, "apple");
        assert!((parsed[0].confidence - 0.91).abs() < 1e-6);
        assert_eq!(
            parsed[0].bbox,
            Some(BoundingBox {
                x1: 1.0,
                y1: 2.0,
                x2: 30.0,
                y2: 40.0
            })
        );
        assert_eq!(parsed[1].label, "banana");
        assert_eq!(parsed[1].bbox.map(|b| b.x2), Some(7.0));
        assert_eq!(parsed[2].bbox, None);
    }

    #[test]
    fn malformed_box_keeps_detection() {
        let labels = LabelVocabulary::default();
        let body = json!({
            "detections": [ { "label": "apple", "confidence": 0.8, "xyxy": [1, "x", 3] } ]
        });
        let parsed = parse_detections(&body, &labels);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].bbox, None);
    }

    #[test]
    fn entries_without_label_or_class_are_dropped() {
        let labels = LabelVocabulary::default();
        let body = json!({ "detections": [ { "confidence": 0.8 } ] });
        assert!(parse_detections(&body, &labels).is_empty());
        assert!(parse_detections(&json!({}), &labels).is_empty());
    }

    #[test]
    fn loader_is_unavailable_without_endpoint() {
        let config = DetectionConfig::default();
        assert!(!detector_loader(&config).is_available());
    }

    #[tokio::test]
    async fn classifier_is_unavailable_without_endpoint() {
        let config = DetectionConfig::default();
        assert!(!connect_classifier(&config).await.is_available());
    }
}
