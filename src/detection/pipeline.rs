use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{
    crop_png, draw_boxes, remote, BoundingBox, Capability, Detection, DetectionError,
    InferenceParams, ModelRegistry, RawDetection, ZeroShotClassifier,
};
use crate::config::DetectionConfig;

/// Settings for the zero-shot relabelling pass.
#[derive(Debug, Clone)]
pub struct FallbackParams {
    pub target_label: String,
    pub threshold: f32,
    pub crop_size: u32,
    pub candidates: Vec<String>,
}

impl Default for FallbackParams {
    fn default() -> Self {
        Self {
            target_label: "avocado".to_string(),
            threshold: 0.35,
            crop_size: 224,
            candidates: [
                "avocado", "apple", "banana", "orange", "rice", "bread", "pasta", "egg", "tofu",
                "cheese",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Detected {
        detections: Vec<Detection>,
        annotated: Option<PathBuf>,
    },
    /// Nothing usable came back. `reason` is shown to the user.
    NoDetections { reason: String },
}

pub struct DetectionPipeline {
    registry: Arc<ModelRegistry>,
    model: String,
    params: InferenceParams,
    fallback: Capability<Arc<dyn ZeroShotClassifier>>,
    fallback_params: FallbackParams,
}

impl DetectionPipeline {
    pub fn new(
        registry: Arc<ModelRegistry>,
        model: impl Into<String>,
        params: InferenceParams,
        fallback: Capability<Arc<dyn ZeroShotClassifier>>,
        fallback_params: FallbackParams,
    ) -> Self {
        Self {
            registry,
            model: model.into(),
            params,
            fallback,
            fallback_params,
        }
    }

    /// A pipeline with neither detector nor classifier.
    pub fn unavailable(reason: &str) -> Self {
        Self::new(
            Arc::new(ModelRegistry::new(Capability::unavailable(reason))),
            "yolov8n",
            InferenceParams::default(),
            Capability::unavailable(reason),
            FallbackParams::default(),
        )
    }

    /// Wire the HTTP backends from config and warm the default model.
    /// Missing collaborators are logged once here and never fail startup.
    pub async fn from_config(config: &DetectionConfig) -> Self {
        let registry = Arc::new(ModelRegistry::new(remote::detector_loader(config)));
        if registry.is_available() {
            if let Err(e) = registry.get_or_load(&config.model).await {
                tracing::warn!("Could not preload {}: {}", config.model, e);
            }
        }

        let fallback = remote::connect_classifier(config).await;
        let pipeline = Self::new(
            registry,
            config.model.clone(),
            InferenceParams {
                confidence: config.confidence,
                image_size: config.image_size,
            },
            fallback,
            FallbackParams {
                target_label: config.fallback.target_label.clone(),
                threshold: config.fallback.threshold,
                crop_size: config.fallback.crop_size,
                candidates: config.fallback.candidates.clone(),
            },
        );

        tracing::info!(
            "Object detection: {}, zero-shot fallback: {}",
            if pipeline.detector_available() {
                "available"
            } else {
                "unavailable"
            },
            pipeline.fallback_status()
        );
        pipeline
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn detector_available(&self) -> bool {
        self.registry.is_available()
    }

    pub fn fallback_status(&self) -> String {
        self.fallback.describe()
    }

    /// Run detection on a saved image. Never fails: every problem becomes
    /// `NoDetections` with a message.
    pub async fn analyze(&self, image: &Path) -> PipelineOutcome {
        let detector = match self.registry.get_or_load(&self.model).await {
            Ok(detector) => detector,
            Err(DetectionError::Unavailable(reason)) => {
                return PipelineOutcome::NoDetections {
                    reason: format!(
                        "Object detection is unavailable: {}. Set [detection].endpoint to enable it.",
                        reason
                    ),
                }
            }
            Err(e) => {
                tracing::warn!("Detector load failed: {}", e);
                return PipelineOutcome::NoDetections {
                    reason: format!("Could not load detection model: {}", e),
                };
            }
        };

        let raw = match detector.detect(image, &self.params).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Inference failed on {}: {}", image.display(), e);
                return PipelineOutcome::NoDetections {
                    reason: format!("Detection inference failed: {}", e),
                };
            }
        };

        if raw.is_empty() {
            return PipelineOutcome::NoDetections {
                reason: "No detections".to_string(),
            };
        }

        let mut detections: Vec<Detection> = raw.iter().map(RawDetection::to_detection).collect();
        let annotated = self.annotate(image, &raw).await;

        let target = &self.fallback_params.target_label;
        let has_boxes = raw.iter().any(|r| r.bbox.is_some());
        if !detector.labels().contains(target) && has_boxes {
            if let Capability::Available(classifier) = &self.fallback {
                if let Err(e) = self
                    .relabel(image, &raw, &mut detections, classifier.as_ref())
                    .await
                {
                    tracing::debug!("Zero-shot fallback skipped: {}", e);
                }
            }
        }

        tracing::info!(
            "Detected {} objects in {}",
            detections.len(),
            image.display()
        );
        PipelineOutcome::Detected {
            detections,
            annotated,
        }
    }

    async fn annotate(&self, image: &Path, raw: &[RawDetection]) -> Option<PathBuf> {
        let boxes: Vec<BoundingBox> = raw.iter().filter_map(|r| r.bbox).collect();
        let path = image.to_path_buf();
        match tokio::task::spawn_blocking(move || draw_boxes(&path, &boxes)).await {
            Ok(Ok(out)) => Some(out),
            Ok(Err(e)) => {
                tracing::debug!("Could not write annotated image: {}", e);
                None
            }
            Err(e) => {
                tracing::debug!("Annotation task failed: {}", e);
                None
            }
        }
    }

    /// Classify each boxed crop; overwrite the label when the target wins
    /// above the threshold. Confidence stays the detector's.
    async fn relabel(
        &self,
        image: &Path,
        raw: &[RawDetection],
        detections: &mut [Detection],
        classifier: &dyn ZeroShotClassifier,
    ) -> Result<(), DetectionError> {
        let crops = self.crops(image, raw).await?;
        let params = &self.fallback_params;

        for (index, crop) in crops {
            let probs = match classifier.classify(crop, &params.candidates).await {
                Ok(probs) => probs,
                Err(e) => {
                    tracing::debug!("Zero-shot classification failed for crop {}: {}", index, e);
                    continue;
                }
            };
            let Some((top, prob)) = argmax(&probs) else {
                continue;
            };
            let is_target = params
                .candidates
                .get(top)
                .is_some_and(|label| label == &params.target_label);
            if is_target && prob > params.threshold {
                if let Some(detection) = detections.get_mut(index) {
                    tracing::info!(
                        "Relabelled {} as {} (p={:.2})",
                        detection.label,
                        params.target_label,
                        prob
                    );
                    detection.label = params.target_label.clone();
                }
            }
        }
        Ok(())
    }

    async fn crops(
        &self,
        image: &Path,
        raw: &[RawDetection],
    ) -> Result<Vec<(usize, Vec<u8>)>, DetectionError> {
        let boxes: Vec<(usize, BoundingBox)> = raw
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.bbox.map(|b| (i, b)))
            .collect();
        let path = image.to_path_buf();
        let size = self.fallback_params.crop_size;

        let crops = tokio::task::spawn_blocking(
            move || -> Result<Vec<(usize, Vec<u8>)>, DetectionError> {
                let img = image::open(&path)?;
                Ok(boxes
                    .into_iter()
                    .filter_map(|(i, b)| crop_png(&img, &b, size).map(|png| (i, png)))
                    .collect())
            },
        )
        .await??;
        Ok(crops)
    }
}

fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((i, v)),
        })
}
