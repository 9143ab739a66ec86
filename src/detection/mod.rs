//! Food detection: a pretrained object detector, reached through a model
//! registry, plus an optional zero-shot classifier used to relabel crops the
//! detector's vocabulary cannot name.

mod annotate;
mod pipeline;
mod registry;
pub mod remote;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

pub use self::annotate::{annotated_path, crop_png, draw_boxes};
pub use self::pipeline::{DetectionPipeline, FallbackParams, PipelineOutcome};
pub use self::registry::ModelRegistry;

/// One labeled detection as consumed by the nutrition aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Pixel coordinates, top-left and bottom-right corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn is_valid(&self) -> bool {
        self.x2 > self.x1 && self.y2 > self.y1
    }
}

/// Detector output before the fallback pass. The box is best-effort.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub label: String,
    pub confidence: f32,
    pub bbox: Option<BoundingBox>,
}

impl RawDetection {
    pub fn to_detection(&self) -> Detection {
        Detection::new(self.label.clone(), self.confidence)
    }
}

/// Class names a detector can emit, indexed by class id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelVocabulary {
    names: Vec<String>,
}

impl LabelVocabulary {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name_for(&self, class_id: usize) -> Option<&str> {
        self.names.get(class_id).map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.names.iter().any(|n| n.eq_ignore_ascii_case(label))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceParams {
    pub confidence: f32,
    pub image_size: u32,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            confidence: 0.25,
            image_size: 640,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("{0}")]
    Unavailable(String),

    #[error("could not load model {model}: {reason}")]
    Load { model: String, reason: String },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("inference service error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Availability of an optional collaborator, decided once at startup.
#[derive(Debug, Clone)]
pub enum Capability<T> {
    Available(T),
    Unavailable { reason: String },
}

impl<T> Capability<T> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Capability::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available(_))
    }

    /// Human-readable status for logs and the capture page.
    pub fn describe(&self) -> String {
        match self {
            Capability::Available(_) => "available".to_string(),
            Capability::Unavailable { reason } => format!("unavailable ({})", reason),
        }
    }
}

#[async_trait]
pub trait ObjectDetector: Send + Sync {
    fn model(&self) -> &str;

    fn labels(&self) -> &LabelVocabulary;

    async fn detect(
        &self,
        image: &Path,
        params: &InferenceParams,
    ) -> Result<Vec<RawDetection>, DetectionError>;
}

/// Produces detectors by model name; the registry caches what it returns.
#[async_trait]
pub trait DetectorLoader: Send + Sync {
    async fn load(&self, model: &str) -> Result<Arc<dyn ObjectDetector>, DetectionError>;
}

/// Image-text similarity model. Returns one probability per candidate label.
#[async_trait]
pub trait ZeroShotClassifier: Send + Sync {
    async fn classify(
        &self,
        crop_png: Vec<u8>,
        candidates: &[String],
    ) -> Result<Vec<f32>, DetectionError>;
}
