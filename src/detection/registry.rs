use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{Capability, DetectionError, DetectorLoader, ObjectDetector};

/// Process-wide cache of loaded detectors, keyed by model name.
/// Failed loads are not cached, so a later request retries.
pub struct ModelRegistry {
    loader: Capability<Arc<dyn DetectorLoader>>,
    loaded: Mutex<HashMap<String, Arc<dyn ObjectDetector>>>,
}

impl ModelRegistry {
    pub fn new(loader: Capability<Arc<dyn DetectorLoader>>) -> Self {
        Self {
            loader,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.loader.is_available()
    }

    pub async fn get_or_load(&self, model: &str) -> Result<Arc<dyn ObjectDetector>, DetectionError> {
        let loader = match &self.loader {
            Capability::Available(loader) => loader,
            Capability::Unavailable { reason } => {
                return Err(DetectionError::Unavailable(reason.clone()))
            }
        };

        let mut loaded = self.loaded.lock().await;
        if let Some(detector) = loaded.get(model) {
            return Ok(detector.clone());
        }

        tracing::info!("Loading detection model: {}", model);
        let detector = loader.load(model).await?;
        tracing::info!(
            "Model {} ready with {} labels",
            model,
            detector.labels().len()
        );
        loaded.insert(model.to_string(), detector.clone());
        Ok(detector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{InferenceParams, LabelVocabulary, RawDetection};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubDetector {
        labels: LabelVocabulary,
    }

    #[async_trait]
    impl ObjectDetector for StubDetector {
        fn model(&self) -> &str {
            "stub"
        }

        fn labels(&self) -> &LabelVocabulary {
            &self.labels
        }

        async fn detect(
            &self,
            _image: &Path,
            _params: &InferenceParams,
        ) -> Result<Vec<RawDetection>, DetectionError> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct CountingLoader {
        loads: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl DetectorLoader for CountingLoader {
        async fn load(&self, model: &str) -> Result<Arc<dyn ObjectDetector>, DetectionError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DetectionError::Load {
                    model: model.to_string(),
                    reason: "weights missing".into(),
                });
            }
            Ok(Arc::new(StubDetector {
                labels: LabelVocabulary::new(["apple"]),
            }))
        }
    }

    #[tokio::test]
    async fn loads_each_model_once() {
        let loader = Arc::new(CountingLoader::default());
        let registry = ModelRegistry::new(Capability::Available(loader.clone()));

        registry.get_or_load("yolov8n").await.unwrap();
        registry.get_or_load("yolov8n").await.unwrap();
        registry.get_or_load("yolov8s").await.unwrap();

        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_loads_are_retried() {
        let loader = Arc::new(CountingLoader {
            fail: true,
            ..Default::default()
        });
        let registry = ModelRegistry::new(Capability::Available(loader.clone()));

        assert!(registry.get_or_load("yolov8n").await.is_err());
        assert!(registry.get_or_load("yolov8n").await.is_err());
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unavailable_loader_reports_reason() {
        let registry = ModelRegistry::new(Capability::unavailable("no endpoint configured"));
        assert!(!registry.is_available());
        match registry.get_or_load("yolov8n").await {
            Err(DetectionError::Unavailable(reason)) => {
                assert_eq!(reason, "no endpoint configured")
            }
            other => panic!("expected unavailable, got {:?}", other.map(|d| d.model().to_string())),
        }
    }
}
