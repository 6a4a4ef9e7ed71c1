//! [`PerceptionAdapter`] – capability registry and per-call dispatcher.
//!
//! The adapter stores one backend per [`PerceptionCapability`].  It is
//! built once at process start, [`init`][PerceptionAdapter::init]ialised,
//! and then shared read-only (typically behind an `Arc`) by every component
//! that analyses images.  [`shutdown`][PerceptionAdapter::shutdown] drops all
//! backends, releasing whatever model resources they hold.
//!
//! Calls made before `init`, after `shutdown`, or for a capability with no
//! registered backend fail with a [`PerceptionError`] naming the capability.
//! Each call is independent: one capability failing never affects another.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use memora_types::PerceptionCapability;
use tracing::{debug, info};

use crate::capability::{
    Captioner, FaceCounter, ObjectDetector, PerceptionError, SceneClassifier, TextExtractor,
};

/// Maximum number of ranked scene labels returned by
/// [`PerceptionAdapter::classify_scene`].
pub const SCENE_TOP_K: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Registering,
    Ready,
    ShutDown,
}

/// Registry of perception backends, one per capability.
pub struct PerceptionAdapter {
    captioner: Option<Arc<dyn Captioner>>,
    object_detector: Option<Arc<dyn ObjectDetector>>,
    scene_classifier: Option<Arc<dyn SceneClassifier>>,
    face_counter: Option<Arc<dyn FaceCounter>>,
    text_extractor: Option<Arc<dyn TextExtractor>>,
    lifecycle: Lifecycle,
}

impl Default for PerceptionAdapter {
    fn default() -> Self {
        Self {
            captioner: None,
            object_detector: None,
            scene_classifier: None,
            face_counter: None,
            text_extractor: None,
            lifecycle: Lifecycle::Registering,
        }
    }
}

impl PerceptionAdapter {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single backend for all five capabilities.
    pub fn register_all<B>(&mut self, backend: Arc<B>)
    where
        B: Captioner + ObjectDetector + SceneClassifier + FaceCounter + TextExtractor + 'static,
    {
        self.register_captioner(backend.clone());
        self.register_object_detector(backend.clone());
        self.register_scene_classifier(backend.clone());
        self.register_face_counter(backend.clone());
        self.register_text_extractor(backend);
    }

    /// Register the captioning backend, replacing any previous one.
    pub fn register_captioner(&mut self, backend: Arc<dyn Captioner>) {
        debug!(backend = backend.id(), "registered captioner");
        self.captioner = Some(backend);
    }

    pub fn register_object_detector(&mut self, backend: Arc<dyn ObjectDetector>) {
        debug!(backend = backend.id(), "registered object detector");
        self.object_detector = Some(backend);
    }

    pub fn register_scene_classifier(&mut self, backend: Arc<dyn SceneClassifier>) {
        debug!(backend = backend.id(), "registered scene classifier");
        self.scene_classifier = Some(backend);
    }

    pub fn register_face_counter(&mut self, backend: Arc<dyn FaceCounter>) {
        debug!(backend = backend.id(), "registered face counter");
        self.face_counter = Some(backend);
    }

    pub fn register_text_extractor(&mut self, backend: Arc<dyn TextExtractor>) {
        debug!(backend = backend.id(), "registered text extractor");
        self.text_extractor = Some(backend);
    }

    /// Mark the registry ready for use.  Capabilities without a backend stay
    /// unavailable and fail on every call.
    pub fn init(&mut self) {
        let missing: Vec<String> = PerceptionCapability::ALL
            .iter()
            .filter(|c| !self.is_registered(**c))
            .map(|c| c.to_string())
            .collect();
        info!(missing = ?missing, "perception adapter initialised");
        self.lifecycle = Lifecycle::Ready;
    }

    /// Drop every backend.  The adapter cannot be used afterwards.
    pub fn shutdown(&mut self) {
        self.captioner = None;
        self.object_detector = None;
        self.scene_classifier = None;
        self.face_counter = None;
        self.text_extractor = None;
        self.lifecycle = Lifecycle::ShutDown;
        info!("perception adapter shut down");
    }

    /// `true` between [`init`][Self::init] and [`shutdown`][Self::shutdown].
    pub fn is_ready(&self) -> bool {
        self.lifecycle == Lifecycle::Ready
    }

    /// `true` when a backend is registered for `capability`.
    pub fn is_registered(&self, capability: PerceptionCapability) -> bool {
        match capability {
            PerceptionCapability::Caption => self.captioner.is_some(),
            PerceptionCapability::Objects => self.object_detector.is_some(),
            PerceptionCapability::Scene => self.scene_classifier.is_some(),
            PerceptionCapability::FaceCount => self.face_counter.is_some(),
            PerceptionCapability::Text => self.text_extractor.is_some(),
        }
    }

    fn backend<'a, T: ?Sized>(
        &self,
        capability: PerceptionCapability,
        slot: &'a Option<Arc<T>>,
    ) -> Result<&'a Arc<T>, PerceptionError> {
        match self.lifecycle {
            Lifecycle::Registering => {
                return Err(PerceptionError::new(capability, "perception adapter not initialised"));
            }
            Lifecycle::ShutDown => {
                return Err(PerceptionError::new(capability, "perception adapter shut down"));
            }
            Lifecycle::Ready => {}
        }
        slot.as_ref()
            .ok_or_else(|| PerceptionError::new(capability, "no backend registered"))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Capabilities
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn caption(&self, image: &Path) -> Result<String, PerceptionError> {
        let backend = self.backend(PerceptionCapability::Caption, &self.captioner)?;
        Ok(backend.caption(image).await?.trim().to_string())
    }

    /// Distinct object labels.  Repeated detections of a label collapse to one
    /// entry; blank labels are dropped.
    pub async fn detect_objects(&self, image: &Path) -> Result<BTreeSet<String>, PerceptionError> {
        let backend = self.backend(PerceptionCapability::Objects, &self.object_detector)?;
        let labels = backend.detect_objects(image).await?;
        Ok(labels
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    /// Scene labels ranked best-to-worst, at most [`SCENE_TOP_K`] of them.
    pub async fn classify_scene(&self, image: &Path) -> Result<Vec<String>, PerceptionError> {
        let backend = self.backend(PerceptionCapability::Scene, &self.scene_classifier)?;
        let mut ranked: Vec<String> = backend
            .classify_scene(image)
            .await?
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        ranked.truncate(SCENE_TOP_K);
        Ok(ranked)
    }

    pub async fn count_faces(&self, image: &Path) -> Result<u32, PerceptionError> {
        let backend = self.backend(PerceptionCapability::FaceCount, &self.face_counter)?;
        backend.count_faces(image).await
    }

    /// Text fragments in the order the backend reported them.
    pub async fn extract_text(&self, image: &Path) -> Result<Vec<String>, PerceptionError> {
        let backend = self.backend(PerceptionCapability::Text, &self.text_extractor)?;
        backend.extract_text(image).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedBackend;

    #[async_trait]
    impl Captioner for FixedBackend {
        fn id(&self) -> &str {
            "fixed"
        }
        async fn caption(&self, _image: &Path) -> Result<String, PerceptionError> {
            Ok("  a dog on a beach \n".into())
        }
    }

    #[async_trait]
    impl ObjectDetector for FixedBackend {
        fn id(&self) -> &str {
            "fixed"
        }
        async fn detect_objects(&self, _image: &Path) -> Result<Vec<String>, PerceptionError> {
            Ok(vec!["dog".into(), "person".into(), "dog".into(), " ".into(), "person".into()])
        }
    }

    #[async_trait]
    impl SceneClassifier for FixedBackend {
        fn id(&self) -> &str {
            "fixed"
        }
        async fn classify_scene(&self, _image: &Path) -> Result<Vec<String>, PerceptionError> {
            Ok(["beach", "coast", "ocean", "sandbar", "boardwalk", "harbor", "lagoon"]
                .into_iter()
                .map(String::from)
                .collect())
        }
    }

    #[async_trait]
    impl FaceCounter for FixedBackend {
        fn id(&self) -> &str {
            "fixed"
        }
        async fn count_faces(&self, _image: &Path) -> Result<u32, PerceptionError> {
            Ok(3)
        }
    }

    #[async_trait]
    impl TextExtractor for FixedBackend {
        fn id(&self) -> &str {
            "fixed"
        }
        async fn extract_text(&self, _image: &Path) -> Result<Vec<String>, PerceptionError> {
            Ok(vec!["LIFEGUARD".into(), "No swimming".into()])
        }
    }

    fn ready_adapter() -> PerceptionAdapter {
        let mut adapter = PerceptionAdapter::new();
        adapter.register_all(Arc::new(FixedBackend));
        adapter.init();
        adapter
    }

    #[tokio::test]
    async fn caption_is_trimmed() {
        let adapter = ready_adapter();
        let caption = adapter.caption(Path::new("beach.jpg")).await.unwrap();
        assert_eq!(caption, "a dog on a beach");
    }

    #[tokio::test]
    async fn duplicate_object_labels_collapse() {
        let adapter = ready_adapter();
        let objects = adapter.detect_objects(Path::new("beach.jpg")).await.unwrap();
        assert_eq!(objects.len(), 2);
        assert!(objects.contains("dog"));
        assert!(objects.contains("person"));
    }

    #[tokio::test]
    async fn scene_ranking_is_bounded_to_top_five() {
        let adapter = ready_adapter();
        let scenes = adapter.classify_scene(Path::new("beach.jpg")).await.unwrap();
        assert_eq!(scenes.len(), SCENE_TOP_K);
        assert_eq!(scenes[0], "beach");
    }

    #[tokio::test]
    async fn faces_and_text_pass_through() {
        let adapter = ready_adapter();
        assert_eq!(adapter.count_faces(Path::new("beach.jpg")).await.unwrap(), 3);
        let text = adapter.extract_text(Path::new("beach.jpg")).await.unwrap();
        assert_eq!(text, ["LIFEGUARD", "No swimming"]);
    }

    #[tokio::test]
    async fn calls_before_init_fail() {
        let mut adapter = PerceptionAdapter::new();
        adapter.register_all(Arc::new(FixedBackend));
        let err = adapter.caption(Path::new("x.jpg")).await.unwrap_err();
        assert_eq!(err.capability, PerceptionCapability::Caption);
        assert!(err.cause.contains("not initialised"));
    }

    #[tokio::test]
    async fn calls_after_shutdown_fail() {
        let mut adapter = ready_adapter();
        adapter.shutdown();
        assert!(!adapter.is_ready());
        let err = adapter.count_faces(Path::new("x.jpg")).await.unwrap_err();
        assert_eq!(err.capability, PerceptionCapability::FaceCount);
        assert!(!adapter.is_registered(PerceptionCapability::FaceCount));
    }

    #[tokio::test]
    async fn missing_backend_fails_only_that_capability() {
        let mut adapter = PerceptionAdapter::new();
        adapter.register_captioner(Arc::new(FixedBackend));
        adapter.init();
        assert!(adapter.caption(Path::new("x.jpg")).await.is_ok());
        let err = adapter.extract_text(Path::new("x.jpg")).await.unwrap_err();
        assert_eq!(err.capability, PerceptionCapability::Text);
        assert!(err.cause.contains("no backend"));
    }
}
