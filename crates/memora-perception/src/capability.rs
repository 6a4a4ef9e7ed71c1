//! Capability traits for image-analysis backends.
//!
//! Each trait covers exactly one capability so that backends can be mixed
//! freely: a captioning model from one provider, OCR from another.  Backends
//! register themselves with a
//! [`PerceptionAdapter`][crate::adapter::PerceptionAdapter].

use std::path::Path;

use async_trait::async_trait;
use memora_types::{MemoraError, PerceptionCapability};
use thiserror::Error;

/// A single perception capability failed for one image.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{capability} failed: {cause}")]
pub struct PerceptionError {
    pub capability: PerceptionCapability,
    pub cause: String,
}

impl PerceptionError {
    pub fn new(capability: PerceptionCapability, cause: impl Into<String>) -> Self {
        Self {
            capability,
            cause: cause.into(),
        }
    }
}

impl From<PerceptionError> for MemoraError {
    fn from(e: PerceptionError) -> Self {
        MemoraError::Perception {
            capability: e.capability,
            cause: e.cause,
        }
    }
}

/// Produces a one-sentence description of an image.
#[async_trait]
pub trait Captioner: Send + Sync {
    /// Stable identifier for this backend, e.g. `"llava"`.
    fn id(&self) -> &str;

    async fn caption(&self, image: &Path) -> Result<String, PerceptionError>;
}

/// Detects objects and returns their labels.
///
/// Backends may report the same label more than once (one entry per
/// detection); the adapter collapses duplicates.
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    fn id(&self) -> &str;

    async fn detect_objects(&self, image: &Path) -> Result<Vec<String>, PerceptionError>;
}

/// Classifies the scene, best guess first.
#[async_trait]
pub trait SceneClassifier: Send + Sync {
    fn id(&self) -> &str;

    async fn classify_scene(&self, image: &Path) -> Result<Vec<String>, PerceptionError>;
}

/// Counts human faces.
#[async_trait]
pub trait FaceCounter: Send + Sync {
    fn id(&self) -> &str;

    async fn count_faces(&self, image: &Path) -> Result<u32, PerceptionError>;
}

/// Extracts visible text fragments in reading order.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    fn id(&self) -> &str;

    async fn extract_text(&self, image: &Path) -> Result<Vec<String>, PerceptionError>;
}
