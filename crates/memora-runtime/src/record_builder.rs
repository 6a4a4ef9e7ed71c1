//! [`MemoryRecordBuilder`] – image in, persisted memory record out.
//!
//! All five perception capabilities are issued concurrently and the builder
//! waits for every one of them to finish.  A failed capability degrades to a
//! safe default instead of aborting the record:
//!
//! | capability | default               |
//! |------------|-----------------------|
//! | caption    | `""`                  |
//! | objects    | empty set             |
//! | scene      | [`UNKNOWN_SCENE`]     |
//! | face count | `0`                   |
//! | text       | empty list            |
//!
//! The finished record is appended to the [`StorageGateway`]; storage
//! failures are surfaced and the record is not retained.

use std::path::Path;
use std::sync::Arc;

use memora_memory::StorageGateway;
use memora_perception::{PerceptionAdapter, PerceptionError};
use memora_types::{MemoraError, MemoryRecord, UNKNOWN_SCENE};
use tracing::{info, warn};

/// Builds and persists one [`MemoryRecord`] per image.
pub struct MemoryRecordBuilder {
    perception: Arc<PerceptionAdapter>,
    storage: Arc<dyn StorageGateway>,
}

impl MemoryRecordBuilder {
    pub fn new(perception: Arc<PerceptionAdapter>, storage: Arc<dyn StorageGateway>) -> Self {
        Self { perception, storage }
    }

    /// Run perception over `image` and aggregate the results.  Never fails:
    /// every capability failure is logged and replaced by its default.
    pub async fn extract(&self, image: &Path) -> MemoryRecord {
        let p = &self.perception;
        let (caption, objects, scenes, faces, text) = tokio::join!(
            p.caption(image),
            p.detect_objects(image),
            p.classify_scene(image),
            p.count_faces(image),
            p.extract_text(image),
        );

        let scene = or_default(scenes, image)
            .into_iter()
            .next()
            .unwrap_or_else(|| UNKNOWN_SCENE.to_string());

        MemoryRecord::new(
            image.to_string_lossy(),
            or_default(caption, image),
            scene,
            or_default(faces, image),
            or_default(objects, image),
            or_default(text, image),
        )
    }

    /// Extract a record from `image` and append it to storage.
    ///
    /// # Errors
    ///
    /// Returns [`MemoraError::Storage`] if the append fails.
    pub async fn build_record(&self, image: &Path) -> Result<MemoryRecord, MemoraError> {
        let record = self.extract(image).await;
        self.storage.append(&record)?;
        info!(
            id = %record.id,
            image = %record.image_path,
            scene = %record.scene,
            people = record.people_count,
            objects = record.objects.len(),
            "memory record stored"
        );
        Ok(record)
    }
}

fn or_default<T: Default>(result: Result<T, PerceptionError>, image: &Path) -> T {
    result.unwrap_or_else(|e| {
        warn!(
            capability = %e.capability,
            cause = %e.cause,
            image = %image.display(),
            "perception capability failed; using default"
        );
        T::default()
    })
}
