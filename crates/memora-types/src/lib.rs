//! `memora-types` – shared data model for the Memora memory companion.
//!
//! Every other crate in the workspace speaks in terms of the types defined
//! here: the [`MemoryRecord`] produced by the extraction pipeline, the
//! flattened [`Profile`] consumed by the prompt builders, the recall
//! [`Stage`]s, and the global [`MemoraError`] taxonomy.

pub mod profile;

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use profile::{FieldValue, IMAGE_MEMORY_KEY, ImageMemory, PersonalRecord, Profile, ProfileValue};

/// Scene label recorded when classification failed or returned nothing.
pub const UNKNOWN_SCENE: &str = "Unknown";

/// One of the five independent image-analysis capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerceptionCapability {
    Caption,
    Objects,
    Scene,
    FaceCount,
    Text,
}

impl PerceptionCapability {
    pub const ALL: [PerceptionCapability; 5] = [
        PerceptionCapability::Caption,
        PerceptionCapability::Objects,
        PerceptionCapability::Scene,
        PerceptionCapability::FaceCount,
        PerceptionCapability::Text,
    ];
}

impl fmt::Display for PerceptionCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerceptionCapability::Caption => write!(f, "caption"),
            PerceptionCapability::Objects => write!(f, "objects"),
            PerceptionCapability::Scene => write!(f, "scene"),
            PerceptionCapability::FaceCount => write!(f, "face_count"),
            PerceptionCapability::Text => write!(f, "text"),
        }
    }
}

/// The structured result of running every perception capability over one
/// image.
///
/// Records are appended to the persisted memory log once and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique identifier of the log row.
    pub id: Uuid,
    /// Wall-clock time at which the record was built.
    pub recorded_at: DateTime<Utc>,
    /// Path (or handle) of the source image.
    pub image_path: String,
    /// One-sentence description of the image.
    pub caption: String,
    /// Best scene guess, or [`UNKNOWN_SCENE`].
    pub scene: String,
    /// Number of faces detected.
    pub people_count: u32,
    /// Distinct object labels.
    pub objects: BTreeSet<String>,
    /// Text fragments in the order the engine reported them.
    pub text: Vec<String>,
}

impl MemoryRecord {
    /// Construct a record with a fresh UUID and the current UTC timestamp.
    pub fn new(
        image_path: impl Into<String>,
        caption: impl Into<String>,
        scene: impl Into<String>,
        people_count: u32,
        objects: BTreeSet<String>,
        text: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            image_path: image_path.into(),
            caption: caption.into(),
            scene: scene.into(),
            people_count,
            objects,
            text,
        }
    }

    /// Object labels joined with `", "` (the persisted column format).
    pub fn objects_joined(&self) -> String {
        self.objects.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
    }

    /// Text fragments joined with `", "` (the persisted column format).
    pub fn text_joined(&self) -> String {
        self.text.join(", ")
    }
}

/// The four stages of a recall session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Greeting,
    RoutineShown,
    HintShown,
    MemoryRevealed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Greeting => write!(f, "Greeting"),
            Stage::RoutineShown => write!(f, "RoutineShown"),
            Stage::HintShown => write!(f, "HintShown"),
            Stage::MemoryRevealed => write!(f, "MemoryRevealed"),
        }
    }
}

/// Operations a caller may attempt on a recall session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Start,
    RequestHint,
    Reveal,
    AnotherMemory,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Start => write!(f, "Start"),
            Operation::RequestHint => write!(f, "RequestHint"),
            Operation::Reveal => write!(f, "Reveal"),
            Operation::AnotherMemory => write!(f, "AnotherMemory"),
        }
    }
}

/// Global error taxonomy spanning input validation, session transitions,
/// perception, generation and storage failures.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MemoraError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid transition: cannot {attempted} while in {from}")]
    InvalidTransition { from: Stage, attempted: Operation },

    #[error("Perception capability {capability} failed: {cause}")]
    Perception {
        capability: PerceptionCapability,
        cause: String,
    },

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}
