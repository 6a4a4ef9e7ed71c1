//! `memora-perception` – image-analysis capabilities.
//!
//! Turns a photograph into the typed facts the memory companion needs to
//! build a memory record.
//!
//! # Modules
//!
//! - [`capability`] – one trait per perception capability
//!   ([`Captioner`], [`ObjectDetector`], [`SceneClassifier`],
//!   [`FaceCounter`], [`TextExtractor`]) plus the [`PerceptionError`] they
//!   report.
//! - [`adapter`] – [`PerceptionAdapter`][adapter::PerceptionAdapter]: the
//!   capability registry, initialised once at process start and injected
//!   wherever images are analysed.  It enforces the per-capability
//!   post-conditions (distinct object labels, top-5 scene ranking).
//! - [`vision`] – [`OllamaVision`][vision::OllamaVision]: a backend that
//!   implements all five capabilities by prompting a local vision model
//!   served by [Ollama](https://ollama.com).

pub mod adapter;
pub mod capability;
pub mod vision;

pub use adapter::{PerceptionAdapter, SCENE_TOP_K};
pub use capability::{
    Captioner, FaceCounter, ObjectDetector, PerceptionError, SceneClassifier, TextExtractor,
};
pub use vision::OllamaVision;
