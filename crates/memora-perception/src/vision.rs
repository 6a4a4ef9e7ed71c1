//! [`OllamaVision`] – perception backend backed by a local vision model.
//!
//! Each capability sends the image (base64-encoded) to Ollama's
//! `/api/generate` endpoint together with a capability-specific instruction,
//! then parses the free-text reply into a typed result.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use memora_perception::{OllamaVision, PerceptionAdapter};
//!
//! let mut adapter = PerceptionAdapter::new();
//! adapter.register_all(Arc::new(OllamaVision::new("http://localhost:11434", "llava")));
//! adapter.init();
//! ```

use std::path::Path;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use memora_types::PerceptionCapability;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capability::{
    Captioner, FaceCounter, ObjectDetector, PerceptionError, SceneClassifier, TextExtractor,
};

const CAPTION_INSTRUCTION: &str =
    "Describe this photo in one short sentence. Reply with the sentence only.";
const OBJECTS_INSTRUCTION: &str = "List every distinct kind of object visible in this photo as \
     short lowercase nouns separated by commas. Reply with the list only.";
const SCENE_INSTRUCTION: &str = "Classify the place shown in this photo. Give up to five scene \
     categories (for example: park, kitchen, beach), one per line, most likely first. Reply with \
     the categories only.";
const FACES_INSTRUCTION: &str =
    "How many human faces are visible in this photo? Reply with a single integer.";
const TEXT_INSTRUCTION: &str = "Transcribe any readable text in this photo, one fragment per line \
     in reading order. If there is no text, reply with NONE.";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Vision-model backend implementing all five perception capabilities.
pub struct OllamaVision {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaVision {
    /// Create a backend pointing at `base_url` (e.g. `"http://localhost:11434"`)
    /// and using the vision `model` (e.g. `"llava"`).
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn ask(
        &self,
        capability: PerceptionCapability,
        instruction: &str,
        image: &Path,
    ) -> Result<String, PerceptionError> {
        let fail = |cause: String| PerceptionError::new(capability, cause);

        let bytes = tokio::fs::read(image)
            .await
            .map_err(|e| fail(format!("cannot read {}: {e}", image.display())))?;

        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let body = GenerateRequest {
            model: &self.model,
            prompt: instruction,
            images: vec![STANDARD.encode(&bytes)],
            stream: false,
        };

        debug!(%capability, image = %image.display(), model = %self.model, "querying vision model");

        let response: GenerateResponse = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| fail(format!("HTTP error: {e}")))?
            .json()
            .await
            .map_err(|e| fail(format!("unexpected response format: {e}")))?;

        Ok(response.response)
    }
}

#[async_trait]
impl Captioner for OllamaVision {
    fn id(&self) -> &str {
        &self.model
    }

    async fn caption(&self, image: &Path) -> Result<String, PerceptionError> {
        let reply = self.ask(PerceptionCapability::Caption, CAPTION_INSTRUCTION, image).await?;
        Ok(reply.trim().to_string())
    }
}

#[async_trait]
impl ObjectDetector for OllamaVision {
    fn id(&self) -> &str {
        &self.model
    }

    async fn detect_objects(&self, image: &Path) -> Result<Vec<String>, PerceptionError> {
        let reply = self.ask(PerceptionCapability::Objects, OBJECTS_INSTRUCTION, image).await?;
        Ok(parse_labels(&reply))
    }
}

#[async_trait]
impl SceneClassifier for OllamaVision {
    fn id(&self) -> &str {
        &self.model
    }

    async fn classify_scene(&self, image: &Path) -> Result<Vec<String>, PerceptionError> {
        let reply = self.ask(PerceptionCapability::Scene, SCENE_INSTRUCTION, image).await?;
        Ok(parse_ranked_lines(&reply))
    }
}

#[async_trait]
impl FaceCounter for OllamaVision {
    fn id(&self) -> &str {
        &self.model
    }

    async fn count_faces(&self, image: &Path) -> Result<u32, PerceptionError> {
        let reply = self.ask(PerceptionCapability::FaceCount, FACES_INSTRUCTION, image).await?;
        parse_count(&reply).ok_or_else(|| {
            PerceptionError::new(
                PerceptionCapability::FaceCount,
                format!("no face count in reply: {reply:?}"),
            )
        })
    }
}

#[async_trait]
impl TextExtractor for OllamaVision {
    fn id(&self) -> &str {
        &self.model
    }

    async fn extract_text(&self, image: &Path) -> Result<Vec<String>, PerceptionError> {
        let reply = self.ask(PerceptionCapability::Text, TEXT_INSTRUCTION, image).await?;
        Ok(parse_text_fragments(&reply))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reply parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Strip list decoration such as `"1."`, `"-"`, `"*"` from a reply line.
fn strip_bullet(line: &str) -> &str {
    let line = line.trim();
    let line = line.trim_start_matches(|c: char| c == '-' || c == '*' || c == '•');
    let digits = line.trim_start_matches(|c: char| c.is_ascii_digit());
    let line = if digits.len() < line.len() && digits.starts_with(['.', ')']) {
        &digits[1..]
    } else {
        line
    };
    line.trim()
}

fn parse_labels(reply: &str) -> Vec<String> {
    reply
        .split([',', '\n'])
        .map(strip_bullet)
        .map(|l| l.trim_end_matches('.').to_lowercase())
        .filter(|l| !l.is_empty())
        .collect()
}

fn parse_ranked_lines(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(strip_bullet)
        .map(|l| l.trim_end_matches('.').to_lowercase())
        .filter(|l| !l.is_empty())
        .collect()
}

fn without_trailing_punctuation(s: &str) -> &str {
    s.trim().trim_end_matches(|c: char| c.is_ascii_punctuation())
}

fn parse_count(reply: &str) -> Option<u32> {
    let lowered = reply.trim().to_lowercase();
    let first_word = lowered.split_whitespace().next().map(without_trailing_punctuation);
    if matches!(first_word, Some("no" | "none" | "zero")) {
        return Some(0);
    }
    lowered
        .split(|c: char| !c.is_ascii_digit())
        .find(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
}

const NO_TEXT_REPLIES: [&str; 4] = ["none", "no text", "no text found", "no readable text"];

fn parse_text_fragments(reply: &str) -> Vec<String> {
    let whole = without_trailing_punctuation(reply).to_lowercase();
    if NO_TEXT_REPLIES.contains(&whole.as_str()) {
        return Vec::new();
    }
    reply
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}
