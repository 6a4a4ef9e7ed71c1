//! `memora-runtime` – the recall engine.
//!
//! Where memories are built from photos and recall sessions are driven.
//!
//! # Modules
//!
//! - [`gateway`] – [`GenerativeTextGateway`][gateway::GenerativeTextGateway]
//!   and [`OllamaGateway`][gateway::OllamaGateway]: one prompt in, one trimmed
//!   reply out, against a local [Ollama](https://ollama.com) server.
//! - [`prompts`] – the routine, hint and reveal prompt templates.  Pure
//!   string construction so prompt content can be tested without a model.
//! - [`record_builder`] –
//!   [`MemoryRecordBuilder`][record_builder::MemoryRecordBuilder]: runs the
//!   five perception capabilities concurrently, degrades failures to
//!   defaults, and appends the record to storage.
//! - [`session`] – [`RecallSessionMachine`][session::RecallSessionMachine]:
//!   the greet → routine → hint → reveal state machine.
//! - [`driver`] – [`run_session`][driver::run_session]: loops a session
//!   through a [`Presenter`][driver::Presenter] until the person stops.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable trace export.

pub mod driver;
pub mod gateway;
pub mod prompts;
pub mod record_builder;
pub mod session;
pub mod telemetry;

pub use driver::{Confirmation, Presenter, TextRequest, run_session};
pub use gateway::{GenerationError, GenerativeTextGateway, OllamaGateway};
pub use record_builder::MemoryRecordBuilder;
pub use session::{RecallSession, RecallSessionMachine};
pub use telemetry::{TracerProviderGuard, init_tracing};
