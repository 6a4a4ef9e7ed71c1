//! `memora-memory` – The Knowledge Base.
//!
//! Keeps the personal profile and the log of image memories on disk, and
//! turns them into the flattened [`Profile`][memora_types::Profile] the
//! recall session prompts from.
//!
//! # Modules
//!
//! - [`store`] – [`StorageGateway`][store::StorageGateway] and its SQLite
//!   implementation [`SqliteStore`][store::SqliteStore]: an open-schema
//!   personal profile row plus an append-only memory log.
//! - [`assembler`] – [`ProfileAssembler`][assembler::ProfileAssembler]:
//!   merges a personal record with the latest memory record.

pub mod assembler;
pub mod store;

pub use assembler::ProfileAssembler;
pub use store::{SqliteStore, StorageError, StorageGateway};
