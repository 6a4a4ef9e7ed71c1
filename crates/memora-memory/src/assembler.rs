//! [`ProfileAssembler`] – builds the prompt-ready [`Profile`].
//!
//! Personal fields are stringified and trimmed; blank values are dropped.
//! The `"Image Memory"` entry is always present, defaulted when no memory
//! record is available.

use memora_types::{IMAGE_MEMORY_KEY, ImageMemory, MemoryRecord, PersonalRecord, Profile, ProfileValue};

use crate::store::{StorageError, StorageGateway};

/// Stateless merger of personal data and the latest image memory.
pub struct ProfileAssembler;

impl ProfileAssembler {
    /// Merge `personal` with `latest`.  Deterministic and side-effect free.
    pub fn assemble(personal: &PersonalRecord, latest: Option<&MemoryRecord>) -> Profile {
        let mut profile = Profile::new();
        for (name, value) in personal.iter() {
            let text = value.to_string();
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                profile.insert(name, ProfileValue::Text(trimmed.to_string()));
            }
        }
        let memory = latest.map(ImageMemory::from).unwrap_or_default();
        profile.insert(IMAGE_MEMORY_KEY, ProfileValue::ImageMemory(memory));
        profile
    }

    /// Load both inputs from `storage` and assemble them.
    ///
    /// An empty memory log is not an error: the image memory is defaulted.
    /// A missing personal profile is.
    pub fn load(storage: &dyn StorageGateway) -> Result<Profile, StorageError> {
        let personal = storage.load_personal()?;
        let latest = match storage.load_latest() {
            Ok(record) => Some(record),
            Err(StorageError::NoRows(_)) => None,
            Err(e) => return Err(e),
        };
        Ok(Self::assemble(&personal, latest.as_ref()))
    }
}
