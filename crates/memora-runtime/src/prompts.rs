//! Prompt templates for the recall session.
//!
//! Pure string construction: nothing here talks to a model.  Every template
//! embeds the profile as one `key: value` line per field, in profile order,
//! with values copied verbatim.

use memora_types::{ImageMemory, Profile, ProfileValue};

/// Render `profile` as `key: value` lines.  The image memory's sub-fields
/// are indented beneath its key.
pub fn render_profile(profile: &Profile) -> String {
    let mut out = String::new();
    for (key, value) in profile.iter() {
        match value {
            ProfileValue::Text(text) => out.push_str(&format!("{key}: {text}\n")),
            ProfileValue::ImageMemory(memory) => {
                out.push_str(&format!("{key}:\n"));
                for (label, field) in image_memory_fields(memory) {
                    out.push_str(&format!("  {label}: {field}\n"));
                }
            }
        }
    }
    out
}

fn image_memory_fields(memory: &ImageMemory) -> [(&'static str, String); 6] {
    [
        ("Image Path", memory.image_path.clone()),
        ("Caption", memory.caption.clone()),
        ("Scene", memory.scene.clone()),
        ("People Count", memory.people_count.to_string()),
        ("Objects", memory.objects.clone()),
        ("Detected Text", memory.detected_text.clone()),
    ]
}

/// Greet the person and describe their usual daily routine.
pub fn routine_prompt(profile: &Profile) -> String {
    format!(
        "You are a friendly assistant for someone living with memory impairment.\n\
         \n\
         The person greeted you to start the day. Based on their personal information, \
         greet them warmly and describe their usual daily routine in simple, comforting words.\n\
         \n\
         Profile:\n\
         {}\n",
        render_profile(profile)
    )
}

/// One gentle, indirect clue toward a memory from the profile.
pub fn hint_prompt(profile: &Profile) -> String {
    format!(
        "You are a memory assistant. Give the person one gentle hint to help them recall a \
         specific memory from their life, based on the profile below.\n\
         \n\
         Do not reveal the memory directly. Only offer a soft, indirect clue that can trigger \
         their memory.\n\
         \n\
         Profile:\n\
         {}\n",
        render_profile(profile)
    )
}

/// Confirm or correct the person's attempt, then narrate the memory.
pub fn reveal_prompt(profile: &Profile, user_attempt: &str) -> String {
    format!(
        "The person tried to recall a memory after your hint. Their attempt was:\n\
         \n\
         \"{user_attempt}\"\n\
         \n\
         Gently confirm what they got right or kindly correct them, then describe the actual \
         memory warmly and in detail. Be supportive and reassuring if their attempt was wrong \
         or incomplete.\n\
         \n\
         Based on this personal information:\n\
         {}\n",
        render_profile(profile)
    )
}
