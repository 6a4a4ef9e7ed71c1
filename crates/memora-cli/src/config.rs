//! Configuration vault – reads/writes `~/.memora/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted settings stored in `~/.memora/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the Ollama instance.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Model used for greetings, hints and reveals.
    #[serde(default = "default_text_model")]
    pub text_model: String,

    /// Multimodal model used to perceive photos.
    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    /// SQLite file holding the personal profile and the memory log.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_text_model() -> String {
    "openchat".to_string()
}
fn default_vision_model() -> String {
    "llava".to_string()
}
fn default_database_path() -> PathBuf {
    memora_dir_for_home(&home_dir()).join("memora.db")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ollama_url: default_ollama_url(),
            text_model: default_text_model(),
            vision_model: default_vision_model(),
            database_path: default_database_path(),
        }
    }
}

fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

fn memora_dir_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".memora")
}

/// Return the path to `~/.memora/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    memora_dir_for_home(home).join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Load the config, falling back to defaults (plus environment overrides)
/// when the file is missing or unreadable.
pub fn load_or_default() -> Config {
    match load() {
        Ok(Some(cfg)) => cfg,
        Ok(None) | Err(_) => {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

/// Apply `MEMORA_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `MEMORA_OLLAMA_URL` | `ollama_url` |
/// | `MEMORA_MODEL` | `text_model` |
/// | `MEMORA_VISION_MODEL` | `vision_model` |
/// | `MEMORA_DB` | `database_path` |
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides_from(cfg, |key| std::env::var(key).ok());
}

fn apply_overrides_from(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("MEMORA_OLLAMA_URL") {
        cfg.ollama_url = v;
    }
    if let Some(v) = lookup("MEMORA_MODEL") {
        cfg.text_model = v;
    }
    if let Some(v) = lookup("MEMORA_VISION_MODEL") {
        cfg.vision_model = v;
    }
    if let Some(v) = lookup("MEMORA_DB")
        && !v.trim().is_empty()
    {
        cfg.database_path = PathBuf::from(v);
    }
}

/// Save the config to disk, creating `~/.memora/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        create_private_dir(parent)?;
        set_mode(parent, 0o700)?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    write_private(path, raw.as_bytes())
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}

/// Create `dir` and any missing parents.  Directories created here are
/// owner-only (rwx------ on Unix); an existing directory is left untouched.
pub fn create_private_dir(dir: &Path) -> Result<(), String> {
    if dir.is_dir() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder
        .create(dir)
        .map_err(|e| format!("Failed to create {}: {}", dir.display(), e))
}

/// Restrict an existing file or directory to `mode`.  No-op off Unix.
pub fn set_mode(path: &Path, mode: u32) -> Result<(), String> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| format!("Failed to set permissions on {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    let _ = (path, mode);
    Ok(())
}

#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?
        .write_all(bytes)
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    fs::write(path, bytes)
}
